//! Intrinsic gas rules for batcher transactions.

use crate::GasError;

/// Calldata-only intrinsic gas accounting for a plain (non-creation) transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicGasRule {
    /// Base cost of a transaction.
    pub tx_gas: u64,
    /// Cost per zero byte of call data.
    pub zero_byte_gas: u64,
    /// Cost per non-zero byte of call data.
    pub non_zero_byte_gas: u64,
    /// EIP-7623 floor cost per call data token, if active.
    pub floor_gas_per_token: Option<u64>,
}

impl IntrinsicGasRule {
    /// Homestead + EIP-2028 calldata pricing.
    pub const ISTANBUL: Self =
        Self { tx_gas: 21_000, zero_byte_gas: 4, non_zero_byte_gas: 16, floor_gas_per_token: None };

    /// [Self::ISTANBUL] with the EIP-7623 calldata floor.
    pub const PRAGUE: Self = Self { floor_gas_per_token: Some(10), ..Self::ISTANBUL };

    /// Returns the intrinsic gas of a transaction carrying `data`.
    pub fn intrinsic_gas(&self, data: &[u8]) -> Result<u64, GasError> {
        let non_zero = data.iter().filter(|b| **b != 0).count() as u64;
        let zero = data.len() as u64 - non_zero;
        let overflow = || GasError::Overflow(data.len());

        let gas = non_zero
            .checked_mul(self.non_zero_byte_gas)
            .and_then(|g| g.checked_add(zero.checked_mul(self.zero_byte_gas)?))
            .and_then(|g| g.checked_add(self.tx_gas))
            .ok_or_else(overflow)?;

        let Some(per_token) = self.floor_gas_per_token else {
            return Ok(gas);
        };
        // Each non-zero byte counts as four tokens.
        let floor = non_zero
            .checked_mul(4)
            .and_then(|t| t.checked_add(zero))
            .and_then(|t| t.checked_mul(per_token))
            .and_then(|g| g.checked_add(self.tx_gas))
            .ok_or_else(overflow)?;
        Ok(gas.max(floor))
    }
}

/// Selects an [IntrinsicGasRule] preset from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum GasRuleKind {
    /// See [IntrinsicGasRule::ISTANBUL].
    Istanbul,
    /// See [IntrinsicGasRule::PRAGUE].
    #[default]
    Prague,
}

impl From<GasRuleKind> for IntrinsicGasRule {
    fn from(kind: GasRuleKind) -> Self {
        match kind {
            GasRuleKind::Istanbul => Self::ISTANBUL,
            GasRuleKind::Prague => Self::PRAGUE,
        }
    }
}
