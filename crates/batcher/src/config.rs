//! Batcher configuration.

use crate::{ConfigError, GasRuleKind, IntrinsicGasRule, SubmissionTarget, TargetMode};
use alloy_primitives::Address;
use clap::Args;
use core::time::Duration;

/// Configuration of the batch submitter loop.
///
/// Meant to be flattened into a binary's CLI arguments.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct BatcherConfig {
    /// How often to poll the rollup node for new L2 blocks.
    #[arg(long = "poll-interval", env = "BATCHER_POLL_INTERVAL", default_value = "6s")]
    pub poll_interval: humantime::Duration,

    /// Timeout applied to every individual network call.
    #[arg(long = "network-timeout", env = "BATCHER_NETWORK_TIMEOUT", default_value = "10s")]
    pub network_timeout: humantime::Duration,

    /// Maximum number of batcher transactions in flight. 0 means no limit.
    #[arg(long = "max-pending-tx", env = "BATCHER_MAX_PENDING_TX", default_value_t = 1)]
    pub max_pending_transactions: usize,

    /// The batch inbox address on L1.
    #[arg(long = "l1-inbox-address", env = "BATCHER_L1_INBOX_ADDRESS")]
    pub l1_inbox_address: Address,

    /// Gas rule for transactions sent to the L1 inbox.
    #[arg(long = "l1-gas-rule", env = "BATCHER_L1_GAS_RULE", value_enum, default_value_t = GasRuleKind::Prague)]
    pub l1_gas_rule: GasRuleKind,

    /// The fallback batch inbox address on L2, used while L2 is halted.
    #[arg(long = "l2-inbox-address", env = "BATCHER_L2_INBOX_ADDRESS")]
    pub l2_inbox_address: Option<Address>,

    /// Gas rule for transactions sent to the L2 inbox.
    #[arg(long = "l2-gas-rule", env = "BATCHER_L2_GAS_RULE", value_enum, default_value_t = GasRuleKind::Istanbul)]
    pub l2_gas_rule: GasRuleKind,

    /// Time without unsafe head progress after which L2 is considered halted.
    /// Fallback submission is disabled when unset.
    #[arg(long = "l2-halt-threshold", env = "BATCHER_L2_HALT_THRESHOLD", requires = "l2_inbox_address")]
    pub l2_halt_threshold: Option<humantime::Duration>,

    /// Resume loading right after the head reported as safe on the intermediate layer,
    /// when the rollup node reports one.
    #[arg(long = "resume-from-intermediate", env = "BATCHER_RESUME_FROM_INTERMEDIATE")]
    pub resume_from_intermediate: bool,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(6).into(),
            network_timeout: Duration::from_secs(10).into(),
            max_pending_transactions: 1,
            l1_inbox_address: Address::ZERO,
            l1_gas_rule: GasRuleKind::Prague,
            l2_inbox_address: None,
            l2_gas_rule: GasRuleKind::Istanbul,
            l2_halt_threshold: None,
            resume_from_intermediate: false,
        }
    }
}

impl BatcherConfig {
    /// Checks the configuration for values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        if self.network_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("network timeout"));
        }
        match &self.l2_halt_threshold {
            Some(threshold) if threshold.is_zero() => {
                Err(ConfigError::ZeroDuration("l2 halt threshold"))
            }
            Some(_) if self.l2_inbox_address.is_none() => Err(ConfigError::MissingL2Inbox),
            _ => Ok(()),
        }
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        *self.poll_interval
    }

    /// Returns the per-call network timeout.
    pub fn network_timeout(&self) -> Duration {
        *self.network_timeout
    }

    /// Returns the L2 halt threshold, if the fallback is enabled.
    pub fn l2_halt_threshold(&self) -> Option<Duration> {
        self.l2_halt_threshold.as_deref().copied()
    }

    /// Returns the submission target for the normal mode.
    pub fn l1_target(&self) -> SubmissionTarget {
        SubmissionTarget {
            mode: TargetMode::Normal,
            to: self.l1_inbox_address,
            gas_rule: IntrinsicGasRule::from(self.l1_gas_rule),
        }
    }

    /// Returns the submission target used while L2 is halted, if configured.
    pub fn l2_target(&self) -> Option<SubmissionTarget> {
        self.l2_inbox_address.map(|to| SubmissionTarget {
            mode: TargetMode::L2Halted,
            to,
            gas_rule: IntrinsicGasRule::from(self.l2_gas_rule),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[clap(flatten)]
        batcher: BatcherConfig,
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from([
            "batcher",
            "--l1-inbox-address",
            "0xff00000000000000000000000000000000042220",
        ])
        .unwrap();
        let cfg = cli.batcher;
        assert_eq!(cfg.poll_interval(), Duration::from_secs(6));
        assert_eq!(cfg.network_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.max_pending_transactions, 1);
        assert_eq!(cfg.l1_inbox_address, address!("ff00000000000000000000000000000000042220"));
        assert_eq!(cfg.l1_target().gas_rule, IntrinsicGasRule::PRAGUE);
        assert!(cfg.l2_target().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_halt_fallback() {
        let cli = Cli::try_parse_from([
            "batcher",
            "--l1-inbox-address",
            "0xff00000000000000000000000000000000042220",
            "--l2-inbox-address",
            "0xff00000000000000000000000000000000000042",
            "--l2-halt-threshold",
            "2m",
            "--poll-interval",
            "500ms",
        ])
        .unwrap();
        let cfg = cli.batcher;
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.l2_halt_threshold(), Some(Duration::from_secs(120)));
        let target = cfg.l2_target().unwrap();
        assert_eq!(target.mode, TargetMode::L2Halted);
        assert_eq!(target.to, address!("ff00000000000000000000000000000000000042"));
        assert_eq!(target.gas_rule, IntrinsicGasRule::ISTANBUL);
    }

    #[test]
    fn test_halt_threshold_requires_l2_inbox() {
        let res = Cli::try_parse_from([
            "batcher",
            "--l1-inbox-address",
            "0xff00000000000000000000000000000000042220",
            "--l2-halt-threshold",
            "2m",
        ]);
        assert!(res.is_err());

        let cfg = BatcherConfig {
            l2_halt_threshold: Some(Duration::from_secs(1).into()),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MissingL2Inbox));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let cfg = BatcherConfig { poll_interval: Duration::ZERO.into(), ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDuration("poll interval")));

        let cfg = BatcherConfig { network_timeout: Duration::ZERO.into(), ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDuration("network timeout")));
    }
}
