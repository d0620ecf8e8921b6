//! Selection of the submission target for a publish cycle.

use crate::{BatcherConfig, BlockId, GasError, IntrinsicGasRule, TxCandidate};
use alloy_primitives::{Address, B256, Bytes};
use core::time::Duration;
use derive_more::Display;
use tokio::time::Instant;

/// Where batcher transactions are sent.
#[derive(Debug, Display, Clone, Copy, Default, Hash, PartialEq, Eq)]
pub enum TargetMode {
    /// Submit to the L1 batch inbox.
    #[default]
    #[display("normal")]
    Normal,
    /// L2 stopped producing blocks; submit to the fallback inbox on L2.
    #[display("l2_halted")]
    L2Halted,
}

/// The destination and gas rule resolved for one publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTarget {
    /// The mode this target was resolved for.
    pub mode: TargetMode,
    /// The inbox address.
    pub to: Address,
    /// The gas rule used to compute the gas limit.
    pub gas_rule: IntrinsicGasRule,
}

impl SubmissionTarget {
    /// Builds a [TxCandidate] carrying `tx_data` to this target.
    pub fn candidate(&self, tx_data: Bytes) -> Result<TxCandidate, GasError> {
        let gas_limit = self.gas_rule.intrinsic_gas(&tx_data)?;
        Ok(TxCandidate { mode: self.mode, to: self.to, tx_data, gas_limit })
    }
}

/// Tracks the progress of the L2 unsafe head.
#[derive(Debug)]
pub struct HaltDetector {
    threshold: Option<Duration>,
    last_head: BlockId,
    last_progress: Option<Instant>,
}

impl HaltDetector {
    /// Creates a detector. Without a threshold L2 is never considered halted.
    pub const fn new(threshold: Option<Duration>) -> Self {
        Self { threshold, last_head: BlockId::new(0, B256::ZERO), last_progress: None }
    }

    /// Records the unsafe head observed at `now`.
    pub fn observe(&mut self, unsafe_head: BlockId, now: Instant) {
        if self.last_progress.is_none() || unsafe_head != self.last_head {
            self.last_head = unsafe_head;
            self.last_progress = Some(now);
        }
    }

    /// Returns the mode implied by the observed progress.
    pub fn mode(&self, now: Instant) -> TargetMode {
        match (self.threshold, self.last_progress) {
            (Some(threshold), Some(progress))
                if now.saturating_duration_since(progress) > threshold =>
            {
                TargetMode::L2Halted
            }
            _ => TargetMode::Normal,
        }
    }
}

/// Resolves the [SubmissionTarget] of a publish cycle.
#[derive(Debug)]
pub struct TargetSelector {
    normal: SubmissionTarget,
    halted: Option<SubmissionTarget>,
    detector: HaltDetector,
}

impl TargetSelector {
    /// Creates a selector from the configured inboxes and gas rules.
    pub fn new(config: &BatcherConfig) -> Self {
        let halted = config.l2_target();
        let threshold = halted.and(config.l2_halt_threshold());
        Self { normal: config.l1_target(), halted, detector: HaltDetector::new(threshold) }
    }

    /// Feeds an observed unsafe head to the halt detector.
    pub fn observe(&mut self, unsafe_head: BlockId, now: Instant) {
        self.detector.observe(unsafe_head, now);
    }

    /// Returns the target to use for a cycle starting at `now`.
    pub fn select(&self, now: Instant) -> SubmissionTarget {
        match (self.detector.mode(now), self.halted) {
            (TargetMode::L2Halted, Some(target)) => target,
            _ => self.normal,
        }
    }
}
