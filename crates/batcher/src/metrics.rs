//! Batcher metrics.

use crate::{BlockRef, TargetMode};
use core::fmt;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Gauge},
};

/// Receives the batcher's metric events.
pub trait Metricer: Send + Sync {
    /// Records a new L1 tip.
    fn record_latest_l1_block(&self, block: &BlockRef);

    /// Records that `count` L2 blocks were loaded, the last one being `latest`.
    fn record_l2_blocks_loaded(&self, latest: &BlockRef, count: u64);

    /// Records a confirmed batcher transaction.
    fn record_batch_tx_confirmed(&self);

    /// Records a failed batcher transaction.
    fn record_batch_tx_failed(&self);

    /// Records the target mode resolved for a publish cycle.
    fn record_target_mode(&self, mode: TargetMode);
}

/// A [Metricer] that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metricer for NoopMetrics {
    fn record_latest_l1_block(&self, _: &BlockRef) {}
    fn record_l2_blocks_loaded(&self, _: &BlockRef, _: u64) {}
    fn record_batch_tx_confirmed(&self) {}
    fn record_batch_tx_failed(&self) {}
    fn record_target_mode(&self, _: TargetMode) {}
}

/// A [Metricer] backed by the global OpenTelemetry meter provider.
pub struct BatcherMetrics {
    latest_l1_block: Gauge<u64>,
    latest_l2_block: Gauge<u64>,
    l2_blocks_loaded: Counter<u64>,
    batch_tx: Counter<u64>,
    target_mode: Gauge<u64>,
}

impl fmt::Debug for BatcherMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatcherMetrics").finish_non_exhaustive()
    }
}

impl Default for BatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BatcherMetrics {
    /// Registers the batcher instruments on the global meter.
    pub fn new() -> Self {
        let meter = global::meter("batcher");
        Self {
            latest_l1_block: meter
                .u64_gauge("latest_l1_block")
                .with_unit("block-number")
                .with_description("Latest L1 tip seen by the batcher.")
                .build(),
            latest_l2_block: meter
                .u64_gauge("latest_l2_block_loaded")
                .with_unit("block-number")
                .with_description("Latest L2 block loaded into the channel manager.")
                .build(),
            l2_blocks_loaded: meter
                .u64_counter("l2_blocks_loaded")
                .with_unit("count")
                .with_description("Number of L2 blocks loaded into the channel manager.")
                .build(),
            batch_tx: meter
                .u64_counter("batch_tx")
                .with_unit("count")
                .with_description("Number of batcher transactions by result.")
                .build(),
            target_mode: meter
                .u64_gauge("target_mode")
                .with_description("Submission target mode: 0 normal, 1 l2 halted.")
                .build(),
        }
    }

    fn record_batch_tx(&self, result: &'static str) {
        self.batch_tx.add(1, &[KeyValue::new("result", result)]);
    }
}

impl Metricer for BatcherMetrics {
    fn record_latest_l1_block(&self, block: &BlockRef) {
        self.latest_l1_block.record(block.number, &[]);
    }

    fn record_l2_blocks_loaded(&self, latest: &BlockRef, count: u64) {
        self.latest_l2_block.record(latest.number, &[]);
        self.l2_blocks_loaded.add(count, &[]);
    }

    fn record_batch_tx_confirmed(&self) {
        self.record_batch_tx("success");
    }

    fn record_batch_tx_failed(&self) {
        self.record_batch_tx("failed");
    }

    fn record_target_mode(&self, mode: TargetMode) {
        let value = match mode {
            TargetMode::Normal => 0,
            TargetMode::L2Halted => 1,
        };
        self.target_mode.record(value, &[]);
    }
}
