//! The batch submitter's main loop.
//!
//! Every poll interval the loop loads the unsafe L2 blocks that were not posted yet into the
//! channel manager and publishes all frames that are ready. Receipts of submitted frames are
//! fed back into the channel manager as they arrive.

use crate::{
    BatcherConfig, BatcherError, BlockId, BlockRef, ChannelError, ChannelManager, ClientError,
    FrameId, L1Client, L2EndpointProvider, Metricer, SubmissionTarget, SyncStatus,
    TargetSelector, TxData, TxManager, TxQueue, TxReceipt, timeout::with_timeout,
};
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// The receiving end of the receipt stream of a driver session.
pub(crate) type Receipts = mpsc::UnboundedReceiver<TxReceipt<TxData>>;

/// The configuration and collaborators of a batch submitter.
#[derive(Clone)]
pub struct DriverSetup {
    /// The batcher configuration.
    pub config: BatcherConfig,
    /// Client for the L1 chain the frames are posted to.
    pub l1_client: Arc<dyn L1Client>,
    /// Provider of clients for the active L2 endpoint.
    pub endpoint_provider: Arc<dyn L2EndpointProvider>,
    /// Sends batcher transactions.
    pub tx_manager: Arc<dyn TxManager>,
    /// Metrics sink.
    pub metrics: Arc<dyn Metricer>,
    /// Packs loaded blocks into frames.
    pub channel_manager: Arc<Mutex<dyn ChannelManager>>,
}

impl fmt::Debug for DriverSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSetup").field("config", &self.config).finish_non_exhaustive()
    }
}

/// The state of one driver session, owned by the loop task.
#[derive(Debug)]
pub(crate) struct Driver {
    setup: DriverSetup,
    /// The last L2 block loaded into the channel manager.
    last_stored_block: BlockId,
    /// The last L1 tip reported to the metrics.
    last_l1_tip: Mutex<BlockRef>,
    targets: TargetSelector,
    queue: TxQueue,
    receipts_tx: mpsc::UnboundedSender<TxReceipt<TxData>>,
    kill: CancellationToken,
}

impl Driver {
    /// Creates a fresh driver session. `kill` aborts all network calls and sends.
    pub(crate) fn new(setup: DriverSetup, kill: CancellationToken) -> (Self, Receipts) {
        let (receipts_tx, receipts_rx) = mpsc::unbounded_channel();
        let queue = TxQueue::new(
            Arc::clone(&setup.tx_manager),
            setup.config.max_pending_transactions,
            kill.clone(),
        );
        let targets = TargetSelector::new(&setup.config);
        let driver = Self {
            setup,
            last_stored_block: BlockId::default(),
            last_l1_tip: Mutex::new(BlockRef::default()),
            targets,
            queue,
            receipts_tx,
            kill,
        };
        (driver, receipts_rx)
    }

    /// Runs the loop until `shutdown` is cancelled, then publishes all remaining data.
    pub(crate) async fn run(mut self, mut receipts: Receipts, shutdown: CancellationToken) {
        let poll_interval = self.setup.config.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.close_channels("shutdown");
                    self.publish_state_to_l1(&mut receipts, true).await;
                    info!(target: "batcher", "Finished publishing all remaining channel data");
                    return;
                }
                Some(receipt) = receipts.recv() => self.handle_receipt(receipt),
                _ = ticker.tick() => self.tick(&mut receipts).await,
            }
        }
    }

    /// Loads new blocks and publishes ready frames.
    async fn tick(&mut self, receipts: &mut Receipts) {
        match self.load_blocks_into_state().await {
            Ok(()) => {}
            Err(BatcherError::Reorg { number }) => {
                warn!(target: "batcher", number, "Found L2 reorg, recovering");
                self.recover_from_reorg(receipts).await;
                return;
            }
            Err(err @ BatcherError::InvalidRange { .. }) => {
                debug!(target: "batcher", %err, "No new L2 blocks to load");
            }
            Err(err) => warn!(target: "batcher", %err, "Failed to load L2 blocks into state"),
        }
        self.publish_state_to_l1(receipts, false).await;
    }

    /// Flushes everything loaded before the reorg, then starts over from the safe head.
    async fn recover_from_reorg(&mut self, receipts: &mut Receipts) {
        self.close_channels("L2 reorg");
        self.publish_state_to_l1(receipts, true).await;
        self.setup.channel_manager.lock().clear();
        self.last_stored_block = BlockId::default();
    }

    fn close_channels(&self, reason: &'static str) {
        let res = self.setup.channel_manager.lock().close();
        match res {
            Ok(()) => {}
            Err(ChannelError::PendingAfterClose) => {
                warn!(
                    target: "batcher",
                    reason,
                    "Closed channel manager with pending channel(s) remaining, submitting"
                );
            }
            Err(err) => error!(target: "batcher", reason, %err, "Error closing the channel manager"),
        }
    }

    /// Queries the rollup node and returns the `(start, end]` range of blocks to load.
    pub(crate) async fn calculate_l2_block_range(
        &mut self,
    ) -> Result<(BlockId, BlockId), BatcherError> {
        let status = self.sync_status().await?;
        self.targets.observe(status.unsafe_l2.id(), Instant::now());
        next_l2_block_range(
            &mut self.last_stored_block,
            &status,
            self.setup.config.resume_from_intermediate,
        )
    }

    async fn sync_status(&self) -> Result<SyncStatus, BatcherError> {
        let timeout = self.setup.config.network_timeout();
        let status = with_timeout(&self.kill, timeout, async {
            let rollup = self.setup.endpoint_provider.rollup_client().await?;
            rollup.sync_status().await
        })
        .await
        .map_err(BatcherError::StatusUnavailable)?;
        if status.head_l1 == BlockRef::default() {
            return Err(BatcherError::StatusUnavailable(ClientError::EmptyResponse("sync status")));
        }
        Ok(status)
    }

    /// Loads all blocks of the next range into the channel manager.
    ///
    /// On a reorg the stored block is reset, so the next range starts at the safe head.
    pub(crate) async fn load_blocks_into_state(&mut self) -> Result<(), BatcherError> {
        let (start, end) = self.calculate_l2_block_range().await?;

        let mut latest = None;
        for number in start.number + 1..=end.number {
            match self.load_block_into_state(number).await {
                Ok(block) => {
                    self.last_stored_block = block.id();
                    latest = Some(block);
                }
                Err(err @ BatcherError::Reorg { .. }) => {
                    self.last_stored_block = BlockId::default();
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(latest) = latest {
            self.setup.metrics.record_l2_blocks_loaded(&latest, end.number - start.number);
        }
        Ok(())
    }

    async fn load_block_into_state(&self, number: u64) -> Result<BlockRef, BatcherError> {
        let timeout = self.setup.config.network_timeout();
        // One deadline covers both getting the client and the fetch.
        let block = with_timeout(&self.kill, timeout, async {
            let client = self.setup.endpoint_provider.eth_client().await?;
            client.block_by_number(number).await
        })
        .await
        .map_err(|source| BatcherError::BlockFetch { number, source })?;

        let block_ref = block.block_ref();
        let tx_count = block.transactions.len();
        let res = self.setup.channel_manager.lock().add_l2_block(block);
        match res {
            Ok(()) => {}
            Err(err @ ChannelError::Reorg { .. }) => {
                warn!(target: "batcher", %err, "Channel manager rejected L2 block");
                return Err(BatcherError::Reorg { number });
            }
            Err(source) => return Err(BatcherError::AddBlock { number, source }),
        }

        info!(
            target: "batcher",
            block = %block_ref,
            tx_count,
            timestamp = block_ref.timestamp,
            "Added L2 block to local state"
        );
        Ok(block_ref)
    }

    /// Publishes ready frames until the channel manager runs dry, handling receipts meanwhile.
    ///
    /// With `drain` set, also waits for every in-flight transaction to finish.
    pub(crate) async fn publish_state_to_l1(&self, receipts: &mut Receipts, drain: bool) {
        let target = self.targets.select(Instant::now());
        self.setup.metrics.record_target_mode(target.mode);
        debug!(target: "batcher", mode = %target.mode, to = %target.to, drain, "Publishing state");

        let sender = async {
            loop {
                match self.publish_tx_to_l1(&target).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        trace!(target: "batcher", "No transaction data available");
                        break;
                    }
                    Err(err) => {
                        error!(target: "batcher", %err, "Error publishing tx to L1");
                        break;
                    }
                }
            }
            if drain {
                self.queue.wait().await;
            }
        };
        tokio::pin!(sender);

        loop {
            tokio::select! {
                biased;
                Some(receipt) = receipts.recv() => self.handle_receipt(receipt),
                _ = &mut sender => break,
            }
        }
        while let Ok(receipt) = receipts.try_recv() {
            self.handle_receipt(receipt);
        }
    }

    /// Queues the next ready frame, returning its id, or `None` if no frame is ready.
    async fn publish_tx_to_l1(
        &self,
        target: &SubmissionTarget,
    ) -> Result<Option<FrameId>, BatcherError> {
        let l1_tip = self.l1_tip().await?;
        self.record_l1_tip(&l1_tip);

        let tx_data = self.setup.channel_manager.lock().tx_data(l1_tip.id());
        let Some(tx_data) = tx_data.map_err(BatcherError::TxData)? else {
            return Ok(None);
        };
        let id = *tx_data.id();
        self.send_transaction(tx_data, target).await?;
        Ok(Some(id))
    }

    /// Queues a frame for submission to `target`.
    ///
    /// A frame whose gas limit cannot be computed is handed back to the channel manager as
    /// failed.
    pub(crate) async fn send_transaction(
        &self,
        tx_data: TxData,
        target: &SubmissionTarget,
    ) -> Result<(), BatcherError> {
        let candidate = match target.candidate(tx_data.call_data()) {
            Ok(candidate) => candidate,
            Err(err) => {
                self.setup.channel_manager.lock().tx_failed(tx_data.id());
                return Err(err.into());
            }
        };
        debug!(
            target: "batcher",
            frame_id = %tx_data.id(),
            to = %candidate.to,
            gas_limit = candidate.gas_limit,
            "Queueing batcher transaction"
        );
        self.queue.send(tx_data, candidate, self.receipts_tx.clone()).await;
        Ok(())
    }

    /// Feeds the outcome of a submitted frame back into the channel manager.
    pub(crate) fn handle_receipt(&self, receipt: TxReceipt<TxData>) {
        let TxReceipt { id: tx_data, result } = receipt;
        match result {
            Ok(confirmation) => {
                info!(
                    target: "batcher",
                    frame_id = %tx_data.id(),
                    data_len = tx_data.len(),
                    tx_hash = %confirmation.tx_hash,
                    block = %confirmation.block,
                    "Transaction confirmed"
                );
                self.setup.channel_manager.lock().tx_confirmed(tx_data.id(), confirmation.block);
                self.setup.metrics.record_batch_tx_confirmed();
            }
            Err(err) => {
                warn!(
                    target: "batcher",
                    frame_id = %tx_data.id(),
                    data_len = tx_data.len(),
                    %err,
                    "Transaction failed to send"
                );
                self.setup.channel_manager.lock().tx_failed(tx_data.id());
                self.setup.metrics.record_batch_tx_failed();
            }
        }
    }

    async fn l1_tip(&self) -> Result<BlockRef, BatcherError> {
        let timeout = self.setup.config.network_timeout();
        let header = with_timeout(&self.kill, timeout, self.setup.l1_client.header_by_number(None))
            .await
            .map_err(BatcherError::L1Tip)?;
        Ok(BlockRef::from(&header))
    }

    /// Reports the L1 tip to the metrics if it changed.
    fn record_l1_tip(&self, tip: &BlockRef) {
        let mut last = self.last_l1_tip.lock();
        if *last == *tip {
            return;
        }
        *last = *tip;
        self.setup.metrics.record_latest_l1_block(tip);
    }
}

/// Computes the `(start, end]` range of L2 blocks to load, advancing `last_stored` past
/// blocks that are already safe.
fn next_l2_block_range(
    last_stored: &mut BlockId,
    status: &SyncStatus,
    resume_from_intermediate: bool,
) -> Result<(BlockId, BlockId), BatcherError> {
    let safe = status.safe_l2.id();
    let unsafe_head = status.unsafe_l2.id();

    if last_stored.is_unset() {
        info!(target: "batcher", %safe, "Starting batch submitter from the L2 safe head");
        *last_stored = safe;
    } else if last_stored.number < safe.number {
        warn!(
            target: "batcher",
            last_stored = %last_stored,
            %safe,
            "Last stored block lagged behind the L2 safe head, continuing from the safe head"
        );
        *last_stored = safe;
    }

    if safe.number >= unsafe_head.number {
        return Err(BatcherError::InvalidRange { start: safe, end: unsafe_head });
    }

    if resume_from_intermediate {
        if let Some(intermediate) = status.intermediate_safe_l2.map(|head| head.id()) {
            if intermediate.number > last_stored.number && intermediate.number < unsafe_head.number
            {
                info!(
                    target: "batcher",
                    last_stored = %last_stored,
                    %intermediate,
                    "Resuming from the intermediate safe head"
                );
                *last_stored = intermediate;
            }
        }
    }

    if last_stored.number >= unsafe_head.number {
        return Err(BatcherError::InvalidRange { start: *last_stored, end: unsafe_head });
    }
    Ok((*last_stored, unsafe_head))
}
