//! Mock collaborators for testing the batch submitter.

use crate::{
    BatcherConfig, BlockId, BlockRef, ChannelError, ChannelId, ChannelManager, ClientError,
    DriverSetup, FrameId, L1Client, L2Block, L2BlockRef, L2Client, L2EndpointProvider, Metricer,
    RollupClient, SyncStatus, TargetMode, TxCandidate, TxConfirmation, TxData, TxManager,
    TxManagerError,
};
use alloy_consensus::Header;
use alloy_primitives::{Address, B256, Bytes, Sealable, Sealed, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};
use tokio::sync::Semaphore;

/// Installs a `tracing` subscriber writing to the test output.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Builds a linked chain of L2 blocks `first..=last` on top of `parent_hash`.
///
/// `salt` ends up in the headers, so chains built with different salts have different
/// hashes at every height.
pub fn l2_chain(first: u64, last: u64, mut parent_hash: B256, salt: u8) -> Vec<L2Block> {
    (first..=last)
        .map(|number| {
            let header = Header {
                number,
                parent_hash,
                timestamp: number * 2,
                mix_hash: B256::repeat_byte(salt),
                ..Default::default()
            }
            .seal_slow();
            parent_hash = header.hash();
            L2Block::new(header, vec![Bytes::from(number.to_be_bytes().to_vec())])
        })
        .collect()
}

/// Returns the [L2BlockRef] of `block`.
pub fn l2_block_ref(block: &L2Block) -> L2BlockRef {
    L2BlockRef { block_info: block.block_ref(), ..Default::default() }
}

/// Returns a sync status with the given L2 heads and a non-zero L1 head.
pub fn sync_status(safe: &L2Block, unsafe_head: &L2Block) -> SyncStatus {
    let head_l1 = BlockRef { hash: B256::repeat_byte(0x11), number: 1_000, ..Default::default() };
    SyncStatus {
        current_l1: head_l1,
        head_l1,
        safe_l2: l2_block_ref(safe),
        unsafe_l2: l2_block_ref(unsafe_head),
        ..Default::default()
    }
}

/// Returns the L2 block number a [MockChannelManager] frame was built from.
pub fn frame_block_number(id: &FrameId) -> u64 {
    let mut number = [0u8; 8];
    number.copy_from_slice(&id.channel.0[8..]);
    u64::from_be_bytes(number)
}

/// A batcher configuration suitable for tests.
pub fn test_config() -> BatcherConfig {
    BatcherConfig {
        poll_interval: core::time::Duration::from_secs(1).into(),
        network_timeout: core::time::Duration::from_secs(1).into(),
        l1_inbox_address: Address::repeat_byte(0x42),
        ..Default::default()
    }
}

/// An [L1Client] serving a settable tip.
#[derive(Debug)]
pub struct MockL1Client {
    tip: Mutex<Result<Sealed<Header>, ClientError>>,
}

impl Default for MockL1Client {
    fn default() -> Self {
        let client = Self { tip: Mutex::new(Err(ClientError::EmptyResponse("header"))) };
        client.set_tip(1_000);
        client
    }
}

impl MockL1Client {
    /// Sets the tip to a header at `number`.
    pub fn set_tip(&self, number: u64) {
        let header = Header { number, timestamp: number * 12, ..Default::default() }.seal_slow();
        *self.tip.lock() = Ok(header);
    }

    /// Makes tip queries fail with `err`.
    pub fn set_error(&self, err: ClientError) {
        *self.tip.lock() = Err(err);
    }
}

#[async_trait]
impl L1Client for MockL1Client {
    async fn header_by_number(&self, number: Option<u64>) -> Result<Sealed<Header>, ClientError> {
        let tip = self.tip.lock().clone()?;
        match number {
            None => Ok(tip),
            Some(n) if n == tip.number => Ok(tip),
            Some(n) => Err(ClientError::BlockNotFound(n)),
        }
    }
}

/// An [L2Client] serving blocks from memory.
#[derive(Debug, Default)]
pub struct MockL2Client {
    blocks: Mutex<HashMap<u64, L2Block>>,
    fetched: Mutex<Vec<u64>>,
}

impl MockL2Client {
    /// Inserts the blocks, replacing any block at the same height.
    pub fn insert_blocks(&self, blocks: impl IntoIterator<Item = L2Block>) {
        let mut stored = self.blocks.lock();
        for block in blocks {
            stored.insert(block.header.number, block);
        }
    }

    /// Removes the block at `number`.
    pub fn remove_block(&self, number: u64) {
        self.blocks.lock().remove(&number);
    }

    /// Returns the block numbers requested so far.
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl L2Client for MockL2Client {
    async fn block_by_number(&self, number: u64) -> Result<L2Block, ClientError> {
        self.fetched.lock().push(number);
        self.blocks.lock().get(&number).cloned().ok_or(ClientError::BlockNotFound(number))
    }
}

/// A [RollupClient] reporting a settable sync status.
#[derive(Debug)]
pub struct MockRollupClient {
    status: Mutex<Result<SyncStatus, ClientError>>,
}

impl Default for MockRollupClient {
    fn default() -> Self {
        Self { status: Mutex::new(Ok(SyncStatus::default())) }
    }
}

impl MockRollupClient {
    /// Sets the reported sync status.
    pub fn set_status(&self, status: SyncStatus) {
        *self.status.lock() = Ok(status);
    }

    /// Makes sync status queries fail with `err`.
    pub fn set_error(&self, err: ClientError) {
        *self.status.lock() = Err(err);
    }
}

#[async_trait]
impl RollupClient for MockRollupClient {
    async fn sync_status(&self) -> Result<SyncStatus, ClientError> {
        self.status.lock().clone()
    }
}

/// An [L2EndpointProvider] always handing out the same mock clients.
#[derive(Debug, Default)]
pub struct MockEndpointProvider {
    /// The execution client.
    pub eth: Arc<MockL2Client>,
    /// The rollup node client.
    pub rollup: Arc<MockRollupClient>,
}

#[async_trait]
impl L2EndpointProvider for MockEndpointProvider {
    async fn eth_client(&self) -> Result<Arc<dyn L2Client>, ClientError> {
        Ok(self.eth.clone())
    }

    async fn rollup_client(&self) -> Result<Arc<dyn RollupClient>, ClientError> {
        Ok(self.rollup.clone())
    }
}

/// A [ChannelManager] producing one frame per block.
///
/// With `frames_on_close` set, frames are held back until [ChannelManager::close].
#[derive(Debug, Default)]
pub struct MockChannelManager {
    /// Hold frames back until the manager is closed.
    pub frames_on_close: bool,
    last_block: Option<BlockId>,
    open: Vec<TxData>,
    pending: VecDeque<TxData>,
    in_flight: HashMap<FrameId, TxData>,
    added: Vec<BlockId>,
    confirmed: Vec<(FrameId, BlockId)>,
    failed: Vec<FrameId>,
    l1_heads: Vec<BlockId>,
    closes: usize,
    clears: usize,
}

impl MockChannelManager {
    /// Returns the ids of all blocks added since creation.
    pub fn added(&self) -> &[BlockId] {
        &self.added
    }

    /// Returns the confirmed frames with their inclusion blocks.
    pub fn confirmed(&self) -> &[(FrameId, BlockId)] {
        &self.confirmed
    }

    /// Returns the sorted L2 block numbers of all confirmed frames.
    pub fn confirmed_blocks(&self) -> Vec<u64> {
        let mut numbers: Vec<_> =
            self.confirmed.iter().map(|(id, _)| frame_block_number(id)).collect();
        numbers.sort_unstable();
        numbers
    }

    /// Returns every frame reported as failed.
    pub fn failed(&self) -> &[FrameId] {
        &self.failed
    }

    /// Returns the L1 heads passed to [ChannelManager::tx_data].
    pub fn l1_heads(&self) -> &[BlockId] {
        &self.l1_heads
    }

    /// Returns the number of frames waiting to be handed out.
    pub fn pending_frames(&self) -> usize {
        self.open.len() + self.pending.len()
    }

    /// Returns the number of frames handed out and not yet confirmed or failed.
    pub fn in_flight_frames(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns how often the manager was closed.
    pub const fn closes(&self) -> usize {
        self.closes
    }

    /// Returns how often the manager was cleared.
    pub const fn clears(&self) -> usize {
        self.clears
    }

    fn frame(block: &L2Block) -> TxData {
        let mut channel = [0u8; 16];
        channel[8..].copy_from_slice(&block.header.number.to_be_bytes());
        TxData::new(
            FrameId::new(ChannelId(channel), 0),
            Bytes::copy_from_slice(block.header.hash().as_slice()),
        )
    }
}

impl ChannelManager for MockChannelManager {
    fn add_l2_block(&mut self, block: L2Block) -> Result<(), ChannelError> {
        if let Some(last) = self.last_block {
            if block.parent_hash() != last.hash {
                return Err(ChannelError::Reorg { expected_parent: last.hash, block: block.id() });
            }
        }
        self.last_block = Some(block.id());
        self.added.push(block.id());
        let frame = Self::frame(&block);
        if self.frames_on_close {
            self.open.push(frame);
        } else {
            self.pending.push_back(frame);
        }
        Ok(())
    }

    fn tx_data(&mut self, l1_head: BlockId) -> Result<Option<TxData>, ChannelError> {
        self.l1_heads.push(l1_head);
        let Some(frame) = self.pending.pop_front() else {
            return Ok(None);
        };
        self.in_flight.insert(*frame.id(), frame.clone());
        Ok(Some(frame))
    }

    fn tx_confirmed(&mut self, id: &FrameId, inclusion_block: BlockId) {
        if self.in_flight.remove(id).is_some() {
            self.confirmed.push((*id, inclusion_block));
        }
    }

    fn tx_failed(&mut self, id: &FrameId) {
        self.failed.push(*id);
        if let Some(frame) = self.in_flight.remove(id) {
            self.pending.push_front(frame);
        }
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.closes += 1;
        self.pending.extend(self.open.drain(..));
        if self.pending.is_empty() { Ok(()) } else { Err(ChannelError::PendingAfterClose) }
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.last_block = None;
        self.open.clear();
        self.pending.clear();
        self.in_flight.clear();
    }
}

/// A [TxManager] confirming every transaction, optionally gated by a semaphore.
#[derive(Debug, Default)]
pub struct MockTxManager {
    sent: Mutex<Vec<TxCandidate>>,
    gate: Option<Arc<Semaphore>>,
    failures: AtomicUsize,
    confirmations: AtomicU64,
}

impl MockTxManager {
    /// Returns a manager whose sends block until a permit is added to the returned gate.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self { gate: Some(gate.clone()), ..Default::default() }, gate)
    }

    /// Makes the next `n` sends fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Returns the candidates of all sends started so far.
    pub fn sent(&self) -> Vec<TxCandidate> {
        self.sent.lock().clone()
    }

    /// Returns the number of sends started so far.
    pub fn started(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl TxManager for MockTxManager {
    async fn send(&self, candidate: TxCandidate) -> Result<TxConfirmation, TxManagerError> {
        self.sent.lock().push(candidate);
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|e| TxManagerError::Send(e.to_string()))?.forget();
        }
        let fail =
            self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if fail.is_ok() {
            return Err(TxManagerError::Send("mock failure".into()));
        }
        let n = self.confirmations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TxConfirmation {
            tx_hash: B256::from(U256::from(n)),
            block: BlockId::new(2_000 + n, B256::repeat_byte(0xbb)),
        })
    }
}

/// A [Metricer] recording every event.
#[derive(Debug, Default)]
pub struct MockMetrics {
    l1_tips: Mutex<Vec<BlockRef>>,
    l2_loaded: Mutex<Vec<(BlockRef, u64)>>,
    target_modes: Mutex<Vec<TargetMode>>,
    confirmed: AtomicU64,
    failed: AtomicU64,
}

impl MockMetrics {
    /// Returns the recorded L1 tips.
    pub fn l1_tips(&self) -> Vec<BlockRef> {
        self.l1_tips.lock().clone()
    }

    /// Returns the recorded L2 block loads.
    pub fn l2_loaded(&self) -> Vec<(BlockRef, u64)> {
        self.l2_loaded.lock().clone()
    }

    /// Returns the recorded target modes, one per publish cycle.
    pub fn target_modes(&self) -> Vec<TargetMode> {
        self.target_modes.lock().clone()
    }

    /// Returns the number of confirmed transactions recorded.
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed transactions recorded.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

impl Metricer for MockMetrics {
    fn record_latest_l1_block(&self, block: &BlockRef) {
        self.l1_tips.lock().push(*block);
    }

    fn record_l2_blocks_loaded(&self, latest: &BlockRef, count: u64) {
        self.l2_loaded.lock().push((*latest, count));
    }

    fn record_batch_tx_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_batch_tx_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_target_mode(&self, mode: TargetMode) {
        self.target_modes.lock().push(mode);
    }
}

/// The mock collaborators of a batch submitter.
#[derive(Debug, Default)]
pub struct TestHarness {
    /// The L1 client.
    pub l1: Arc<MockL1Client>,
    /// The endpoint provider and its clients.
    pub endpoints: Arc<MockEndpointProvider>,
    /// The transaction manager.
    pub tx_manager: Arc<MockTxManager>,
    /// The metrics sink.
    pub metrics: Arc<MockMetrics>,
    /// The channel manager.
    pub channel_manager: Arc<Mutex<MockChannelManager>>,
}

impl TestHarness {
    /// Creates a harness around the given transaction manager.
    pub fn with_tx_manager(tx_manager: MockTxManager) -> Self {
        Self { tx_manager: Arc::new(tx_manager), ..Default::default() }
    }

    /// Serves `blocks` from the L2 client and reports `safe` and `unsafe_head` as L2 heads.
    pub fn serve(&self, blocks: &[L2Block], safe: u64, unsafe_head: u64) {
        self.endpoints.eth.insert_blocks(blocks.iter().cloned());
        let find = |number| blocks.iter().find(|b| b.header.number == number);
        if let (Some(safe), Some(unsafe_head)) = (find(safe), find(unsafe_head)) {
            self.endpoints.rollup.set_status(sync_status(safe, unsafe_head));
        }
    }

    /// Returns a [DriverSetup] wired to the mocks.
    pub fn setup(&self, config: BatcherConfig) -> DriverSetup {
        DriverSetup {
            config,
            l1_client: self.l1.clone(),
            endpoint_provider: self.endpoints.clone(),
            tx_manager: self.tx_manager.clone(),
            metrics: self.metrics.clone(),
            channel_manager: self.channel_manager.clone(),
        }
    }
}
