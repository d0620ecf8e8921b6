//! Interfaces of the collaborators driven by the batch submitter.

use crate::{
    BlockId, ChannelError, ClientError, FrameId, L2Block, SyncStatus, TxCandidate,
    TxConfirmation, TxData, TxManagerError,
};
use alloy_consensus::Header;
use alloy_primitives::Sealed;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads L1 headers.
#[async_trait]
pub trait L1Client: Send + Sync {
    /// Returns the header at `number`, or the latest header if `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<Sealed<Header>, ClientError>;
}

/// Reads L2 blocks.
#[async_trait]
pub trait L2Client: Send + Sync {
    /// Returns the block at `number` with its encoded transactions.
    async fn block_by_number(&self, number: u64) -> Result<L2Block, ClientError>;
}

/// Queries the rollup node.
#[async_trait]
pub trait RollupClient: Send + Sync {
    /// Returns the current [SyncStatus] of the rollup node.
    async fn sync_status(&self) -> Result<SyncStatus, ClientError>;
}

/// Hands out clients for the currently active L2 endpoint.
///
/// The returned clients are short lived: a new one is requested for every call.
#[async_trait]
pub trait L2EndpointProvider: Send + Sync {
    /// Returns an execution client for the active endpoint.
    async fn eth_client(&self) -> Result<Arc<dyn L2Client>, ClientError>;

    /// Returns a rollup node client for the active endpoint.
    async fn rollup_client(&self) -> Result<Arc<dyn RollupClient>, ClientError>;
}

/// Packs L2 blocks into channels and hands out their frames.
pub trait ChannelManager: Send {
    /// Adds a block to the open channel.
    ///
    /// Returns [ChannelError::Reorg] if the block does not build on the last added block.
    fn add_l2_block(&mut self, block: L2Block) -> Result<(), ChannelError>;

    /// Returns the next frame ready for submission, or `None` if nothing is ready now.
    fn tx_data(&mut self, l1_head: BlockId) -> Result<Option<TxData>, ChannelError>;

    /// Marks a frame as included in the given L1 block.
    fn tx_confirmed(&mut self, id: &FrameId, inclusion_block: BlockId);

    /// Marks a frame as failed. Its data is handed out again by later [Self::tx_data] calls.
    fn tx_failed(&mut self, id: &FrameId);

    /// Closes all open channels so their remaining data becomes available as frames.
    ///
    /// Returns [ChannelError::PendingAfterClose] if frames remain to be submitted.
    fn close(&mut self) -> Result<(), ChannelError>;

    /// Discards all state.
    fn clear(&mut self);
}

/// Sends transactions and waits for their confirmation.
#[async_trait]
pub trait TxManager: Send + Sync {
    /// Publishes the candidate and resolves once it is confirmed or has definitively failed.
    async fn send(&self, candidate: TxCandidate) -> Result<TxConfirmation, TxManagerError>;
}
