//! Error types for the batch submitter.

use crate::BlockId;
use alloy_primitives::B256;
use core::time::Duration;

/// An error returned by the batch submitter.
#[derive(Debug, thiserror::Error)]
pub enum BatcherError {
    /// The batcher was started while already running.
    #[error("batcher is already running")]
    AlreadyRunning,
    /// The batcher was stopped while not running.
    #[error("batcher is not running")]
    NotRunning,
    /// The rollup node's sync status could not be obtained.
    #[error("sync status unavailable: {0}")]
    StatusUnavailable(#[source] ClientError),
    /// There is no L2 block to load, or the reported heads are inconsistent.
    #[error("invalid L2 block range ({start}, {end}]")]
    InvalidRange {
        /// The exclusive start of the range.
        start: BlockId,
        /// The inclusive end of the range.
        end: BlockId,
    },
    /// The channel manager rejected a block that does not build on the loaded chain.
    #[error("L2 reorg detected at block {number}")]
    Reorg {
        /// The number of the rejected block.
        number: u64,
    },
    /// An L2 block could not be fetched.
    #[error("failed to fetch L2 block {number}: {source}")]
    BlockFetch {
        /// The requested block number.
        number: u64,
        /// The underlying error.
        #[source]
        source: ClientError,
    },
    /// An L2 block could not be added to the channel manager.
    #[error("failed to add L2 block {number} to state: {source}")]
    AddBlock {
        /// The block number.
        number: u64,
        /// The underlying error.
        #[source]
        source: ChannelError,
    },
    /// The L1 tip could not be fetched.
    #[error("failed to query L1 tip: {0}")]
    L1Tip(#[source] ClientError),
    /// The channel manager failed to produce transaction data.
    #[error("unable to get tx data: {0}")]
    TxData(#[source] ChannelError),
    /// The configuration cannot be run with.
    #[error("invalid batcher config: {0}")]
    Config(#[from] ConfigError),
    /// The intrinsic gas of a frame could not be computed.
    #[error(transparent)]
    IntrinsicGas(#[from] GasError),
}

/// An error returned by a chain or rollup node client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The request did not complete within the network timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The request was aborted by a forced shutdown.
    #[error("request cancelled")]
    Cancelled,
    /// The response did not contain a required field.
    #[error("empty {0} in response")]
    EmptyResponse(&'static str),
    /// The requested block does not exist.
    #[error("block {0} not found")]
    BlockNotFound(u64),
    /// A transport or RPC error.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// An error returned by the channel manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The block's parent hash does not match the last block added.
    #[error("block {block} does not build on {expected_parent}")]
    Reorg {
        /// The hash of the last block added.
        expected_parent: B256,
        /// The rejected block.
        block: BlockId,
    },
    /// Closing left channels that still have frames to submit.
    #[error("pending channels remain after closing")]
    PendingAfterClose,
    /// Any other channel error.
    #[error("{0}")]
    Other(String),
}

/// An error returned by the transaction manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxManagerError {
    /// The send was aborted by a forced shutdown.
    #[error("transaction send cancelled")]
    Cancelled,
    /// The transaction could not be sent or confirmed.
    #[error("failed to send transaction: {0}")]
    Send(String),
}

/// An error computing intrinsic gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GasError {
    /// The intrinsic gas does not fit into a `u64`.
    #[error("intrinsic gas overflows u64 for {0} bytes of data")]
    Overflow(usize),
}

/// An error in the batcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A duration option was zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    /// The L2 halt fallback is enabled without an L2 inbox address.
    #[error("l2 halt threshold requires an L2 inbox address")]
    MissingL2Inbox,
}
