//! Block identifiers and the rollup node's sync status.

use alloy_consensus::Header;
use alloy_primitives::{B256, Bytes, Sealed};
use derive_more::Display;

/// Identifies a block by number and hash.
///
/// The zero value is used as "unset".
#[derive(Debug, Display, Clone, Copy, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{hash}:{number}")]
pub struct BlockId {
    /// The block hash.
    pub hash: B256,
    /// The block number.
    pub number: u64,
}

impl BlockId {
    /// Instantiates a new [BlockId].
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { hash, number }
    }

    /// Returns `true` if this is the zero id.
    pub fn is_unset(&self) -> bool {
        self.number == 0 && self.hash.is_zero()
    }
}

/// A reference to a block with its parent and timestamp, as reported for chain tips.
#[derive(Debug, Display, Clone, Copy, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[display("{hash}:{number}")]
pub struct BlockRef {
    /// The block hash.
    pub hash: B256,
    /// The block number.
    pub number: u64,
    /// The parent block hash.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
}

impl BlockRef {
    /// Returns the [BlockId] of this block.
    pub const fn id(&self) -> BlockId {
        BlockId { hash: self.hash, number: self.number }
    }
}

impl From<&Sealed<Header>> for BlockRef {
    fn from(header: &Sealed<Header>) -> Self {
        Self {
            hash: header.hash(),
            number: header.number,
            parent_hash: header.parent_hash,
            timestamp: header.timestamp,
        }
    }
}

/// A reference to an L2 block, including its L1 origin.
#[derive(Debug, Display, Clone, Copy, Default, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[display("{block_info}")]
pub struct L2BlockRef {
    /// The block info.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub block_info: BlockRef,
    /// The L1 origin of the block.
    #[cfg_attr(feature = "serde", serde(rename = "l1origin"))]
    pub l1_origin: BlockId,
    /// The sequence number within the epoch.
    pub sequence_number: u64,
}

impl L2BlockRef {
    /// Returns the [BlockId] of this block.
    pub const fn id(&self) -> BlockId {
        self.block_info.id()
    }

    /// Returns the block number.
    pub const fn number(&self) -> u64 {
        self.block_info.number
    }
}

/// An L2 block as fetched for batching: the sealed header plus the encoded transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Block {
    /// The sealed block header.
    pub header: Sealed<Header>,
    /// The EIP-2718 encoded transactions of the block.
    pub transactions: Vec<Bytes>,
}

impl L2Block {
    /// Instantiates a new [L2Block].
    pub const fn new(header: Sealed<Header>, transactions: Vec<Bytes>) -> Self {
        Self { header, transactions }
    }

    /// Returns the [BlockId] of the block.
    pub fn id(&self) -> BlockId {
        BlockId { hash: self.header.hash(), number: self.header.number }
    }

    /// Returns the [BlockRef] of the block.
    pub fn block_ref(&self) -> BlockRef {
        BlockRef::from(&self.header)
    }

    /// Returns the parent block hash.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }
}

/// A snapshot of the rollup node's sync process.
///
/// Values that are not derived yet are zeroed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub struct SyncStatus {
    /// The L1 block the derivation process is currently idled at.
    pub current_l1: BlockRef,
    /// The L1 head block ref.
    pub head_l1: BlockRef,
    /// The L1 safe head block ref.
    pub safe_l1: BlockRef,
    /// The L1 finalized block ref.
    pub finalized_l1: BlockRef,
    /// The unsafe L2 head, produced locally but not yet posted.
    pub unsafe_l2: L2BlockRef,
    /// The safe L2 head, derived from data already posted to L1.
    pub safe_l2: L2BlockRef,
    /// The finalized L2 head.
    pub finalized_l2: L2BlockRef,
    /// The L2 head already safely posted on an intermediate layer.
    ///
    /// Only reported by multi-layer deployments.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub intermediate_safe_l2: Option<L2BlockRef>,
}
