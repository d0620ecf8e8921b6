//! Frame data handed out by the channel manager.

use alloy_primitives::{Bytes, hex};
use core::fmt;
use derive_more::Display;

/// The version byte prefixed to every batcher transaction's call data.
pub const DERIVATION_VERSION_0: u8 = 0;

/// The identifier of a channel.
#[derive(Clone, Copy, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ChannelId(pub [u8; 16]);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({self})")
    }
}

/// Identifies a frame within its channel.
#[derive(Debug, Display, Clone, Copy, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[display("{channel}:{frame_number}")]
pub struct FrameId {
    /// The channel the frame belongs to.
    pub channel: ChannelId,
    /// The frame number within the channel.
    pub frame_number: u16,
}

impl FrameId {
    /// Instantiates a new [FrameId].
    pub const fn new(channel: ChannelId, frame_number: u16) -> Self {
        Self { channel, frame_number }
    }
}

/// A single frame, ready to be sent as the data of one batcher transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxData {
    id: FrameId,
    frame: Bytes,
}

impl TxData {
    /// Instantiates a new [TxData] from an encoded frame.
    pub const fn new(id: FrameId, frame: Bytes) -> Self {
        Self { id, frame }
    }

    /// Returns the frame identifier.
    pub const fn id(&self) -> &FrameId {
        &self.id
    }

    /// Returns the encoded frame.
    pub const fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Returns the transaction call data: the version byte followed by the frame.
    pub fn call_data(&self) -> Bytes {
        let mut data = Vec::with_capacity(self.len());
        data.push(DERIVATION_VERSION_0);
        data.extend_from_slice(&self.frame);
        data.into()
    }

    /// Returns the length of the call data.
    pub fn len(&self) -> usize {
        self.frame.len() + 1
    }

    /// Returns `true` if the call data is empty, which it never is.
    pub const fn is_empty(&self) -> bool {
        false
    }
}
