//! Core identifier types for the replicated tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PeerId: identity of one replica. Assigned by the host, never by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Smallest possible peer id; used as the lower bound when splitting the log by counter.
    pub const MIN: PeerId = PeerId(0);
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// NodeID: arena address of a tree node.
///
/// Freshly allocated ids pack the allocating peer into the upper 32 bits and a
/// per-peer sequence number into the lower 32 bits, so ids never clash across peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
    pub const TRASH: NodeId = NodeId(1);

    /// Largest per-peer sequence number that fits in an id. Stores refuse to
    /// allocate past it.
    pub const MAX_SEQ: u64 = u32::MAX as u64;

    /// Compose a globally unique id from the allocating peer and its local sequence.
    /// `seq` must not exceed [`NodeId::MAX_SEQ`].
    pub fn compose(peer: PeerId, seq: u64) -> Self {
        NodeId((peer.0 << 32) | (seq & 0xFFFF_FFFF))
    }

    pub fn is_reserved(&self) -> bool {
        *self == Self::ROOT || *self == Self::TRASH
    }

    /// Big-endian key bytes, so that store iteration follows id order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(NodeId(u64::from_be_bytes(arr)))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
