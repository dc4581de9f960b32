//! Node Store
//!
//! Arena-style repository of tree nodes addressed by id, plus the slot where the
//! engine keeps its persisted state (clock, log, peer timestamps, outbox).
//! The replay algorithm only talks to storage through [`NodeStore`].

pub mod memory;
pub mod persistence;

pub use memory::MemoryNodeStore;
pub use persistence::SledNodeStore;

use crate::clock::{CombinedTimestamp, LamportClock};
use crate::error::StorageError;
use crate::op::{LogRecord, Move, NodeMeta};
use crate::tree::node::TreeNode;
use crate::types::{NodeId, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Engine state persisted next to the nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    pub clock: LamportClock,
    pub log: BTreeMap<CombinedTimestamp, LogRecord>,
    /// Origin peer -> highest counter integrated from it
    pub peer_timestamps: BTreeMap<PeerId, u64>,
    /// Peer -> ops not yet acknowledged, oldest first
    pub outbox: BTreeMap<PeerId, Vec<Move>>,
}

/// Node Store interface
pub trait NodeStore {
    fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    fn trash_id(&self) -> NodeId {
        NodeId::TRASH
    }

    /// Allocate an id that no other peer can ever allocate.
    fn new_node_id(&mut self) -> Result<NodeId, StorageError>;

    fn get(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError>;

    /// Create and store a fresh node. Fails if the id is taken.
    fn create_node(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        meta: Option<NodeMeta>,
    ) -> Result<TreeNode, StorageError>;

    fn put_node(&mut self, node: &TreeNode) -> Result<(), StorageError>;

    /// Physically drop a node. Host-driven compaction only; replay never calls this.
    fn remove_node(&mut self, id: NodeId) -> Result<(), StorageError>;

    /// An edge `from -> id` was added.
    fn notify_ref(&mut self, _id: NodeId, _from: NodeId) -> Result<(), StorageError> {
        Ok(())
    }

    /// An edge `from -> id` was removed.
    fn notify_rm_ref(&mut self, _id: NodeId, _from: NodeId) -> Result<(), StorageError> {
        Ok(())
    }

    fn load_state(&self) -> Result<Option<TreeState>, StorageError>;

    fn save_state(&mut self, state: &TreeState) -> Result<(), StorageError>;

    /// Get a node that must exist.
    fn require(&self, id: NodeId) -> Result<TreeNode, StorageError> {
        self.get(id)?.ok_or(StorageError::NodeNotFound(id))
    }
}
