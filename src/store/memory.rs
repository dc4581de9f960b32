//! In-memory Node Store

use crate::error::StorageError;
use crate::op::NodeMeta;
use crate::store::{NodeStore, TreeState};
use crate::tree::node::TreeNode;
use crate::types::{NodeId, PeerId};
use std::collections::HashMap;

/// HashMap arena. Keeps reference counts so hosts and tests can observe the
/// `notify_ref`/`notify_rm_ref` stream.
#[derive(Debug)]
pub struct MemoryNodeStore {
    peer: PeerId,
    next_seq: u64,
    nodes: HashMap<NodeId, TreeNode>,
    refs: HashMap<NodeId, i64>,
    state: Option<TreeState>,
}

impl MemoryNodeStore {
    pub fn new(peer: PeerId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::ROOT, TreeNode::new(NodeId::ROOT, None, None));
        nodes.insert(NodeId::TRASH, TreeNode::new(NodeId::TRASH, None, None));
        Self {
            peer,
            next_seq: 1,
            nodes,
            refs: HashMap::new(),
            state: None,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Number of live parent edges pointing at `id`.
    pub fn ref_count(&self, id: NodeId) -> i64 {
        self.refs.get(&id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for MemoryNodeStore {
    fn new_node_id(&mut self) -> Result<NodeId, StorageError> {
        if self.next_seq > NodeId::MAX_SEQ {
            return Err(StorageError::IdSpaceExhausted(self.peer));
        }
        let id = NodeId::compose(self.peer, self.next_seq);
        self.next_seq += 1;
        Ok(id)
    }

    fn get(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn create_node(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        meta: Option<NodeMeta>,
    ) -> Result<TreeNode, StorageError> {
        if self.nodes.contains_key(&id) {
            return Err(StorageError::NodeExists(id));
        }
        let node = TreeNode::new(id, parent, meta);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn put_node(&mut self, node: &TreeNode) -> Result<(), StorageError> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), StorageError> {
        self.nodes
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NodeNotFound(id))
    }

    fn notify_ref(&mut self, id: NodeId, _from: NodeId) -> Result<(), StorageError> {
        *self.refs.entry(id).or_insert(0) += 1;
        Ok(())
    }

    fn notify_rm_ref(&mut self, id: NodeId, _from: NodeId) -> Result<(), StorageError> {
        *self.refs.entry(id).or_insert(0) -= 1;
        Ok(())
    }

    fn load_state(&self) -> Result<Option<TreeState>, StorageError> {
        Ok(self.state.clone())
    }

    fn save_state(&mut self, state: &TreeState) -> Result<(), StorageError> {
        self.state = Some(state.clone());
        Ok(())
    }
}
