//! Persistence layer for the Node Store

use crate::error::StorageError;
use crate::op::NodeMeta;
use crate::store::{NodeStore, TreeState};
use crate::tree::node::TreeNode;
use crate::types::{NodeId, PeerId};
use std::path::Path;
use tracing::{debug, trace};

const NODES_TREE: &str = "nodes";
const REFS_TREE: &str = "refs";
const STATE_KEY: &[u8] = b"state";
const SEQ_KEY: &[u8] = b"next_seq";

/// Sled-based implementation of NodeStore
pub struct SledNodeStore {
    db: sled::Db,
    nodes: sled::Tree,
    refs: sled::Tree,
    peer: PeerId,
}

impl SledNodeStore {
    /// Open (or create) a store at the given path for the given local peer.
    ///
    /// Root and Trash are created on first open.
    pub fn open<P: AsRef<Path>>(path: P, peer: PeerId) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        let nodes = db.open_tree(NODES_TREE)?;
        let refs = db.open_tree(REFS_TREE)?;
        let mut store = Self {
            db,
            nodes,
            refs,
            peer,
        };

        for reserved in [NodeId::ROOT, NodeId::TRASH] {
            if store.get(reserved)?.is_none() {
                debug!(node = %reserved, "Creating reserved node");
                store.put_node(&TreeNode::new(reserved, None, None))?;
            }
        }
        Ok(store)
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Check if a node exists in the store
    pub fn contains(&self, id: NodeId) -> Result<bool, StorageError> {
        Ok(self.nodes.contains_key(id.to_key())?)
    }

    /// All stored nodes in id order.
    pub fn list_nodes(&self) -> Result<Vec<TreeNode>, StorageError> {
        let mut nodes = Vec::new();
        for item in self.nodes.iter() {
            let (_, value) = item?;
            nodes.push(bincode::deserialize(&value)?);
        }
        Ok(nodes)
    }

    pub fn ref_count(&self, id: NodeId) -> Result<i64, StorageError> {
        Ok(self
            .refs
            .get(id.to_key())?
            .map(|v| decode_count(&v))
            .unwrap_or(0))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn adjust_ref(&self, id: NodeId, delta: i64) -> Result<(), StorageError> {
        self.refs.update_and_fetch(id.to_key(), |old| {
            let count = old.map(decode_count).unwrap_or(0) + delta;
            Some(count.to_be_bytes().to_vec())
        })?;
        Ok(())
    }
}

fn decode_count(bytes: &[u8]) -> i64 {
    bytes
        .try_into()
        .map(i64::from_be_bytes)
        .unwrap_or_default()
}

impl NodeStore for SledNodeStore {
    fn new_node_id(&mut self) -> Result<NodeId, StorageError> {
        let next = self.db.update_and_fetch(SEQ_KEY, |old| {
            let seq = old
                .and_then(|v| v.try_into().ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            Some((seq + 1).to_be_bytes().to_vec())
        })?;
        let seq = next
            .as_deref()
            .and_then(|v| v.try_into().ok())
            .map(u64::from_be_bytes)
            .ok_or_else(|| StorageError::Serialization("invalid sequence counter".to_string()))?;
        if seq > NodeId::MAX_SEQ {
            return Err(StorageError::IdSpaceExhausted(self.peer));
        }
        Ok(NodeId::compose(self.peer, seq))
    }

    fn get(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        match self.nodes.get(id.to_key())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn create_node(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        meta: Option<NodeMeta>,
    ) -> Result<TreeNode, StorageError> {
        let node = TreeNode::new(id, parent, meta);
        let value = bincode::serialize(&node)?;
        self.nodes
            .compare_and_swap(id.to_key(), None as Option<&[u8]>, Some(value))?
            .map_err(|_| StorageError::NodeExists(id))?;
        Ok(node)
    }

    fn put_node(&mut self, node: &TreeNode) -> Result<(), StorageError> {
        let value = bincode::serialize(node)?;
        self.nodes.insert(node.id.to_key(), value)?;
        Ok(())
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), StorageError> {
        self.nodes
            .remove(id.to_key())?
            .map(|_| ())
            .ok_or(StorageError::NodeNotFound(id))
    }

    fn notify_ref(&mut self, id: NodeId, from: NodeId) -> Result<(), StorageError> {
        trace!(node = %id, parent = %from, "ref");
        self.adjust_ref(id, 1)
    }

    fn notify_rm_ref(&mut self, id: NodeId, from: NodeId) -> Result<(), StorageError> {
        trace!(node = %id, parent = %from, "unref");
        self.adjust_ref(id, -1)
    }

    fn load_state(&self) -> Result<Option<TreeState>, StorageError> {
        match self.db.get(STATE_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn save_state(&mut self, state: &TreeState) -> Result<(), StorageError> {
        let value = bincode::serialize(state)?;
        self.db.insert(STATE_KEY, value)?;
        Ok(())
    }
}
