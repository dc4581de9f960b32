//! Tree node representation

use crate::op::{MetaKind, Move, NodeMeta};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One arena node. Parent and children are ids, never references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub meta: Option<NodeMeta>,
    /// name -> child id, kept sorted by name
    pub children: BTreeMap<String, NodeId>,
    pub last_effective_op: Option<Move>,
}

impl TreeNode {
    pub fn new(id: NodeId, parent: Option<NodeId>, meta: Option<NodeMeta>) -> Self {
        Self {
            id,
            parent,
            meta,
            children: BTreeMap::new(),
            last_effective_op: None,
        }
    }

    /// Name under which the parent lists this node; reserved and detached nodes
    /// fall back to their id.
    pub fn name(&self) -> String {
        match &self.meta {
            Some(meta) => meta.name().to_string(),
            None => self.id.to_string(),
        }
    }

    pub fn kind(&self) -> Option<MetaKind> {
        self.meta.as_ref().map(NodeMeta::kind)
    }

    /// A non-reserved node without a parent: undone back to nothing, purged from
    /// Trash, or created as a stand-in for a parent that has not been seen yet.
    pub fn is_detached(&self) -> bool {
        self.parent.is_none() && !self.id.is_reserved()
    }
}
