//! Tree walker for listing a subtree

use crate::error::StorageError;
use crate::op::NodeMeta;
use crate::store::NodeStore;
use crate::types::NodeId;

/// One listed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Slash-joined names from the walk start (exclusive) down to this node
    pub path: String,
    pub id: NodeId,
    pub meta: NodeMeta,
    /// 1 for direct children of the walk start
    pub depth: usize,
}

/// Tree walker configuration
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
}

/// Pre-order walker over a store. Siblings come in lexical name order, so two
/// replicas holding the same tree produce identical listings.
pub struct Walker<'a, S: NodeStore> {
    store: &'a S,
    start: NodeId,
    config: WalkerConfig,
}

impl<'a, S: NodeStore> Walker<'a, S> {
    pub fn new(store: &'a S, start: NodeId) -> Self {
        Self {
            store,
            start,
            config: WalkerConfig::default(),
        }
    }

    pub fn with_config(store: &'a S, start: NodeId, config: WalkerConfig) -> Self {
        Self {
            store,
            start,
            config,
        }
    }

    /// Walk the subtree below the start node. The start node itself is not listed.
    pub fn walk(&self) -> Result<Vec<Entry>, StorageError> {
        let mut entries = Vec::new();
        let root = self.store.require(self.start)?;

        // Reverse push so that popping yields ascending names
        let mut stack: Vec<(String, NodeId, usize)> = root
            .children
            .iter()
            .rev()
            .map(|(name, id)| (name.clone(), *id, 1))
            .collect();

        while let Some((path, id, depth)) = stack.pop() {
            let node = self.store.require(id)?;
            let Some(meta) = node.meta.clone() else {
                continue;
            };

            let descend = self.config.max_depth.map_or(true, |max| depth < max);
            if descend {
                for (name, child) in node.children.iter().rev() {
                    stack.push((format!("{}/{}", path, name), *child, depth + 1));
                }
            }

            entries.push(Entry {
                path,
                id,
                meta,
                depth,
            });
        }

        Ok(entries)
    }
}
