//! Shared tree handle
//!
//! One engine behind a process-wide reader/writer lock. Every replay holds the
//! write guard for its whole duration, so readers never see a half-replayed tree.

use crate::error::TreeError;
use crate::op::{Move, NodeMeta};
use crate::outbox::Outbox;
use crate::peers::PeerDirectory;
use crate::store::NodeStore;
use crate::tree::engine::{ApplyOutcome, TreeEngine};
use crate::types::{NodeId, PeerId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

pub struct SharedTree<S: NodeStore, P: PeerDirectory> {
    inner: Arc<RwLock<TreeEngine<S, P>>>,
    outbox: Arc<Outbox>,
}

impl<S: NodeStore, P: PeerDirectory> Clone for SharedTree<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            outbox: Arc::clone(&self.outbox),
        }
    }
}

impl<S: NodeStore, P: PeerDirectory> SharedTree<S, P> {
    pub fn new(engine: TreeEngine<S, P>) -> Self {
        let outbox = engine.outbox();
        Self {
            inner: Arc::new(RwLock::new(engine)),
            outbox,
        }
    }

    /// Exclusive access for anything that mutates the tree or the log.
    pub fn global_rw_lock(&self) -> RwLockWriteGuard<'_, TreeEngine<S, P>> {
        self.inner.write()
    }

    /// Shared access for lookups.
    pub fn global_r_lock(&self) -> RwLockReadGuard<'_, TreeEngine<S, P>> {
        self.inner.read()
    }

    /// The outbox is synchronized on its own, so draining it never waits on a replay.
    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    pub fn move_node(
        &self,
        new_parent: NodeId,
        meta: NodeMeta,
        child: NodeId,
    ) -> Result<Move, TreeError> {
        self.global_rw_lock().move_node(new_parent, meta, child)
    }

    pub fn trash(&self, meta: NodeMeta, child: NodeId) -> Result<Move, TreeError> {
        self.global_rw_lock().trash(meta, child)
    }

    pub fn new_node_id(&self) -> Result<NodeId, TreeError> {
        self.global_rw_lock().new_node_id()
    }

    pub fn apply_external_op(&self, from: PeerId, op: Move) -> Result<ApplyOutcome, TreeError> {
        self.global_rw_lock().apply_external_op(from, op)
    }

    pub fn traverse<T: AsRef<str>>(&self, names: &[T]) -> Result<Option<NodeId>, TreeError> {
        self.global_r_lock().traverse(names)
    }
}
