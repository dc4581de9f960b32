//! Tree Engine
//!
//! Applies [`Move`] operations to a [`NodeStore`] so that every replica ends up
//! with the same tree no matter in which order operations arrive.
//!
//! Operations are kept in a log ordered by [`CombinedTimestamp`]. An operation
//! older than the newest log entry is integrated by undoing every newer record,
//! applying the arrival, and redoing the undone records on top. A redone record
//! may have a different effect than it had the first time (a rename may now
//! collide, a move may now form a cycle), which is what makes concurrent edits
//! converge.

use crate::clock::{CombinedTimestamp, LamportClock};
use crate::error::TreeError;
use crate::op::{Effect, LogRecord, Move, NodeMeta, SkipReason, UndoInfo};
use crate::outbox::Outbox;
use crate::peers::PeerDirectory;
use crate::store::{NodeStore, TreeState};
use crate::tree::node::TreeNode;
use crate::tree::walker::{Entry, Walker};
use crate::types::{NodeId, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Longest ancestor chain the cycle check will follow before declaring the
/// parent graph broken.
pub const MAX_TREE_DEPTH: usize = 1 << 20;

/// How validation failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Local caller-initiated move: failures are returned as errors.
    Direct,
    /// Remote op or redo during replay: failures become no-op log records.
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Duplicate,
}

/// Clock advertisement sent to a peer whose outbox has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicPush {
    pub from: PeerId,
    pub timestamp: u64,
}

pub struct TreeEngine<S: NodeStore, P: PeerDirectory> {
    store: S,
    peers: P,
    clock: LamportClock,
    log: BTreeMap<CombinedTimestamp, LogRecord>,
    peer_timestamps: BTreeMap<PeerId, u64>,
    outbox: Arc<Outbox>,
}

impl<S: NodeStore, P: PeerDirectory> TreeEngine<S, P> {
    /// Create an engine over `store`, restoring clock, log, peer timestamps and
    /// outbox from the store's saved state if there is one.
    pub fn new(store: S, peers: P) -> Result<Self, TreeError> {
        let TreeState {
            clock,
            log,
            peer_timestamps,
            outbox,
        } = store.load_state()?.unwrap_or_default();

        if let Some((ts, record)) = log.iter().find(|(ts, r)| **ts != r.timestamp) {
            return Err(TreeError::Corrupt(format!(
                "log key {} holds record {}",
                ts, record.timestamp
            )));
        }

        debug!(
            peer = %peers.self_id(),
            log_len = log.len(),
            clock = clock.current(),
            "Opened tree engine"
        );

        Ok(Self {
            store,
            peers,
            clock,
            log,
            peer_timestamps,
            outbox: Arc::new(Outbox::from_snapshot(outbox)),
        })
    }

    /// Write clock, log, peer timestamps and outbox to the store.
    pub fn persist(&mut self) -> Result<(), TreeError> {
        let state = TreeState {
            clock: self.clock,
            log: self.log.clone(),
            peer_timestamps: self.peer_timestamps.clone(),
            outbox: self.outbox.snapshot(),
        };
        self.store.save_state(&state)?;
        Ok(())
    }

    pub fn self_id(&self) -> PeerId {
        self.peers.self_id()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access for host-driven compaction.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn peers(&self) -> &P {
        &self.peers
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Log records in timestamp order.
    pub fn log_records(&self) -> impl Iterator<Item = &LogRecord> {
        self.log.values()
    }

    /// Highest counter integrated from `peer`, if any.
    pub fn peer_timestamp(&self, peer: PeerId) -> Option<u64> {
        self.peer_timestamps.get(&peer).copied()
    }

    pub fn get_node(&self, id: NodeId) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.store.get(id)?)
    }

    pub fn new_node_id(&mut self) -> Result<NodeId, TreeError> {
        Ok(self.store.new_node_id()?)
    }

    /// Issue a local move and queue it for every known peer.
    ///
    /// On error nothing changes besides the clock having ticked.
    pub fn move_node(
        &mut self,
        new_parent: NodeId,
        meta: NodeMeta,
        child: NodeId,
    ) -> Result<Move, TreeError> {
        if self.clock.current() == u64::MAX {
            return Err(TreeError::ClockExhausted(u64::MAX));
        }
        let timestamp = CombinedTimestamp::new(self.clock.get_timestamp(), self.self_id());
        let op = Move::new(timestamp, new_parent, meta, child);
        self.apply_op(op.clone(), ApplyMode::Direct)?;
        self.outbox.record(&op, self.peers.peers());
        Ok(op)
    }

    /// Delete by moving into Trash. The trash entry is named after the node id,
    /// so trashing never collides.
    pub fn trash(&mut self, meta: NodeMeta, child: NodeId) -> Result<Move, TreeError> {
        let meta = meta.with_name(child.to_string());
        self.move_node(NodeId::TRASH, meta, child)
    }

    /// Integrate an op received from `from`.
    ///
    /// Ops authored by self, ops at or below the author's high-water mark, and
    /// ops already in the log are duplicates and change nothing. The high-water
    /// mark is only advanced by ops delivered by their author. An op carrying
    /// the largest possible counter is refused before anything changes.
    pub fn apply_external_op(&mut self, from: PeerId, op: Move) -> Result<ApplyOutcome, TreeError> {
        if op.timestamp.counter == u64::MAX {
            warn!(from = %from, timestamp = %op.timestamp, "Refusing op with exhausted counter");
            return Err(TreeError::ClockExhausted(op.timestamp.counter));
        }

        let origin = op.timestamp.peer;
        let below_high_water = self
            .peer_timestamps
            .get(&origin)
            .map_or(false, |hw| op.timestamp.counter <= *hw);

        if origin == self.self_id() || below_high_water || self.log.contains_key(&op.timestamp) {
            trace!(from = %from, timestamp = %op.timestamp, "Duplicate op");
            return Ok(ApplyOutcome::Duplicate);
        }

        debug!(
            from = %from,
            timestamp = %op.timestamp,
            child = %op.child,
            new_parent = %op.new_parent,
            name = op.new_meta.name(),
            "Applying external op"
        );

        let counter = op.timestamp.counter;
        self.apply_op(op, ApplyMode::Replay)?;

        if from == origin {
            let hw = self.peer_timestamps.entry(origin).or_insert(counter);
            *hw = (*hw).max(counter);
        }
        self.try_trim_log()?;

        Ok(ApplyOutcome::Applied)
    }

    /// Core undo/redo integration of one op.
    pub fn apply_op(&mut self, op: Move, mode: ApplyMode) -> Result<(), TreeError> {
        if self.log.contains_key(&op.timestamp) {
            trace!(timestamp = %op.timestamp, "Op already in log");
            return Ok(());
        }

        let counter = op.timestamp.counter;
        // The timestamp is not in the log, so this holds exactly the newer records
        let mut newer = self.log.split_off(&op.timestamp);

        if newer.is_empty() {
            let record = self.do_op(op, mode)?;
            self.log.insert(record.timestamp, record);
        } else {
            if mode == ApplyMode::Direct {
                self.log.append(&mut newer);
                return Err(TreeError::Corrupt(format!(
                    "local op {} is older than the newest logged op",
                    op.timestamp
                )));
            }

            debug!(
                timestamp = %op.timestamp,
                undo_count = newer.len(),
                "Replaying log around older op"
            );

            for record in newer.values().rev() {
                trace!(timestamp = %record.timestamp, "Undo");
                self.undo_op(record)?;
            }

            let record = self.do_op(op, ApplyMode::Replay)?;
            self.log.insert(record.timestamp, record);

            for (_, record) in newer {
                trace!(timestamp = %record.timestamp, "Redo");
                let redone = self.do_op(record.op, ApplyMode::Replay)?;
                self.log.insert(redone.timestamp, redone);
            }
        }

        self.clock.update_timestamp(counter);
        Ok(())
    }

    /// Validate and perform one move against the current tree.
    fn do_op(&mut self, op: Move, mode: ApplyMode) -> Result<LogRecord, TreeError> {
        let child_id = op.child;

        if child_id.is_reserved() {
            return self.reject(op, mode, SkipReason::Reserved, TreeError::ReservedNode(child_id));
        }

        if op.new_parent == child_id {
            let err = TreeError::Cycle {
                child: child_id,
                new_parent: op.new_parent,
            };
            return self.reject(op, mode, SkipReason::Cycle, err);
        }

        let parent_exists = self.store.get(op.new_parent)?.is_some();
        if !parent_exists {
            if mode == ApplyMode::Direct {
                return Err(TreeError::NodeNotFound(op.new_parent));
            }
            debug!(
                parent = %op.new_parent,
                child = %child_id,
                "Creating placeholder for unseen parent"
            );
            self.store.create_node(op.new_parent, None, None)?;
        } else if self.is_ancestor(child_id, op.new_parent)? {
            let err = TreeError::Cycle {
                child: child_id,
                new_parent: op.new_parent,
            };
            return self.reject(op, mode, SkipReason::Cycle, err);
        }

        // Nodes purged from Trash keep their meta and are checked too
        let existing = self.store.get(child_id)?;
        if let Some(node) = existing.as_ref() {
            if let Some(kind) = node.kind() {
                let requested = op.new_meta.kind();
                if kind != requested {
                    let err = TreeError::KindMismatch {
                        node: child_id,
                        existing: kind,
                        requested,
                    };
                    return self.reject(op, mode, SkipReason::KindMismatch, err);
                }
            }
        }

        let parent = self.store.require(op.new_parent)?;
        let mut name = op.new_meta.name().to_string();
        while let Some(other) = parent.children.get(&name) {
            if *other == child_id {
                break;
            }
            if mode == ApplyMode::Direct {
                return Err(TreeError::AlreadyExists {
                    parent: op.new_parent,
                    name,
                });
            }
            name = format!("{}.conflict.{}", name, child_id);
        }
        let new_meta = if name == op.new_meta.name() {
            op.new_meta.clone()
        } else {
            debug!(
                child = %child_id,
                requested = op.new_meta.name(),
                installed = %name,
                "Resolved name conflict"
            );
            op.new_meta.with_name(name.as_str())
        };

        let mut node = match existing {
            Some(node) => node,
            None => self.store.create_node(child_id, None, None)?,
        };
        let undo = UndoInfo {
            old_parent: node.parent,
            old_meta: node.meta.clone(),
            old_effective_op: node.last_effective_op.clone(),
        };

        if let (Some(old_parent), Some(old_meta)) = (node.parent, node.meta.as_ref()) {
            self.unlink(old_parent, old_meta.name(), child_id)?;
        }
        self.link(op.new_parent, &name, child_id)?;

        node.parent = Some(op.new_parent);
        node.meta = Some(new_meta.clone());
        node.last_effective_op = Some(op.clone());
        self.store.put_node(&node)?;

        Ok(LogRecord {
            timestamp: op.timestamp,
            op,
            effect: Effect::Applied { undo, new_meta },
        })
    }

    /// Error out for a direct op, or record a no-op for a replayed one.
    fn reject(
        &self,
        op: Move,
        mode: ApplyMode,
        reason: SkipReason,
        err: TreeError,
    ) -> Result<LogRecord, TreeError> {
        match mode {
            ApplyMode::Direct => Err(err),
            ApplyMode::Replay => {
                warn!(
                    timestamp = %op.timestamp,
                    child = %op.child,
                    new_parent = %op.new_parent,
                    reason = %reason,
                    "Skipping op"
                );
                Ok(LogRecord {
                    timestamp: op.timestamp,
                    op,
                    effect: Effect::Skipped(reason),
                })
            }
        }
    }

    /// Restore the child to exactly where it was before `record` was applied.
    fn undo_op(&mut self, record: &LogRecord) -> Result<(), TreeError> {
        let (undo, new_meta) = match &record.effect {
            Effect::Applied { undo, new_meta } => (undo, new_meta),
            Effect::Skipped(_) => return Ok(()),
        };
        let child_id = record.op.child;
        let mut node = self.store.require(child_id)?;

        self.unlink(record.op.new_parent, new_meta.name(), child_id)?;

        match (undo.old_parent, undo.old_meta.as_ref()) {
            (Some(old_parent), Some(old_meta)) => {
                self.link(old_parent, old_meta.name(), child_id)?;
                node.parent = Some(old_parent);
                node.meta = Some(old_meta.clone());
            }
            (None, old_meta) => {
                node.parent = None;
                node.meta = old_meta.cloned();
            }
            (Some(old_parent), None) => {
                return Err(TreeError::Corrupt(format!(
                    "undo of {} restores {} under {} without metadata",
                    record.timestamp, child_id, old_parent
                )));
            }
        }
        node.last_effective_op = undo.old_effective_op.clone();
        self.store.put_node(&node)?;
        Ok(())
    }

    fn link(&mut self, parent_id: NodeId, name: &str, child: NodeId) -> Result<(), TreeError> {
        let mut parent = self.store.require(parent_id)?;
        if let Some(other) = parent.children.insert(name.to_string(), child) {
            if other != child {
                return Err(TreeError::Corrupt(format!(
                    "'{}' in {} already taken by {}",
                    name, parent_id, other
                )));
            }
        }
        self.store.put_node(&parent)?;
        self.store.notify_ref(child, parent_id)?;
        Ok(())
    }

    fn unlink(&mut self, parent_id: NodeId, name: &str, child: NodeId) -> Result<(), TreeError> {
        let mut parent = self.store.require(parent_id)?;
        match parent.children.get(name) {
            Some(id) if *id == child => {
                parent.children.remove(name);
            }
            _ => {
                return Err(TreeError::Corrupt(format!(
                    "{} is not listed as '{}' in {}",
                    child, name, parent_id
                )));
            }
        }
        self.store.put_node(&parent)?;
        self.store.notify_rm_ref(child, parent_id)?;
        Ok(())
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> Result<bool, TreeError> {
        let mut current = node;
        for _ in 0..MAX_TREE_DEPTH {
            if current == ancestor {
                return Ok(true);
            }
            match self.store.get(current)?.and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
        Err(TreeError::Corrupt(format!(
            "parent chain of {} exceeds {} levels",
            node, MAX_TREE_DEPTH
        )))
    }

    /// Drop every log record no peer can still send anything older than.
    ///
    /// Returns the number of records dropped. Nodes whose last trimmed move put
    /// them into Trash are detached from Trash, releasing their reference.
    pub fn try_trim_log(&mut self) -> Result<usize, TreeError> {
        let peers = self.peers.peers();
        if peers.is_empty() {
            return Ok(0);
        }

        let mut min = u64::MAX;
        for peer in &peers {
            match self.peer_timestamps.get(peer) {
                Some(ts) => min = min.min(*ts),
                None => return Ok(0),
            }
        }

        let kept = self.log.split_off(&CombinedTimestamp::first_after(min));
        let trimmed = std::mem::replace(&mut self.log, kept);
        if trimmed.is_empty() {
            return Ok(0);
        }

        let mut last_destination: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for record in trimmed.values().filter(|r| r.is_applied()) {
            last_destination.insert(record.op.child, record.op.new_parent);
        }

        let mut purged = 0;
        for (child, destination) in last_destination {
            if destination != NodeId::TRASH {
                continue;
            }
            let still_logged = self
                .log
                .values()
                .any(|r| r.op.child == child || r.op.new_parent == child);
            if !still_logged && self.purge_from_trash(child)? {
                purged += 1;
            }
        }

        info!(
            trimmed = trimmed.len(),
            purged,
            up_to = min,
            remaining = self.log.len(),
            "Trimmed log"
        );
        Ok(trimmed.len())
    }

    fn purge_from_trash(&mut self, child: NodeId) -> Result<bool, TreeError> {
        let mut node = match self.store.get(child)? {
            Some(node) if node.parent == Some(NodeId::TRASH) => node,
            _ => return Ok(false),
        };
        self.unlink(NodeId::TRASH, &node.name(), child)?;
        node.parent = None;
        self.store.put_node(&node)?;
        debug!(node = %child, "Purged from trash");
        Ok(true)
    }

    /// Clock advertisement for `peer`, only while nothing is queued for it.
    pub fn periodic_push(&self, peer: PeerId) -> Option<PeriodicPush> {
        if self.outbox.has_pending(peer) {
            return None;
        }
        Some(PeriodicPush {
            from: self.self_id(),
            timestamp: self.clock.current(),
        })
    }

    /// Raise the high-water mark for `from` (never lowers it) and try to trim.
    pub fn update_external_timestamp(&mut self, from: PeerId, timestamp: u64) -> Result<usize, TreeError> {
        let hw = self.peer_timestamps.entry(from).or_insert(timestamp);
        *hw = (*hw).max(timestamp);
        trace!(peer = %from, timestamp = *hw, "Updated peer timestamp");
        self.try_trim_log()
    }

    /// Queue, for `peer`, the last effective op of every node reachable from
    /// Root or Trash, oldest first. Returns the number of queued ops.
    pub fn record_bootstrap_for(&mut self, peer: PeerId) -> Result<usize, TreeError> {
        let mut ops = Vec::new();
        for start in [NodeId::ROOT, NodeId::TRASH] {
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                let node = self.store.require(id)?;
                if let Some(op) = node.last_effective_op {
                    ops.push(op);
                }
                stack.extend(node.children.values().copied());
            }
        }
        ops.sort_by_key(|op| op.timestamp);

        let count = ops.len();
        for op in ops {
            self.outbox.record_for(peer, op);
        }
        info!(peer = %peer, ops = count, "Recorded bootstrap");
        Ok(count)
    }

    /// Resolve a path of names from Root.
    pub fn traverse<T: AsRef<str>>(&self, names: &[T]) -> Result<Option<NodeId>, TreeError> {
        self.traverse_from(NodeId::ROOT, names)
    }

    /// Resolve a path of names from an arbitrary node.
    pub fn traverse_from<T: AsRef<str>>(
        &self,
        from: NodeId,
        names: &[T],
    ) -> Result<Option<NodeId>, TreeError> {
        let mut current = from;
        for name in names {
            let node = match self.store.get(current)? {
                Some(node) => node,
                None => return Ok(None),
            };
            match node.children.get(name.as_ref()) {
                Some(child) => current = *child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Depth-first search of the Root subtree. Returns the name and parent of the
    /// first node matching `predicate`.
    pub fn find_parent<F>(&self, predicate: F) -> Result<Option<(String, NodeId)>, TreeError>
    where
        F: Fn(&TreeNode) -> bool,
    {
        let root = self.store.require(NodeId::ROOT)?;
        let mut stack: Vec<(String, NodeId, NodeId)> = root
            .children
            .iter()
            .rev()
            .map(|(name, id)| (name.clone(), *id, NodeId::ROOT))
            .collect();

        while let Some((name, id, parent)) = stack.pop() {
            let node = self.store.require(id)?;
            if predicate(&node) {
                return Ok(Some((name, parent)));
            }
            for (child_name, child) in node.children.iter().rev() {
                stack.push((child_name.clone(), *child, id));
            }
        }
        Ok(None)
    }

    /// Pre-order listing of the subtree below `from`.
    pub fn walk(&self, from: NodeId) -> Result<Vec<Entry>, TreeError> {
        Ok(Walker::new(&self.store, from).walk()?)
    }
}
