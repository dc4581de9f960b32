//! Peer Outbox
//!
//! Per-peer FIFO queues of operations waiting for delivery acknowledgment. The
//! engine enqueues; a transport drains with [`Outbox::pending_for`] and
//! acknowledges with [`Outbox::commit`]. Both sides may run on different threads.

use crate::error::OutboxError;
use crate::op::Move;
use crate::types::PeerId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use tracing::trace;

#[derive(Debug, Default)]
pub struct Outbox {
    queues: Mutex<BTreeMap<PeerId, VecDeque<Move>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot.
    pub fn from_snapshot(snapshot: BTreeMap<PeerId, Vec<Move>>) -> Self {
        let queues = snapshot
            .into_iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(peer, ops)| (peer, ops.into_iter().collect()))
            .collect();
        Self {
            queues: Mutex::new(queues),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<PeerId, Vec<Move>> {
        self.queues
            .lock()
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(peer, ops)| (*peer, ops.iter().cloned().collect()))
            .collect()
    }

    /// Enqueue `op` for each of `peers`.
    pub fn record<I>(&self, op: &Move, peers: I)
    where
        I: IntoIterator<Item = PeerId>,
    {
        let mut queues = self.queues.lock();
        for peer in peers {
            trace!(peer = %peer, timestamp = %op.timestamp, "Queue op");
            queues.entry(peer).or_default().push_back(op.clone());
        }
    }

    pub fn record_for(&self, peer: PeerId, op: Move) {
        trace!(peer = %peer, timestamp = %op.timestamp, "Queue op");
        self.queues.lock().entry(peer).or_default().push_back(op);
    }

    /// Oldest `limit` pending ops for `peer`, left in place until committed.
    pub fn pending_for(&self, peer: PeerId, limit: usize) -> Vec<Move> {
        self.queues
            .lock()
            .get(&peer)
            .map(|q| q.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_pending(&self, peer: PeerId) -> bool {
        self.queues
            .lock()
            .get(&peer)
            .map_or(false, |q| !q.is_empty())
    }

    pub fn pending_count(&self, peer: PeerId) -> usize {
        self.queues.lock().get(&peer).map_or(0, VecDeque::len)
    }

    /// Peers with at least one pending op.
    pub fn peers_with_pending(&self) -> Vec<PeerId> {
        self.queues
            .lock()
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// Acknowledge delivery of `op` to `peer`. Must name the oldest pending op.
    pub fn commit(&self, peer: PeerId, op: &Move) -> Result<(), OutboxError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&peer)
            .filter(|q| !q.is_empty())
            .ok_or(OutboxError::UnknownPeer(peer))?;
        if queue.front() != Some(op) {
            return Err(OutboxError::NotOldest(peer));
        }
        queue.pop_front();
        if queue.is_empty() {
            queues.remove(&peer);
        }
        Ok(())
    }

    /// Drop every pending op for a peer that left.
    pub fn forget(&self, peer: PeerId) -> usize {
        self.queues.lock().remove(&peer).map_or(0, |q| q.len())
    }
}
