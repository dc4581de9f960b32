//! Logical Clock
//!
//! Lamport counter owned by one tree engine, plus the combined timestamp that
//! totally orders operations from every peer.

use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// (counter, peer) pair. Field order matters: the derived ordering compares the
/// counter first and falls back to the peer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinedTimestamp {
    pub counter: u64,
    pub peer: PeerId,
}

impl CombinedTimestamp {
    pub fn new(counter: u64, peer: PeerId) -> Self {
        Self { counter, peer }
    }

    /// First possible timestamp with a counter strictly above `counter`.
    pub fn first_after(counter: u64) -> Self {
        Self {
            counter: counter.saturating_add(1),
            peer: PeerId::MIN,
        }
    }
}

impl fmt::Display for CombinedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.peer)
    }
}

/// Lamport clock.
///
/// `counter` is the last value issued or observed. Every value handed out by
/// [`LamportClock::get_timestamp`] is strictly greater than anything seen before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    counter: u64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh counter value.
    ///
    /// Saturates at `u64::MAX`; callers refuse to issue past that point.
    pub fn get_timestamp(&mut self) -> u64 {
        self.counter = self.counter.saturating_add(1);
        self.counter
    }

    /// The value the next `get_timestamp` call will return.
    pub fn peek_timestamp(&self) -> u64 {
        self.counter.saturating_add(1)
    }

    /// Last issued or observed value.
    pub fn current(&self) -> u64 {
        self.counter
    }

    /// Lamport receive rule. Returns the previous counter.
    pub fn update_timestamp(&mut self, received: u64) -> u64 {
        let old = self.counter;
        self.counter = old.max(received).saturating_add(1);
        old
    }
}
