//! Peer exchange messages
//!
//! One JSON object per line. Transport is the host's business; this only fixes
//! the encoding of what travels between replicas.

use crate::op::Move;
use crate::tree::engine::PeriodicPush;
use crate::types::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMessage {
    /// A move, relayed by `from` (not necessarily its author).
    Op { from: PeerId, op: Move },
    /// Clock advertisement from a sender with nothing queued for the receiver.
    Push(PeriodicPush),
}

impl WireMessage {
    pub fn encode_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Decode every non-blank line, stopping at the first malformed one.
pub fn decode_lines(input: &str) -> Result<Vec<WireMessage>, (usize, serde_json::Error)> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| WireMessage::decode_line(line).map_err(|e| (n + 1, e)))
        .collect()
}
