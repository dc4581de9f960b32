//! Error types for the replicated tree.

use crate::op::MetaKind;
use crate::types::{NodeId, PeerId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node already exists: {0}")]
    NodeExists(NodeId),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Node id space exhausted for peer {0}")]
    IdSpaceExhausted(PeerId),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("sled: {}", err),
        ))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Tree engine errors.
///
/// Validation failures of a direct, caller-initiated move and `ClockExhausted`
/// leave the log and the tree untouched.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Name already exists: '{name}' in {parent}")]
    AlreadyExists { parent: NodeId, name: String },

    #[error("Moving {child} under {new_parent} would create a cycle")]
    Cycle { child: NodeId, new_parent: NodeId },

    #[error("Reserved node cannot be moved: {0}")]
    ReservedNode(NodeId),

    #[error("Node {node} is a {existing}, cannot become a {requested}")]
    KindMismatch {
        node: NodeId,
        existing: MetaKind,
        requested: MetaKind,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Logical clock exhausted at counter {0}")]
    ClockExhausted(u64),

    #[error("Tree state corrupt: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for TreeError {
    fn from(err: config::ConfigError) -> Self {
        TreeError::Config(err.to_string())
    }
}

/// Outbox bookkeeping errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboxError {
    #[error("No pending operations for peer {0}")]
    UnknownPeer(PeerId),

    #[error("Committed op for peer {0} was not the oldest pending one")]
    NotOldest(PeerId),
}
