//! movetree: Replicated Filesystem Tree
//!
//! A tree of directories, files and symlinks replicated across peers without a
//! coordinator. Every mutation is a timestamped move; replicas integrate each
//! other's moves through undo/redo replay and converge on the same tree.

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod op;
pub mod outbox;
pub mod peers;
pub mod store;
pub mod tree;
pub mod types;
pub mod wire;

pub use clock::{CombinedTimestamp, LamportClock};
pub use error::{OutboxError, StorageError, TreeError};
pub use op::{Effect, LogRecord, MetaKind, Move, NodeMeta, SkipReason, UndoInfo};
pub use outbox::Outbox;
pub use peers::{PeerDirectory, StaticPeers};
pub use store::{MemoryNodeStore, NodeStore, SledNodeStore, TreeState};
pub use tree::{ApplyMode, ApplyOutcome, PeriodicPush, SharedTree, TreeEngine, TreeNode};
pub use types::{NodeId, PeerId};
