//! Replicated tree
//!
//! Arena nodes, the undo/redo engine that moves them, a lock-wrapped shared
//! handle, and a deterministic walker.

pub mod engine;
pub mod node;
pub mod shared;
pub mod walker;

pub use engine::{ApplyMode, ApplyOutcome, PeriodicPush, TreeEngine};
pub use node::TreeNode;
pub use shared::SharedTree;
pub use walker::{Entry, Walker, WalkerConfig};
