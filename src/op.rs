//! Operation & Log Record model
//!
//! A [`Move`] is the only mutation the tree knows: creation, rename, relocation and
//! deletion (relocation into Trash) are all moves. Each applied move leaves a
//! [`LogRecord`] carrying exactly what is needed to undo it.

use crate::clock::CombinedTimestamp;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata carried by every non-reserved node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMeta {
    Directory { name: String },
    File { name: String, file_ref: u64 },
    Symlink { name: String, target: String },
}

/// Variant tag of a [`NodeMeta`]; a node never changes kind once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaKind {
    Directory,
    File,
    Symlink,
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetaKind::Directory => "directory",
            MetaKind::File => "file",
            MetaKind::Symlink => "symlink",
        };
        f.write_str(s)
    }
}

impl NodeMeta {
    pub fn directory(name: impl Into<String>) -> Self {
        NodeMeta::Directory { name: name.into() }
    }

    pub fn file(name: impl Into<String>, file_ref: u64) -> Self {
        NodeMeta::File {
            name: name.into(),
            file_ref,
        }
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        NodeMeta::Symlink {
            name: name.into(),
            target: target.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeMeta::Directory { name } => name,
            NodeMeta::File { name, .. } => name,
            NodeMeta::Symlink { name, .. } => name,
        }
    }

    /// Same metadata under a different name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self {
            NodeMeta::Directory { .. } => NodeMeta::Directory { name },
            NodeMeta::File { file_ref, .. } => NodeMeta::File {
                name,
                file_ref: *file_ref,
            },
            NodeMeta::Symlink { target, .. } => NodeMeta::Symlink {
                name,
                target: target.clone(),
            },
        }
    }

    pub fn kind(&self) -> MetaKind {
        match self {
            NodeMeta::Directory { .. } => MetaKind::Directory,
            NodeMeta::File { .. } => MetaKind::File,
            NodeMeta::Symlink { .. } => MetaKind::Symlink,
        }
    }
}

/// Move `child` under `new_parent` with `new_meta`, ordered by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub timestamp: CombinedTimestamp,
    pub new_parent: NodeId,
    pub new_meta: NodeMeta,
    pub child: NodeId,
}

impl Move {
    pub fn new(
        timestamp: CombinedTimestamp,
        new_parent: NodeId,
        new_meta: NodeMeta,
        child: NodeId,
    ) -> Self {
        Self {
            timestamp,
            new_parent,
            new_meta,
            child,
        }
    }
}

/// Placement of the child immediately before a move was applied.
///
/// `old_parent == None` means the node did not exist yet, or existed only as a
/// detached placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoInfo {
    pub old_parent: Option<NodeId>,
    pub old_meta: Option<NodeMeta>,
    pub old_effective_op: Option<Move>,
}

/// Why a replayed move left the tree untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// New parent is the child itself or one of its descendants.
    Cycle,
    /// Root and Trash can never be moved.
    Reserved,
    /// The move would change the node's metadata kind.
    KindMismatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Cycle => "cycle",
            SkipReason::Reserved => "reserved node",
            SkipReason::KindMismatch => "kind mismatch",
        };
        f.write_str(s)
    }
}

/// What applying a move did to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// The child now sits under `op.new_parent` with `new_meta`, which differs from
    /// `op.new_meta` only when a name conflict forced a rename.
    Applied { undo: UndoInfo, new_meta: NodeMeta },
    /// The move was invalid at its position in the timeline and changed nothing.
    Skipped(SkipReason),
}

/// Reversible journal entry for one move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: CombinedTimestamp,
    pub op: Move,
    pub effect: Effect,
}

impl LogRecord {
    pub fn is_applied(&self) -> bool {
        matches!(self.effect, Effect::Applied { .. })
    }

    /// Name the child was actually installed under, if the move took effect.
    pub fn effective_name(&self) -> Option<&str> {
        match &self.effect {
            Effect::Applied { new_meta, .. } => Some(new_meta.name()),
            Effect::Skipped(_) => None,
        }
    }
}
