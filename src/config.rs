//! Configuration System
//!
//! Layered configuration for one replica: built-in defaults, then the global
//! config file, then workspace files, then `MOVETREE__*` environment variables.

use crate::error::TreeError;
use crate::logging::LoggingConfig;
use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use merge::merge_policy::{DEFAULT_PUSH_BATCH_LIMIT, DEFAULT_STORE_PATH};
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MovetreeConfig {
    #[serde(default)]
    pub replica: ReplicaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of this replica and the peers it replicates with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Must be non-zero and fit in 32 bits; node ids embed it.
    #[serde(default = "default_peer_id")]
    pub peer_id: u64,

    #[serde(default)]
    pub peers: Vec<u64>,

    /// Sled database location, relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Max ops handed out per `export` / outbox drain
    #[serde(default = "default_push_batch_limit")]
    pub push_batch_limit: usize,
}

fn default_peer_id() -> u64 {
    1
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_push_batch_limit() -> usize {
    DEFAULT_PUSH_BATCH_LIMIT as usize
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            peer_id: default_peer_id(),
            peers: Vec::new(),
            store_path: default_store_path(),
            push_batch_limit: default_push_batch_limit(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Replica(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Replica(msg) => write!(f, "Replica: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ReplicaConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.peer_id == 0 || self.peer_id > u64::from(u32::MAX) {
            errors.push(format!(
                "peer_id {} must be between 1 and {}",
                self.peer_id,
                u32::MAX
            ));
        }
        if self.peers.contains(&self.peer_id) {
            errors.push(format!("peers must not contain own peer_id {}", self.peer_id));
        }
        let unique: BTreeSet<u64> = self.peers.iter().copied().collect();
        if unique.len() != self.peers.len() {
            errors.push("peers contains duplicates".to_string());
        }
        if self.store_path.as_os_str().is_empty() {
            errors.push("store_path cannot be empty".to_string());
        }
        if self.push_batch_limit == 0 {
            errors.push("push_batch_limit must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn peer(&self) -> PeerId {
        PeerId(self.peer_id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().copied().map(PeerId).collect()
    }

    /// Store path resolved against `workspace_root`.
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

impl MovetreeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors: Vec<ValidationError> = Vec::new();

        if let Err(replica_errors) = self.replica.validate() {
            errors.extend(replica_errors.into_iter().map(ValidationError::Replica));
        }
        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one `TreeError::Config`.
    pub fn ensure_valid(&self) -> Result<(), TreeError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            TreeError::Config(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}

/// Builds a [`MovetreeConfig`] from every configured layer.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<MovetreeConfig, TreeError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);

        let config: MovetreeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file on top of the defaults, ignoring every other layer.
    pub fn load_from_file(path: &Path) -> Result<MovetreeConfig, TreeError> {
        let config: MovetreeConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn default() -> MovetreeConfig {
        MovetreeConfig::default()
    }
}
