//! CLI output: error type and mapping from domain errors to the CLI surface.

use crate::error::{OutboxError, StorageError, TreeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error("No such path: /{0}")]
    PathNotFound(String),

    #[error("Invalid path: '{0}'")]
    InvalidPath(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        CliError::Tree(TreeError::Storage(err))
    }
}

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &CliError) -> String {
    match e {
        CliError::Tree(TreeError::AlreadyExists { name, .. }) => {
            format!("'{}' already exists", name)
        }
        CliError::Tree(TreeError::Cycle { .. }) => {
            "Cannot move a directory into itself".to_string()
        }
        other => other.to_string(),
    }
}
