//! Error types for history loading, version persistence and the apply engine

use std::path::PathBuf;
use thiserror::Error;

use docshift_interfaces::DatabaseError;

use crate::action::ActionError;
use crate::engine::Direction;

/// Errors raised while building a [`crate::MigrationHistory`]
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read migrations from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid migration file format: {}: {reason}", path.display())]
    InvalidMigrationFormat { path: PathBuf, reason: String },

    #[error("Duplicate migration version {version}")]
    DuplicateVersion { version: String },

    #[error("Migration version not found: {version}")]
    VersionNotFound { version: String },
}

impl HistoryError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HistoryError::InvalidMigrationFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the persisted current-version marker
#[derive(Debug, Error)]
pub enum VersionStoreError {
    #[error("Version collection '{collection}' is not initialized, run `docshift init` first")]
    NotInitialized { collection: String },

    #[error("Malformed version document in '{collection}': {message}")]
    Malformed { collection: String, message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Errors raised while applying migrations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Migration history is not valid: it must form a single chain")]
    InvalidHistory,

    #[error("Current version {version} is not part of the migration history")]
    UnknownCurrentVersion { version: String },

    #[error("{direction} of migration {version} ({title}) failed after {} completed step(s): {source}", completed.len())]
    StepFailed {
        direction: Direction,
        version: String,
        title: String,
        completed: Vec<String>,
        #[source]
        source: ActionError,
    },

    #[error(transparent)]
    Store(#[from] VersionStoreError),

    #[error(transparent)]
    History(#[from] HistoryError),
}
