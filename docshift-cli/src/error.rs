//! Errors surfaced to the user by commands

use std::path::PathBuf;
use thiserror::Error;

use docshift_config::ConfigError;
use docshift_core::{EngineError, HistoryError, VersionStoreError};
use docshift_interfaces::DatabaseError;

/// Reason a command was rejected or failed
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Migrations directory {} does not exist, run `docshift init` first", path.display())]
    MigrationsDirMissing { path: PathBuf },

    #[error("A migration title is required")]
    MissingTitle,

    #[error("Version collection '{collection}' is not initialized, run `docshift init` first")]
    NotInitialized { collection: String },

    #[error("Version collection '{collection}' exists but holds no version document; drop it and run `docshift init` again")]
    VersionDocumentMissing { collection: String },

    #[error("Migration history is not valid: it must form a single chain")]
    InvalidHistory,

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    VersionStore(#[from] VersionStoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CommandError {
    /// Whether the error came from a migration file that could not be parsed
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CommandError::History(HistoryError::InvalidMigrationFormat { .. })
                | CommandError::Engine(EngineError::History(HistoryError::InvalidMigrationFormat { .. }))
        )
    }
}
