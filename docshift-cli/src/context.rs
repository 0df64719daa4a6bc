//! Shared command state and precondition checks

use std::path::PathBuf;
use std::sync::Arc;

use docshift_config::DocshiftConfig;
use docshift_core::{MigrationHistory, VersionStore};
use docshift_interfaces::DocumentDatabase;
use docshift_storage::Connector;

use crate::error::CommandError;

/// Configuration plus a way to reach the database
#[derive(Clone)]
pub struct CommandContext {
    pub config: DocshiftConfig,
    connector: Arc<dyn Connector>,
}

/// Everything a mutating command needs once its preconditions hold
pub struct Prepared {
    pub db: Arc<dyn DocumentDatabase>,
    pub store: VersionStore,
    pub history: MigrationHistory,
}

impl CommandContext {
    pub fn new(config: DocshiftConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.config.migrations.directory_path()
    }

    pub fn version_store(&self) -> VersionStore {
        VersionStore::new(&self.config.migrations.collection)
    }

    pub async fn connect(&self) -> Result<Arc<dyn DocumentDatabase>, CommandError> {
        let db = self.connector.connect(&self.config.database).await?;
        tracing::debug!("Using database {}", db.name());
        Ok(db)
    }

    pub(crate) fn require_migrations_dir(&self) -> Result<PathBuf, CommandError> {
        let dir = self.migrations_dir();
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CommandError::MigrationsDirMissing { path: dir })
        }
    }

    /// Check, in order: directory exists, database reachable, version store
    /// initialized, history loads and, when non-empty, validates
    pub async fn prepare(&self) -> Result<Prepared, CommandError> {
        let dir = self.require_migrations_dir()?;
        let db = self.connect().await?;

        let store = self.version_store();
        if !store.is_initialized(db.as_ref()).await? {
            return Err(CommandError::NotInitialized {
                collection: store.collection().to_string(),
            });
        }

        let history = load_valid_history(&dir)?;
        Ok(Prepared { db, store, history })
    }
}

/// Load the history in `dir`; a non-empty history must form a single chain
pub(crate) fn load_valid_history(dir: &std::path::Path) -> Result<MigrationHistory, CommandError> {
    let history = MigrationHistory::load(dir)?;
    if !history.is_empty() && !history.validate() {
        return Err(CommandError::InvalidHistory);
    }
    Ok(history)
}
