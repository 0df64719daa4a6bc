//! Shared fixtures: a temp migrations directory and an in-memory database

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use docshift_cli::CommandContext;
use docshift_config::DocshiftConfig;
use docshift_core::{MigrationHistory, VersionStore};
use docshift_storage::{MemoryConnector, MemoryDatabase};

pub struct TestEnv {
    _root: TempDir,
    pub connector: MemoryConnector,
    pub ctx: CommandContext,
}

/// One migration as read back from disk
#[derive(Debug, Clone)]
pub struct CreatedMigration {
    pub path: PathBuf,
    pub version: String,
    pub title: String,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let root = tempfile::tempdir()?;
        let mut config = DocshiftConfig::default();
        config.database.name = "docshift_test".to_string();
        config.migrations.directory = root.path().join("migrations").to_string_lossy().into_owned();

        let connector = MemoryConnector::new(MemoryDatabase::new("docshift_test"));
        let ctx = CommandContext::new(config, Arc::new(connector.clone()));
        Ok(Self {
            _root: root,
            connector,
            ctx,
        })
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.ctx.migrations_dir()
    }

    pub fn db(&self) -> &MemoryDatabase {
        self.connector.database()
    }

    pub async fn current_version(&self) -> Result<Option<String>> {
        let store = VersionStore::new(&self.ctx.config.migrations.collection);
        Ok(store.get_current_version(self.db()).await?)
    }

    pub async fn collections(&self) -> Result<Vec<String>> {
        use docshift_interfaces::DocumentDatabase;
        Ok(self.db().list_collection_names().await?)
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections().await?.iter().any(|c| c == name))
    }

    pub fn file_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.migrations_dir())?.count())
    }

    /// Create `count` migrations titled "Test migration N", each creating
    /// `test_collection_N` on upgrade and dropping it on downgrade
    pub async fn create_migrations(&self, count: usize, with_operations: bool) -> Result<Vec<CreatedMigration>> {
        for i in 1..=count {
            docshift_cli::commands::create::run(&self.ctx, &format!("Test migration {}", i)).await?;
        }
        let migrations = self.read_migrations()?;
        if with_operations {
            for (i, migration) in migrations.iter().enumerate() {
                write_operations(
                    &migration.path,
                    &format!("[{{op: create_collection, name: test_collection_{}}}]", i + 1),
                    &format!("[{{op: drop_collection, name: test_collection_{}}}]", i + 1),
                )?;
            }
        }
        Ok(migrations)
    }

    /// Migrations on disk, in file name order
    pub fn read_migrations(&self) -> Result<Vec<CreatedMigration>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(self.migrations_dir())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();

        let mut migrations = Vec::new();
        for path in paths {
            let node = docshift_core::history::parse_migration_file(&path)?;
            migrations.push(CreatedMigration {
                path,
                version: node.version,
                title: node.title,
            });
        }
        Ok(migrations)
    }

    pub fn load_history(&self) -> Result<MigrationHistory> {
        Ok(MigrationHistory::load(self.migrations_dir())?)
    }
}

/// Replace the operation lists of a migration file, keeping its header
pub fn write_operations(path: &Path, upgrade: &str, downgrade: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let mut header = String::new();
    for line in content.lines() {
        header.push_str(line);
        header.push('\n');
        if line.starts_with("last_version:") {
            break;
        }
    }
    header.push_str(&format!("upgrade: {}\ndowngrade: {}\n", upgrade, downgrade));
    std::fs::write(path, header)?;
    Ok(())
}
