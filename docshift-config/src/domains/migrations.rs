//! Migration layout configuration

use crate::error::ConfigResult;
use crate::validation::{validate_collection_name, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where migration files live and where the current version is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding the migration files
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Collection holding the single current-version document
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl MigrationsConfig {
    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            collection: default_collection(),
        }
    }
}

impl Validatable for MigrationsConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.directory, "directory", self.domain_name())?;
        validate_collection_name(&self.collection, "collection", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "migrations"
    }
}

fn default_directory() -> String {
    "migrations".to_string()
}

fn default_collection() -> String {
    "docshift_version".to_string()
}
