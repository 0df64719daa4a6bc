//! Domain-specific configuration modules

pub mod database;
pub mod logging;
pub mod migrations;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main docshift configuration combining all domains
///
/// The `database` and `migrations` sections are mandatory when the configuration
/// comes from a file; `logging` falls back to its defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocshiftConfig {
    /// Connection to the document database being migrated
    pub database: database::DatabaseConfig,

    /// Where migration files live and where the version marker is stored
    pub migrations: migrations::MigrationsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl DocshiftConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.migrations.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let mut config = DocshiftConfig::default();
        config.database.name = "app".to_string();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
