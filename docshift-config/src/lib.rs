//! Domain-driven configuration management for docshift
//!
//! Configuration is split by functional domain (database connection, migration
//! layout, logging), loaded from a YAML file and overridable through
//! `DOCSHIFT_*` environment variables. Every domain validates itself.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILE};

// Re-export domain configurations
pub use domains::{
    database::DatabaseConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    migrations::MigrationsConfig,
    DocshiftConfig,
};
