//! Configuration loading and environment variable handling

use crate::domains::DocshiftConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;

/// File read when no explicit configuration path is given
pub const DEFAULT_CONFIG_FILE: &str = "docshift.yaml";

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "DOCSHIFT".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<DocshiftConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: DocshiftConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<DocshiftConfig> {
        let mut config = DocshiftConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load the given file, or `docshift.yaml` in the working directory
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<DocshiftConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_file(DEFAULT_CONFIG_FILE),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut DocshiftConfig) -> ConfigResult<()> {
        self.apply_database_overrides(&mut config.database)?;
        self.apply_migrations_overrides(&mut config.migrations);
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply database config overrides
    fn apply_database_overrides(
        &self,
        config: &mut crate::domains::database::DatabaseConfig,
    ) -> ConfigResult<()> {
        if let Ok(host) = self.get_env_var("DB_HOST") {
            config.host = host;
        }

        if let Ok(port) = self.get_env_var("DB_PORT") {
            config.port = port
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid DB_PORT: {}", e)))?;
        }

        if let Ok(name) = self.get_env_var("DB_NAME") {
            config.name = name;
        }

        if let Ok(user) = self.get_env_var("DB_USER") {
            config.user = Some(user);
        }

        if let Ok(password) = self.get_env_var("DB_PASSWORD") {
            config.password = Some(password);
        }

        if let Ok(uri) = self.get_env_var("DB_URI") {
            config.uri = Some(uri);
        }

        if let Ok(timeout) = self.get_env_var("DB_CONNECT_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid DB_CONNECT_TIMEOUT: {}", e)))?;
            config.connect_timeout = std::time::Duration::from_secs(seconds);
        }

        Ok(())
    }

    /// Apply migrations config overrides
    fn apply_migrations_overrides(&self, config: &mut crate::domains::migrations::MigrationsConfig) {
        if let Ok(directory) = self.get_env_var("MIGRATIONS_DIR") {
            config.directory = directory;
        }

        if let Ok(collection) = self.get_env_var("VERSION_COLLECTION") {
            config.collection = collection;
        }
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            let level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
            config.level = Some(level);
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
