//! Database connection configuration

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the document database
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server host name
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database the migrations run against
    pub name: String,

    /// Optional user name for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Optional password for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Full connection string; takes precedence over host, port, user and password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// How long to wait for the server before giving up
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    /// Connection string handed to the driver
    pub fn connection_uri(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.clone();
        }

        match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!(
                "mongodb://{}:{}@{}:{}",
                urlencoding::encode(user),
                urlencoding::encode(password),
                self.host,
                self.port
            ),
            (Some(user), None) => format!("mongodb://{}@{}:{}", urlencoding::encode(user), self.host, self.port),
            _ => format!("mongodb://{}:{}", self.host, self.port),
        }
    }

    /// Connection target safe to print: never includes credentials
    pub fn display_target(&self) -> String {
        match &self.uri {
            Some(_) => format!("<uri>/{}", self.name),
            None => format!("{}:{}/{}", self.host, self.port, self.name),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("uri", &self.uri.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: String::new(),
            user: None,
            password: None,
            uri: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Validatable for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        validate_positive(self.connect_timeout.as_secs(), "connect_timeout", self.domain_name())?;

        match &self.uri {
            Some(uri) => {
                if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
                    return Err(self.validation_error("uri must start with mongodb:// or mongodb+srv://"));
                }
            }
            None => {
                validate_required_string(&self.host, "host", self.domain_name())?;
                validate_port_range(self.port, "port", self.domain_name())?;
            }
        }

        if self.password.is_some() && self.user.is_none() {
            return Err(self.validation_error("password requires user to be set"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "database"
    }
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    27017
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
