//! Opening database handles from configuration

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docshift_config::DatabaseConfig;
use docshift_interfaces::{DatabaseError, DocumentDatabase};

use crate::memory::MemoryDatabase;

/// Opens a database handle for a command
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and verify the server answers
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentDatabase>, DatabaseError>;
}

/// Connects to MongoDB through the official driver
#[cfg(feature = "mongodb")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

#[cfg(feature = "mongodb")]
#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentDatabase>, DatabaseError> {
        let database = crate::mongo::MongoDatabase::connect(config).await?;
        Ok(Arc::new(database))
    }
}

/// Hands out one shared [`MemoryDatabase`]
///
/// Every connection sees the same data. The connector can be switched to
/// unreachable, in which case `connect` fails the way an unreachable server does.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    database: MemoryDatabase,
    reachable: Arc<AtomicBool>,
}

impl MemoryConnector {
    pub fn new(database: MemoryDatabase) -> Self {
        Self {
            database,
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connector whose every `connect` fails
    pub fn unreachable() -> Self {
        let connector = Self::new(MemoryDatabase::new("unreachable"));
        connector.set_reachable(false);
        connector
    }

    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentDatabase>, DatabaseError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Connection {
                message: format!("{} is unreachable", config.display_target()),
            });
        }
        Ok(Arc::new(self.database.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            name: "test_db".to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_memory_connector_shares_state() {
        let connector = MemoryConnector::new(MemoryDatabase::new("test_db"));
        let first = connector.connect(&config()).await.unwrap();
        first.insert_one("items", doc! { "n": 1 }).await.unwrap();

        let second = connector.connect(&config()).await.unwrap();
        assert_eq!(second.count_documents("items", doc! {}).await.unwrap(), 1);
        assert_eq!(second.name(), "test_db");
    }

    #[tokio::test]
    async fn test_unreachable_connector() {
        let connector = MemoryConnector::unreachable();
        let err = connector.connect(&config()).await.err().unwrap();
        assert!(err.is_connection());
        assert!(err.to_string().starts_with("Could not connect to database"));

        connector.set_reachable(true);
        assert!(connector.connect(&config()).await.is_ok());
    }
}
