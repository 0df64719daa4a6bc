//! Document database interface
//!
//! This module defines the contract a database handle has to satisfy so that
//! migration actions can create, reshape and drop collections, and so that the
//! version store can persist the current-version marker.

use async_trait::async_trait;
use bson::{Bson, Document};

/// Common database error type
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Could not connect to database: {message}")]
    Connection { message: String },

    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Collection already exists: {name}")]
    CollectionExists { name: String },

    #[error("Index {index} not found on collection {collection}")]
    IndexNotFound { collection: String, index: String },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Database backend error: {message}")]
    Backend { message: String },
}

impl DatabaseError {
    /// Whether the error means the server could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}

/// Outcome of an update against one or more documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Index definition for [`DocumentDatabase::create_index`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSpec {
    /// Indexed fields and their direction, e.g. `{ "email": 1 }`
    pub keys: Document,
    /// Explicit index name; the backend derives one from the keys when absent
    pub name: Option<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(keys: Document) -> Self {
        Self {
            keys,
            name: None,
            unique: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Name used by the server when none is given: `field_dir` pairs joined by `_`
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| match direction {
                Bson::String(kind) => format!("{}_{}", field, kind),
                Bson::Int32(value) => format!("{}_{}", field, value),
                Bson::Int64(value) => format!("{}_{}", field, value),
                Bson::Double(value) => format!("{}_{}", field, *value as i64),
                other => format!("{}_{}", field, other),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn resolved_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.default_name())
    }
}

/// Handle to a single document database
///
/// Every call is a blocking round trip from the caller's point of view: the
/// apply engine awaits each one before issuing the next.
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Name of the database this handle points at
    fn name(&self) -> &str;

    /// Check that the server answers
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn has_collection(&self, name: &str) -> Result<bool, DatabaseError> {
        Ok(self.list_collection_names().await?.iter().any(|c| c == name))
    }

    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError>;

    /// Drop a collection; dropping a missing collection is not an error
    async fn drop_collection(&self, name: &str) -> Result<(), DatabaseError>;

    async fn rename_collection(&self, from: &str, to: &str) -> Result<(), DatabaseError>;

    /// Create an index and return its name
    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<String, DatabaseError>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), DatabaseError>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DatabaseError>;

    /// Insert documents, returning how many were written
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64, DatabaseError>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError>;

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError>;

    /// Delete matching documents, returning how many were removed
    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError>;

    /// Run a raw database command
    async fn run_command(&self, command: Document) -> Result<Document, DatabaseError>;
}
