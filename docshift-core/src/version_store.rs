//! Persisted current-version marker
//!
//! The marker is a single document `{ current_version: <string | null> }` in a
//! dedicated collection. `null` means nothing has been applied yet.

use bson::{doc, Bson};

use docshift_interfaces::DocumentDatabase;

use crate::error::VersionStoreError;

pub const CURRENT_VERSION_FIELD: &str = "current_version";

/// Reads and writes the current version in one collection
#[derive(Debug, Clone)]
pub struct VersionStore {
    collection: String,
}

impl VersionStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection holding `{ current_version: null }`
    ///
    /// An existing collection is left untouched, whatever it contains.
    pub async fn initialize(&self, db: &dyn DocumentDatabase) -> Result<bool, VersionStoreError> {
        if db.has_collection(&self.collection).await? {
            tracing::debug!("Version collection {} already exists", self.collection);
            return Ok(false);
        }

        db.create_collection(&self.collection).await?;
        db.insert_one(&self.collection, doc! { CURRENT_VERSION_FIELD: Bson::Null })
            .await?;
        tracing::info!("Created version collection {}", self.collection);
        Ok(true)
    }

    /// Whether the collection exists and holds the version document
    pub async fn is_initialized(&self, db: &dyn DocumentDatabase) -> Result<bool, VersionStoreError> {
        if !db.has_collection(&self.collection).await? {
            return Ok(false);
        }
        Ok(db.find_one(&self.collection, doc! {}).await?.is_some())
    }

    pub async fn get_current_version(
        &self,
        db: &dyn DocumentDatabase,
    ) -> Result<Option<String>, VersionStoreError> {
        let document = db
            .find_one(&self.collection, doc! {})
            .await?
            .ok_or_else(|| self.not_initialized())?;

        match document.get(CURRENT_VERSION_FIELD) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::String(version)) => Ok(Some(version.clone())),
            Some(other) => Err(VersionStoreError::Malformed {
                collection: self.collection.clone(),
                message: format!("{} must be a string or null, found {}", CURRENT_VERSION_FIELD, other),
            }),
        }
    }

    /// Overwrite the current version; `None` records that nothing is applied
    pub async fn set_current_version(
        &self,
        db: &dyn DocumentDatabase,
        version: Option<&str>,
    ) -> Result<(), VersionStoreError> {
        let value = match version {
            Some(version) => Bson::String(version.to_string()),
            None => Bson::Null,
        };

        let result = db
            .update_one(
                &self.collection,
                doc! {},
                doc! { "$set": { CURRENT_VERSION_FIELD: value } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(self.not_initialized());
        }

        tracing::debug!("Current version set to {}", version.unwrap_or("None"));
        Ok(())
    }

    fn not_initialized(&self) -> VersionStoreError {
        VersionStoreError::NotInitialized {
            collection: self.collection.clone(),
        }
    }
}
