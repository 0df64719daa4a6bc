//! Directional migration actions
//!
//! A [`MigrationAction`] is what a migration runs against the database in one
//! direction. Migration files describe their actions as a list of
//! [`Operation`]s; code can attach any other implementation to a node.

use async_trait::async_trait;
use bson::{Bson, Document};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use docshift_interfaces::{DatabaseError, DocumentDatabase, IndexSpec};

/// Failure of a single action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Invalid document in {operation}: {message}")]
    InvalidDocument { operation: String, message: String },

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// Failure raised by a hand-written action
    pub fn custom(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

/// One direction of a migration
#[async_trait]
pub trait MigrationAction: Send + Sync {
    async fn apply(&self, db: &dyn DocumentDatabase) -> Result<(), ActionError>;
}

/// A single declarative database operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateCollection {
        name: String,
    },
    DropCollection {
        name: String,
    },
    RenameCollection {
        from: String,
        to: String,
    },
    CreateIndex {
        collection: String,
        keys: Map<String, Value>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        unique: bool,
    },
    DropIndex {
        collection: String,
        name: String,
    },
    InsertMany {
        collection: String,
        documents: Vec<Map<String, Value>>,
    },
    UpdateMany {
        collection: String,
        filter: Map<String, Value>,
        update: Map<String, Value>,
    },
    DeleteMany {
        collection: String,
        #[serde(default)]
        filter: Map<String, Value>,
    },
    RunCommand {
        command: Map<String, Value>,
    },
}

impl Operation {
    /// Tag of the operation as written in migration files
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateCollection { .. } => "create_collection",
            Operation::DropCollection { .. } => "drop_collection",
            Operation::RenameCollection { .. } => "rename_collection",
            Operation::CreateIndex { .. } => "create_index",
            Operation::DropIndex { .. } => "drop_index",
            Operation::InsertMany { .. } => "insert_many",
            Operation::UpdateMany { .. } => "update_many",
            Operation::DeleteMany { .. } => "delete_many",
            Operation::RunCommand { .. } => "run_command",
        }
    }

    pub async fn apply(&self, db: &dyn DocumentDatabase) -> Result<(), ActionError> {
        match self {
            Operation::CreateCollection { name } => db.create_collection(name).await?,
            Operation::DropCollection { name } => db.drop_collection(name).await?,
            Operation::RenameCollection { from, to } => db.rename_collection(from, to).await?,
            Operation::CreateIndex {
                collection,
                keys,
                name,
                unique,
            } => {
                let keys = self.to_document(keys)?;
                if keys.is_empty() {
                    return Err(self.invalid("index keys cannot be empty"));
                }
                let mut index = IndexSpec::new(keys).with_unique(*unique);
                if let Some(name) = name {
                    index = index.with_name(name.clone());
                }
                let created = db.create_index(collection, index).await?;
                tracing::debug!("Created index {} on {}", created, collection);
            }
            Operation::DropIndex { collection, name } => db.drop_index(collection, name).await?,
            Operation::InsertMany {
                collection,
                documents,
            } => {
                let documents = documents
                    .iter()
                    .map(|document| self.to_document(document))
                    .collect::<Result<Vec<_>, _>>()?;
                if !documents.is_empty() {
                    let inserted = db.insert_many(collection, documents).await?;
                    tracing::debug!("Inserted {} document(s) into {}", inserted, collection);
                }
            }
            Operation::UpdateMany {
                collection,
                filter,
                update,
            } => {
                let result = db
                    .update_many(collection, self.to_document(filter)?, self.to_document(update)?)
                    .await?;
                tracing::debug!(
                    "Updated {} of {} matched document(s) in {}",
                    result.modified_count,
                    result.matched_count,
                    collection
                );
            }
            Operation::DeleteMany { collection, filter } => {
                let deleted = db.delete_many(collection, self.to_document(filter)?).await?;
                tracing::debug!("Deleted {} document(s) from {}", deleted, collection);
            }
            Operation::RunCommand { command } => {
                db.run_command(self.to_document(command)?).await?;
            }
        }
        Ok(())
    }

    fn to_document(&self, map: &Map<String, Value>) -> Result<Document, ActionError> {
        let mut document = Document::new();
        for (key, value) in map {
            let value = json_to_bson(value).map_err(|message| self.invalid(message))?;
            document.insert(key.clone(), value);
        }
        Ok(document)
    }

    fn invalid(&self, message: impl Into<String>) -> ActionError {
        ActionError::InvalidDocument {
            operation: self.kind().to_string(),
            message: message.into(),
        }
    }
}

/// Convert a JSON value read from a migration file into BSON
///
/// Integers that fit in 32 bits become `Int32`, matching what the mongo shell writes.
fn json_to_bson(value: &Value) -> Result<Bson, String> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                match i32::try_from(int) {
                    Ok(small) => Bson::Int32(small),
                    Err(_) => Bson::Int64(int),
                }
            } else if let Some(float) = number.as_f64() {
                Bson::Double(float)
            } else {
                return Err(format!("number {} is out of range", number));
            }
        }
        Value::String(text) => Bson::String(text.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect::<Result<_, _>>()?),
        Value::Object(map) => {
            let mut document = Document::new();
            for (key, value) in map {
                document.insert(key.clone(), json_to_bson(value)?);
            }
            Bson::Document(document)
        }
    })
}

/// Ordered list of operations; runs each in turn and stops at the first failure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Operations(pub Vec<Operation>);

impl Operations {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self(operations)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.0.iter()
    }
}

#[async_trait]
impl MigrationAction for Operations {
    async fn apply(&self, db: &dyn DocumentDatabase) -> Result<(), ActionError> {
        for operation in &self.0 {
            tracing::debug!("Running {} operation", operation.kind());
            operation.apply(db).await?;
        }
        Ok(())
    }
}
