//! MongoDB backend using the official driver

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use docshift_config::DatabaseConfig;
use docshift_interfaces::{DatabaseError, DocumentDatabase, IndexSpec, UpdateResult};

/// Server error code for a missing namespace
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Handle to one database on a MongoDB deployment
pub struct MongoDatabase {
    client: Client,
    database: Database,
}

impl MongoDatabase {
    /// Connect and ping the deployment
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut options = ClientOptions::parse(config.connection_uri())
            .await
            .map_err(connection_error)?;
        options.app_name = Some("docshift".to_string());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);

        let client = Client::with_options(options).map_err(connection_error)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(connection_error)?;

        tracing::debug!("Connected to {}", config.display_target());
        let database = client.database(&config.name);
        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn connection_error(err: MongoError) -> DatabaseError {
    DatabaseError::Connection {
        message: err.to_string(),
    }
}

fn backend_error(err: MongoError) -> DatabaseError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } => connection_error(err),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => DatabaseError::Serialization {
            message: err.to_string(),
        },
        _ => DatabaseError::Backend {
            message: err.to_string(),
        },
    }
}

fn is_namespace_not_found(err: &MongoError) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND)
}

#[async_trait]
impl DocumentDatabase for MongoDatabase {
    fn name(&self) -> &str {
        self.database.name()
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(connection_error)
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        self.database.list_collection_names(None).await.map_err(backend_error)
    }

    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError> {
        self.database.create_collection(name, None).await.map_err(backend_error)
    }

    async fn drop_collection(&self, name: &str) -> Result<(), DatabaseError> {
        match self.collection(name).drop(None).await {
            Ok(()) => Ok(()),
            Err(err) if is_namespace_not_found(&err) => Ok(()),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<(), DatabaseError> {
        let namespace = |collection: &str| format!("{}.{}", self.database.name(), collection);
        let command = doc! {
            "renameCollection": namespace(from),
            "to": namespace(to),
        };
        match self.client.database("admin").run_command(command, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_namespace_not_found(&err) => Err(DatabaseError::CollectionNotFound {
                name: from.to_string(),
            }),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<String, DatabaseError> {
        let options = IndexOptions::builder()
            .name(index.name.clone())
            .unique(index.unique.then_some(true))
            .build();
        let model = IndexModel::builder().keys(index.keys).options(options).build();

        let result = self
            .collection(collection)
            .create_index(model, None)
            .await
            .map_err(backend_error)?;
        Ok(result.index_name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), DatabaseError> {
        self.collection(collection)
            .drop_index(name, None)
            .await
            .map_err(backend_error)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DatabaseError> {
        self.collection(collection)
            .insert_one(document, None)
            .await
            .map(|_| ())
            .map_err(backend_error)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64, DatabaseError> {
        let result = self
            .collection(collection)
            .insert_many(documents, None)
            .await
            .map_err(backend_error)?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError> {
        self.collection(collection)
            .find_one(filter, None)
            .await
            .map_err(backend_error)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        self.collection(collection)
            .count_documents(filter, None)
            .await
            .map_err(backend_error)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError> {
        let result = self
            .collection(collection)
            .update_one(filter, update, None)
            .await
            .map_err(backend_error)?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError> {
        let result = self
            .collection(collection)
            .update_many(filter, update, None)
            .await
            .map_err(backend_error)?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let result = self
            .collection(collection)
            .delete_many(filter, None)
            .await
            .map_err(backend_error)?;
        Ok(result.deleted_count)
    }

    async fn run_command(&self, command: Document) -> Result<Document, DatabaseError> {
        self.database.run_command(command, None).await.map_err(backend_error)
    }
}
