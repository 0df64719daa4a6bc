//! In-process document database
//!
//! Supports what migrations and the version store need: equality filters on
//! (dotted) fields, `$set`/`$unset`/`$inc` and replacement updates, index
//! bookkeeping with unique constraints, and the `ping` command. Clones share
//! the same data.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use docshift_interfaces::{DatabaseError, DocumentDatabase, IndexSpec, UpdateResult};

const ID_INDEX: &str = "_id_";

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: BTreeMap<String, IndexSpec>,
}

impl CollectionData {
    fn new() -> Self {
        let mut indexes = BTreeMap::new();
        indexes.insert(
            ID_INDEX.to_string(),
            IndexSpec::new(doc! { "_id": 1 }).with_name(ID_INDEX).with_unique(true),
        );
        Self {
            documents: Vec::new(),
            indexes,
        }
    }

    /// Fail if `candidate` collides with a stored document on a unique index
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), DatabaseError> {
        for (name, index) in self.indexes.iter().filter(|(_, index)| index.unique) {
            let key = index_key(index, candidate);
            let duplicate = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .any(|(_, existing)| index_key(index, existing) == key);
            if duplicate {
                return Err(DatabaseError::Backend {
                    message: format!("E11000 duplicate key error on index {}", name),
                });
            }
        }
        Ok(())
    }
}

fn index_key(index: &IndexSpec, document: &Document) -> Vec<Bson> {
    index
        .keys
        .keys()
        .map(|field| lookup(document, field).cloned().unwrap_or(Bson::Null))
        .collect()
}

/// Resolve a possibly dotted field path
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn matches(document: &Document, filter: &Document) -> Result<bool, DatabaseError> {
    for (path, expected) in filter {
        if path.starts_with('$') {
            return Err(unsupported(format!("query operator {}", path)));
        }
        if let Bson::Document(inner) = expected {
            if let Some(operator) = inner.keys().find(|key| key.starts_with('$')) {
                return Err(unsupported(format!("query operator {}", operator)));
            }
        }

        let found = match (lookup(document, path), expected) {
            (None, Bson::Null) => true,
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        };
        if !found {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Apply an update document, returning whether anything changed
fn apply_update(document: &mut Document, update: &Document) -> Result<bool, DatabaseError> {
    let is_operator_update = update.keys().next().map(|key| key.starts_with('$')).unwrap_or(false);

    if !is_operator_update {
        let id = document.get("_id").cloned();
        let mut replacement = update.clone();
        if let Some(id) = id {
            replacement.insert("_id", id);
        }
        let changed = *document != replacement;
        *document = replacement;
        return Ok(changed);
    }

    let before = document.clone();
    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| unsupported(format!("{} expects a document", operator)))?;

        for (field, value) in fields {
            if field.contains('.') {
                return Err(unsupported(format!("dotted path {} in {}", field, operator)));
            }
            match operator.as_str() {
                "$set" => {
                    document.insert(field.clone(), value.clone());
                }
                "$unset" => {
                    document.remove(field);
                }
                "$inc" => {
                    let current = document.get(field).cloned().unwrap_or(Bson::Int32(0));
                    document.insert(field.clone(), increment(&current, value)?);
                }
                other => return Err(unsupported(format!("update operator {}", other))),
            }
        }
    }
    Ok(*document != before)
}

fn increment(current: &Bson, by: &Bson) -> Result<Bson, DatabaseError> {
    Ok(match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(checked_add_i64(*a as i64, *b)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(checked_add_i64(*a, *b as i64)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(checked_add_i64(*a, *b)?),
        (Bson::Double(a), other) => Bson::Double(a + as_f64(other)?),
        (other, Bson::Double(b)) => Bson::Double(as_f64(other)? + b),
        _ => {
            return Err(DatabaseError::Backend {
                message: "Cannot apply $inc to a non-numeric value".to_string(),
            })
        }
    })
}

fn checked_add_i64(a: i64, b: i64) -> Result<i64, DatabaseError> {
    a.checked_add(b).ok_or_else(|| DatabaseError::Backend {
        message: format!("$inc overflows a 64-bit integer ({} + {})", a, b),
    })
}

fn as_f64(value: &Bson) -> Result<f64, DatabaseError> {
    match value {
        Bson::Int32(v) => Ok(*v as f64),
        Bson::Int64(v) => Ok(*v as f64),
        Bson::Double(v) => Ok(*v),
        _ => Err(DatabaseError::Backend {
            message: "Cannot apply $inc to a non-numeric value".to_string(),
        }),
    }
}

fn unsupported(operation: impl Into<String>) -> DatabaseError {
    DatabaseError::Unsupported {
        operation: operation.into(),
    }
}

/// Document database kept in memory
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: String,
    collections: Arc<Mutex<BTreeMap<String, CollectionData>>>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Names of the indexes on a collection, sorted
    pub fn index_names(&self, collection: &str) -> Vec<String> {
        self.lock()
            .map(|collections| {
                collections
                    .get(collection)
                    .map(|data| data.indexes.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, CollectionData>>, DatabaseError> {
        self.collections.lock().map_err(|_| DatabaseError::Backend {
            message: "in-memory database lock poisoned".to_string(),
        })
    }

    fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        multi: bool,
    ) -> Result<UpdateResult, DatabaseError> {
        let mut collections = self.lock()?;
        let Some(data) = collections.get_mut(collection) else {
            return Ok(UpdateResult::default());
        };

        let mut result = UpdateResult::default();
        for position in 0..data.documents.len() {
            if !matches(&data.documents[position], &filter)? {
                continue;
            }
            result.matched_count += 1;

            let mut updated = data.documents[position].clone();
            if apply_update(&mut updated, &update)? {
                data.check_unique(&updated, Some(position))?;
                data.documents[position] = updated;
                result.modified_count += 1;
            }
            if !multi {
                break;
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.lock().map(|_| ())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError> {
        let mut collections = self.lock()?;
        if collections.contains_key(name) {
            return Err(DatabaseError::CollectionExists { name: name.to_string() });
        }
        collections.insert(name.to_string(), CollectionData::new());
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), DatabaseError> {
        self.lock()?.remove(name);
        Ok(())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<(), DatabaseError> {
        let mut collections = self.lock()?;
        if collections.contains_key(to) {
            return Err(DatabaseError::CollectionExists { name: to.to_string() });
        }
        let data = collections
            .remove(from)
            .ok_or_else(|| DatabaseError::CollectionNotFound { name: from.to_string() })?;
        collections.insert(to.to_string(), data);
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<String, DatabaseError> {
        let mut collections = self.lock()?;
        let data = collections
            .entry(collection.to_string())
            .or_insert_with(CollectionData::new);

        let name = index.resolved_name();
        if let Some(existing) = data.indexes.get(&name) {
            if existing.keys == index.keys && existing.unique == index.unique {
                return Ok(name);
            }
            return Err(DatabaseError::Backend {
                message: format!("An index named {} already exists with different options", name),
            });
        }

        if index.unique {
            let mut seen = Vec::with_capacity(data.documents.len());
            for document in &data.documents {
                let key = index_key(&index, document);
                if seen.contains(&key) {
                    return Err(DatabaseError::Backend {
                        message: format!("E11000 duplicate key error building index {}", name),
                    });
                }
                seen.push(key);
            }
        }

        data.indexes.insert(name.clone(), index.with_name(name.clone()));
        Ok(name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), DatabaseError> {
        let mut collections = self.lock()?;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| DatabaseError::CollectionNotFound {
                name: collection.to_string(),
            })?;

        if name == ID_INDEX {
            return Err(DatabaseError::Backend {
                message: "cannot drop _id index".to_string(),
            });
        }
        data.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::IndexNotFound {
                collection: collection.to_string(),
                index: name.to_string(),
            })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), DatabaseError> {
        self.insert_many(collection, vec![document]).await.map(|_| ())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64, DatabaseError> {
        let mut collections = self.lock()?;
        let data = collections
            .entry(collection.to_string())
            .or_insert_with(CollectionData::new);

        let mut inserted = 0;
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            data.check_unique(&document, None)?;
            data.documents.push(document);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DatabaseError> {
        let collections = self.lock()?;
        let Some(data) = collections.get(collection) else {
            return Ok(None);
        };
        for document in &data.documents {
            if matches(document, &filter)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let collections = self.lock()?;
        let Some(data) = collections.get(collection) else {
            return Ok(0);
        };
        let mut count = 0;
        for document in &data.documents {
            if matches(document, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError> {
        self.update(collection, filter, update, false)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DatabaseError> {
        self.update(collection, filter, update, true)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, DatabaseError> {
        let mut collections = self.lock()?;
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut kept = Vec::with_capacity(data.documents.len());
        let mut deleted = 0;
        for document in data.documents.drain(..) {
            if matches(&document, &filter)? {
                deleted += 1;
            } else {
                kept.push(document);
            }
        }
        data.documents = kept;
        Ok(deleted)
    }

    async fn run_command(&self, command: Document) -> Result<Document, DatabaseError> {
        match command.keys().next().map(String::as_str) {
            Some("ping") => Ok(doc! { "ok": 1.0 }),
            Some(other) => Err(unsupported(format!("command {}", other))),
            None => Err(unsupported("empty command")),
        }
    }
}
