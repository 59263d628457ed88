//! In-memory DocumentStore.
//!
//! Backs local development (no `database.url` configured) and the test
//! suites. Writes hold the collection lock for their whole read-modify-write,
//! so insert-if-absent and increment are atomic within the process.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DocumentStore, Filter, OrderBy, SaveResult, StoredDocument};

type Collection = BTreeMap<String, Value>;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Every document of a collection, in id order.
    pub async fn all(&self, collection: &str) -> Vec<StoredDocument> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, body)| StoredDocument {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn not_found(collection: &str, id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::NotFound,
        format!("Document {}/{} not found", collection, id),
    )
}

fn as_object(body: Value) -> Result<Map<String, Value>, DomainError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::validation(
            "body",
            format!("Documents must be JSON objects, got {}", other),
        )),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, DomainError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|body| StoredDocument {
                id: id.to_string(),
                body: body.clone(),
            }))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<StoredDocument>, DomainError> {
        Ok(self
            .find_many(collection, filter, None, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, DomainError> {
        let guard = self.collections.read().await;
        let mut docs: Vec<StoredDocument> = guard
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, body)| filter.matches(body))
                    .map(|(id, body)| StoredDocument {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order_by {
            docs.sort_by(|a, b| order.compare(&a.body, &b.body));
        }
        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn insert(&self, collection: &str, body: Value) -> Result<String, DomainError> {
        let body = as_object(body)?;
        let id = Uuid::new_v4().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Value::Object(body));
        Ok(id)
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<SaveResult, DomainError> {
        let body = as_object(body)?;
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(SaveResult::AlreadyExists);
        }
        docs.insert(id.to_string(), Value::Object(body));
        Ok(SaveResult::Inserted)
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), DomainError> {
        let partial = as_object(partial)?;
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        if let Value::Object(existing) = doc {
            existing.extend(partial);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DomainError> {
        Ok(self
            .collections
            .write()
            .await
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, DomainError> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        let Value::Object(map) = doc else {
            return Err(not_found(collection, id));
        };
        let current = map.get(field).and_then(Value::as_i64).unwrap_or(0);
        let next = current + delta;
        map.insert(field.to_string(), Value::from(next));
        Ok(next)
    }
}
