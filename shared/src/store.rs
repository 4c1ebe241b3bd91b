//! Document store collaborator.
//!
//! Workers persist plain JSON objects and select them with field-equality
//! filters. `update` and `delete` act on the first match only.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::pg_store::PgDocumentStore;

pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Conjunction of `field == value` clauses. The empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn insert(&self, document: Document) -> Result<(), StoreError>;

    /// Replace the first matching document. Returns how many were replaced.
    async fn update(&self, filter: &Filter, document: Document) -> Result<u64, StoreError>;

    /// Delete the first matching document. Returns how many were deleted.
    async fn delete(&self, filter: &Filter) -> Result<u64, StoreError>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::NotAnObject),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Process-local store, in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|document| filter.matches(document))
            .cloned()
            .collect())
    }

    async fn insert(&self, document: Document) -> Result<(), StoreError> {
        self.documents.write().push(document);
        Ok(())
    }

    async fn update(&self, filter: &Filter, document: Document) -> Result<u64, StoreError> {
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|existing| filter.matches(existing)) {
            Some(existing) => {
                *existing = document;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut documents = self.documents.write();
        match documents.iter().position(|existing| filter.matches(existing)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// Postgres when a database URL is configured, otherwise in memory.
pub async fn open_store(
    database_url: Option<&str>,
    collection: &str,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match database_url {
        Some(url) => {
            let store = PgDocumentStore::connect(url, collection).await?;
            store.ensure_schema().await?;
            tracing::info!(collection, "using postgres document store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(collection, "DATABASE_URL not set, documents are kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
