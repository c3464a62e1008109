use super::DocumentStore;
use crate::core::{Document, ID_FIELD, StoreError, StoreResult, document_id, matches};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// How the in-memory store assigns identifiers to documents inserted without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdGenerator {
    /// Random UUID v4 in simple (hyphen-less) form.
    #[default]
    Uuid,
    /// Monotonic counter starting at 1, handy for deterministic output.
    Sequential,
}

/// Configuration for [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    pub id_generator: IdGenerator,
}

impl MemoryStoreConfig {
    pub fn id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = generator;
        self
    }
}

/// Embedded key-document store kept entirely in memory.
///
/// One `BTreeMap` per collection, keyed by `_id`, so scans come back in a
/// stable order.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    config: MemoryStoreConfig,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Names of every collection that has received at least one document.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of documents currently stored in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Raw lookup by identifier, bypassing any mapper.
    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections.get(collection)?.get(id).cloned()
    }

    fn generate_id(&self) -> String {
        match self.config.id_generator {
            IdGenerator::Uuid => Uuid::new_v4().simple().to_string(),
            IdGenerator::Sequential => self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        let id = match document.get(ID_FIELD) {
            None | Some(JsonValue::Null) => self.generate_id(),
            Some(JsonValue::String(id)) => id.clone(),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "'{}' must be a string, got {}",
                    ID_FIELD, other
                )));
            }
        };
        document.insert(ID_FIELD.to_string(), JsonValue::String(id.clone()));

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        documents.insert(id, document.clone());
        Ok(document)
    }

    async fn update(&self, collection: &str, id: &str, mut document: Document) -> StoreResult<()> {
        if let Some(doc_id) = document_id(&document) {
            if doc_id != id {
                return Err(StoreError::InvalidDocument(format!(
                    "document id '{}' does not match '{}'",
                    doc_id, id
                )));
            }
        }
        document.insert(ID_FIELD.to_string(), JsonValue::String(id.to_string()));

        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        *slot = document;
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> StoreResult<usize> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some();
        Ok(usize::from(removed))
    }

    async fn find(&self, collection: &str, predicate: &Document) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        // Point lookup when the predicate pins the identifier.
        if let Some(id) = document_id(predicate) {
            return Ok(documents
                .get(id)
                .filter(|doc| matches(doc, predicate))
                .cloned()
                .into_iter()
                .collect());
        }

        Ok(documents
            .values()
            .filter(|doc| matches(doc, predicate))
            .cloned()
            .collect())
    }
}
