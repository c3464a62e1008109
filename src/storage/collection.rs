use super::DocumentStore;
use crate::core::{Document, StoreResult};
use log::debug;
use std::sync::Arc;

/// Per-type binding of a document store to the collection named after the type.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
}

impl Collection {
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self { store, name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn insert(&self, document: Document) -> StoreResult<Document> {
        debug!("insert into '{}'", self.name);
        self.store.insert(self.name, document).await
    }

    pub async fn update(&self, id: &str, document: Document) -> StoreResult<()> {
        debug!("update '{}' in '{}'", id, self.name);
        self.store.update(self.name, id, document).await
    }

    pub async fn remove(&self, id: &str) -> StoreResult<usize> {
        debug!("remove '{}' from '{}'", id, self.name);
        self.store.remove(self.name, id).await
    }

    pub async fn find(&self, predicate: &Document) -> StoreResult<Vec<Document>> {
        debug!("find in '{}' where {:?}", self.name, predicate);
        self.store.find(self.name, predicate).await
    }

    pub async fn count(&self, predicate: &Document) -> StoreResult<usize> {
        self.store.count(self.name, predicate).await
    }
}
