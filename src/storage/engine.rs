use crate::core::{Document, StoreResult};
use async_trait::async_trait;

/// Document store trait - the only backend the mapper talks to.
///
/// Collections are addressed by name and documents by their `_id` field.
/// Implementations only need exact-match lookups; dotted predicate paths
/// address fields nested inside the relation section.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, generating an `_id` when the document carries none.
    ///
    /// Returns the document as stored.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Replace the document stored under `id`. Fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, document: Document) -> StoreResult<()>;

    /// Remove the document stored under `id`, returning how many were removed.
    async fn remove(&self, collection: &str, id: &str) -> StoreResult<usize>;

    /// Return every document whose fields equal the predicate's fields.
    async fn find(&self, collection: &str, predicate: &Document) -> StoreResult<Vec<Document>>;

    /// Count documents matching the predicate.
    async fn count(&self, collection: &str, predicate: &Document) -> StoreResult<usize> {
        Ok(self.find(collection, predicate).await?.len())
    }
}
