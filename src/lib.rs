// ============================================================================
// docrel - document-relational mapping over an embedded document store
// ============================================================================

pub mod core;
pub mod entity;
pub mod mapper;
pub mod prelude;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{Document, MapperError, Result, SchemaError, StoreError, StoreResult};
pub use entity::{Entity, IdentityCache};
pub use mapper::{CascadeFailure, CascadeFailurePolicy, DeleteReport, Mapper, MapperConfig, Query};
pub use schema::{
    EntityKind, FieldClass, RelationDescriptor, RelationKind, SchemaBuilder, SchemaDescriptor,
    SchemaRegistry,
};
pub use storage::{Collection, DocumentStore, IdGenerator, MemoryStore, MemoryStoreConfig};
