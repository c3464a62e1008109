pub mod document;
pub mod error;

pub use document::{
    Document, ID_FIELD, RELATION_SECTION, RESERVED_PREFIX, document_id, is_reserved, lookup_path,
    matches,
};
pub use error::{MapperError, Result, SchemaError, StoreError, StoreResult};
