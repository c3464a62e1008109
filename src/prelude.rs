//! Everything needed to declare entity types and work with a [`Mapper`].
//!
//! ```ignore
//! use docrel::prelude::*;
//! ```

pub use crate::{
    DeleteReport, Entity, EntityKind, Mapper, MapperConfig, MapperError, MemoryStore, Query,
    RelationDescriptor, SchemaBuilder, SchemaError,
};
