//! The mapping core: documents in, entity graphs out.
//!
//! - `save.rs` - cascading insert/update of relation graphs
//! - `load.rs` - hydration through the identity cache
//! - `delete.rs` - cascading delete with failure reporting
//! - `query.rs` - exact-match queries over declared fields

mod config;
mod delete;
mod load;
mod query;
mod save;

pub use config::{CascadeFailurePolicy, MapperConfig};
pub use delete::{CascadeFailure, DeleteReport};
pub use query::Query;

use crate::core::{
    Document, ID_FIELD, MapperError, RELATION_SECTION, Result, StoreError, document_id,
};
use crate::entity::{Entity, IdentityCache};
use crate::schema::{EntityKind, SchemaDescriptor, SchemaRegistry};
use crate::storage::{Collection, DocumentStore};
use query::Condition;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Entry point of the mapping layer.
///
/// Owns the schema registry and the identity cache for every entity type it
/// sees. Separate mappers share nothing but the store they are given.
pub struct Mapper {
    store: Arc<dyn DocumentStore>,
    schemas: SchemaRegistry,
    cache: IdentityCache,
    config: MapperConfig,
}

impl Mapper {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, MapperConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: MapperConfig) -> Self {
        Self {
            store,
            schemas: SchemaRegistry::new(),
            cache: IdentityCache::new(),
            config,
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Declare `T` (and every type its relations reach) if not done yet.
    pub fn register<T: EntityKind>(&self) -> Result<()> {
        self.schemas.ensure_declared(T::NAME, T::declare)?;
        Ok(())
    }

    /// New unsaved instance of `T`.
    pub fn create<T: EntityKind>(&self) -> Result<Entity> {
        self.register::<T>()?;
        Ok(Entity::new(T::NAME, self.schemas.describe(T::NAME)))
    }

    /// Collection backing an entity type.
    pub fn collection(&self, kind: &'static str) -> Collection {
        Collection::new(self.store.clone(), kind)
    }

    /// Build the stored document for `entity`.
    ///
    /// Single relations are written to the relation section as the target's
    /// identifier, or `null` when unset or not saved yet. One-to-many
    /// relations are never written.
    pub fn to_document(&self, entity: &Entity) -> Result<Document> {
        let schema = self.schemas.describe(entity.kind());
        let values = entity.values();
        let mut document = Document::new();

        if let Some(id) = self.identifier_of(entity, &schema, &values)? {
            document.insert(ID_FIELD.to_string(), JsonValue::String(id));
        }

        for column in schema.columns() {
            if let Some(value) = values.get(column) {
                document.insert(column.to_string(), value.clone());
            }
        }

        let mut relations = Map::new();
        for (field, rel) in schema.single_relations() {
            let target_id = match entity.related(field) {
                Some(target) => {
                    check_target(entity, field, rel.target, &target)?;
                    target.id().map_or(JsonValue::Null, JsonValue::String)
                }
                None => JsonValue::Null,
            };
            relations.insert(field.to_string(), target_id);
        }
        document.insert(RELATION_SECTION.to_string(), JsonValue::Object(relations));

        Ok(document)
    }

    /// Primary-key value when declared and set, else the persisted identifier.
    fn identifier_of(
        &self,
        entity: &Entity,
        schema: &SchemaDescriptor,
        values: &Document,
    ) -> Result<Option<String>> {
        let Some(pk) = schema.primary_key() else {
            return Ok(entity.id());
        };
        match values.get(pk) {
            Some(JsonValue::String(id)) => Ok(Some(id.clone())),
            None | Some(JsonValue::Null) => Ok(entity.id()),
            Some(_) => Err(MapperError::InvalidPrimaryKey {
                entity: entity.kind().to_string(),
                field: pk.to_string(),
            }),
        }
    }

    /// Plain columns of a stored document, with the primary key mirrored from `_id`.
    fn column_values(&self, schema: &SchemaDescriptor, id: &str, document: &Document) -> Document {
        let mut values = Document::new();
        if let Some(pk) = schema.primary_key() {
            values.insert(pk.to_string(), JsonValue::String(id.to_string()));
        }
        for column in schema.columns() {
            if let Some(value) = document.get(column) {
                values.insert(column.to_string(), value.clone());
            }
        }
        values
    }

    /// Store predicate for a query, or `None` when nothing can match.
    fn translate(&self, kind: &'static str, query: &Query) -> Result<Option<Document>> {
        let schema = self.schemas.describe(kind);
        let mut predicate = Document::new();

        for (field, condition) in &query.conditions {
            let path = if schema.is_primary_key(field) {
                ID_FIELD.to_string()
            } else if schema.has_column(field) {
                field.clone()
            } else if schema.relation(field).is_some_and(|rel| rel.kind.is_single()) {
                format!("{}.{}", RELATION_SECTION, field)
            } else {
                return Err(MapperError::UnknownField {
                    entity: kind.to_string(),
                    field: field.clone(),
                });
            };

            let value = match condition {
                Condition::Equals(value) => value.clone(),
                Condition::Related(Some(id)) => JsonValue::String(id.clone()),
                Condition::Related(None) => return Ok(None),
                Condition::Unrelated => JsonValue::Null,
            };
            predicate.insert(path, value);
        }

        Ok(Some(predicate))
    }
}

fn check_target(owner: &Entity, field: &str, expected: &str, target: &Entity) -> Result<()> {
    if target.kind() == expected {
        Ok(())
    } else {
        Err(MapperError::RelationTypeMismatch {
            entity: owner.kind().to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
            actual: target.kind().to_string(),
        })
    }
}

fn stored_id(kind: &str, document: &Document) -> Result<String> {
    document_id(document).map(str::to_string).ok_or_else(|| {
        StoreError::InvalidDocument(format!("'{}' document has no '{}'", kind, ID_FIELD)).into()
    })
}
