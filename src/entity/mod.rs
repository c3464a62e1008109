//! Live entity instances and the identity cache that owns persisted ones.

mod cache;

pub use cache::IdentityCache;

use crate::core::{Document, MapperError, Result};
use crate::schema::SchemaDescriptor;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Handle to an entity instance.
///
/// Clones share the same instance. Relation fields hold weak references:
/// an entity never keeps its related entities alive. Persisted instances
/// are owned by the mapper's [`IdentityCache`]; unsaved ones live as long
/// as some caller holds a handle.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityCell>,
}

pub(crate) struct EntityCell {
    kind: &'static str,
    schema: Arc<SchemaDescriptor>,
    state: RwLock<EntityState>,
}

#[derive(Default)]
struct EntityState {
    id: Option<String>,
    values: Document,
    single: HashMap<String, Weak<EntityCell>>,
    many: HashMap<String, Vec<Weak<EntityCell>>>,
}

impl Entity {
    pub(crate) fn new(kind: &'static str, schema: Arc<SchemaDescriptor>) -> Self {
        Self {
            inner: Arc::new(EntityCell {
                kind,
                schema,
                state: RwLock::new(EntityState::default()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entity type name.
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    /// Persisted identifier, unset until the first successful save.
    pub fn id(&self) -> Option<String> {
        self.read().id.clone()
    }

    pub fn is_persisted(&self) -> bool {
        self.read().id.is_some()
    }

    pub(crate) fn set_id(&self, id: Option<String>) {
        self.write().id = id;
    }

    /// Whether both handles point at the same instance.
    pub fn same(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- plain columns ------------------------------------------------

    /// Set a plain column (or the primary key) from any serializable value.
    pub fn set<V: Serialize>(&self, field: &str, value: V) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(field, value)
    }

    /// Set a declared plain column or primary key.
    ///
    /// Anything else, relation fields and reserved names included, is
    /// [`MapperError::UnknownField`].
    pub fn set_value(&self, field: &str, value: JsonValue) -> Result<()> {
        let schema = &self.inner.schema;
        if !schema.has_column(field) && !schema.is_primary_key(field) {
            return Err(MapperError::UnknownField {
                entity: self.kind().to_string(),
                field: field.to_string(),
            });
        }
        self.write().values.insert(field.to_string(), value);
        Ok(())
    }

    /// Typed read of a plain column. `Ok(None)` when the column is unset.
    pub fn get<V: DeserializeOwned>(&self, field: &str) -> Result<Option<V>> {
        match self.value(field) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn value(&self, field: &str) -> Option<JsonValue> {
        self.read().values.get(field).cloned()
    }

    pub fn values(&self) -> Document {
        self.read().values.clone()
    }

    pub(crate) fn replace_values(&self, values: Document) {
        self.write().values = values;
    }

    // ---- single relations ---------------------------------------------

    /// Point a one-to-one or many-to-one relation at `target`.
    pub fn link(&self, field: &str, target: &Entity) {
        self.write()
            .single
            .insert(field.to_string(), Arc::downgrade(&target.inner));
    }

    pub fn unlink(&self, field: &str) {
        self.write().single.remove(field);
    }

    /// Related entity, if the relation is set and the target is still alive.
    pub fn related(&self, field: &str) -> Option<Entity> {
        self.read()
            .single
            .get(field)
            .and_then(Weak::upgrade)
            .map(|inner| Entity { inner })
    }

    // ---- one-to-many relations ----------------------------------------

    pub fn add_related(&self, field: &str, target: &Entity) {
        self.write()
            .many
            .entry(field.to_string())
            .or_default()
            .push(Arc::downgrade(&target.inner));
    }

    pub fn set_related(&self, field: &str, targets: &[Entity]) {
        let weak = targets
            .iter()
            .map(|target| Arc::downgrade(&target.inner))
            .collect();
        self.write().many.insert(field.to_string(), weak);
    }

    /// Live members of a one-to-many relation, in insertion order.
    pub fn related_many(&self, field: &str) -> Vec<Entity> {
        self.read()
            .many
            .get(field)
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(Weak::upgrade)
                    .map(|inner| Entity { inner })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Entity")
            .field("kind", &self.inner.kind)
            .field("id", &state.id)
            .field("values", &state.values)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldClass, SchemaRegistry};
    use serde_json::json;

    fn person() -> Entity {
        let registry = SchemaRegistry::new();
        registry.register("Person", "name", FieldClass::PrimaryKey).unwrap();
        registry.register("Person", "age", FieldClass::Column).unwrap();
        Entity::new("Person", registry.describe("Person"))
    }

    fn bare(kind: &'static str) -> Entity {
        Entity::new(kind, Arc::default())
    }

    #[test]
    fn test_columns_round_trip_through_json() {
        let e = person();
        e.set("name", "Ann").unwrap();
        e.set("age", 41u32).unwrap();

        assert_eq!(e.get::<String>("name").unwrap().as_deref(), Some("Ann"));
        assert_eq!(e.get::<u32>("age").unwrap(), Some(41));
        assert_eq!(e.get::<String>("missing").unwrap(), None);
        assert_eq!(e.value("age"), Some(json!(41)));
        assert!(e.get::<u32>("name").is_err());
    }

    #[test]
    fn test_only_declared_fields_can_be_set() {
        let e = person();
        assert!(matches!(
            e.set("_id", "forged"),
            Err(MapperError::UnknownField { .. })
        ));
        assert!(matches!(
            e.set("nickname", "Annie"),
            Err(MapperError::UnknownField { ref field, .. }) if field == "nickname"
        ));
        assert!(!e.is_persisted());
        assert!(e.values().is_empty());
    }

    #[test]
    fn test_relations_do_not_keep_targets_alive() {
        let owner = bare("Team");
        let member = bare("Player");
        owner.link("captain", &member);
        owner.add_related("players", &member);

        assert!(owner.related("captain").unwrap().same(&member));
        assert_eq!(owner.related_many("players").len(), 1);

        drop(member);
        assert!(owner.related("captain").is_none());
        assert!(owner.related_many("players").is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let a = person();
        let b = a.clone();
        b.set("name", "Shared").unwrap();
        assert!(a.same(&b));
        assert_eq!(a.value("name"), Some(json!("Shared")));
        assert!(!a.same(&person()));
    }
}
