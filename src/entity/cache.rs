use super::Entity;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Per-type map from persisted identifier to the live instance.
///
/// Column values of a cached instance are never refreshed from the store; an
/// entry only goes away when the mapper deletes the entity or a load that
/// cached it fails.
#[derive(Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<&'static str, HashMap<String, Entity>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &str, id: &str) -> Option<Entity> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)?
            .get(id)
            .cloned()
    }

    /// Cache `entity` under `id` unless an instance is already cached there.
    ///
    /// Returns whichever instance ends up cached.
    pub fn get_or_insert(&self, id: &str, entity: &Entity) -> Entity {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(entity.kind())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| entity.clone())
            .clone()
    }

    /// Cache `entity` under `id`, replacing any previous instance.
    pub fn insert(&self, id: &str, entity: &Entity) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(entity.kind())
            .or_default()
            .insert(id.to_string(), entity.clone());
    }

    pub fn remove(&self, kind: &str, id: &str) -> Option<Entity> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(kind)?
            .remove(id)
    }

    /// Number of cached instances of `kind`.
    pub fn len(&self, kind: &str) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .all(HashMap::is_empty)
    }
}
