use super::{Mapper, Query, stored_id};
use crate::core::{Document, ID_FIELD, MapperError, RELATION_SECTION, Result};
use crate::entity::Entity;
use crate::schema::{EntityKind, SchemaDescriptor};
use async_recursion::async_recursion;
use log::{debug, warn};
use serde_json::Value as JsonValue;

impl Mapper {
    /// Every `T` matching `query`, hydrated through the identity cache.
    pub async fn find<T: EntityKind>(&self, query: Query) -> Result<Vec<Entity>> {
        self.register::<T>()?;
        self.find_kind(T::NAME, &query).await
    }

    /// First `T` matching `query`.
    pub async fn find_one<T: EntityKind>(&self, query: Query) -> Result<Option<Entity>> {
        Ok(self.find::<T>(query).await?.into_iter().next())
    }

    /// The `T` stored under `id`. Not found is `Ok(None)`, never an error.
    pub async fn find_by_id<T: EntityKind>(&self, id: &str) -> Result<Option<Entity>> {
        self.register::<T>()?;
        self.load_by_id(T::NAME, id).await
    }

    pub async fn all<T: EntityKind>(&self) -> Result<Vec<Entity>> {
        self.find::<T>(Query::new()).await
    }

    /// Number of stored `T` documents matching `query`, without hydrating them.
    pub async fn count<T: EntityKind>(&self, query: Query) -> Result<usize> {
        self.register::<T>()?;
        match self.translate(T::NAME, &query)? {
            Some(predicate) => Ok(self.collection(T::NAME).count(&predicate).await?),
            None => Ok(0),
        }
    }

    /// Find by entity type name, for callers that only know the type at runtime.
    pub async fn find_by_kind(&self, kind: &str, query: &Query) -> Result<Vec<Entity>> {
        let kind = self
            .schemas
            .entity_name(kind)
            .ok_or_else(|| MapperError::UnknownEntityType(kind.to_string()))?;
        self.find_kind(kind, query).await
    }

    /// Hydrate a stored document into a live instance.
    ///
    /// Returns the cached instance when one already represents this document,
    /// with its one-to-many relations recomputed from the store.
    pub async fn from_document(&self, kind: &'static str, document: Document) -> Result<Entity> {
        let mut hydrated = Vec::new();
        let loaded = self.load_document(kind, document, &mut hydrated).await;
        self.evict_on_error(loaded, &hydrated)
    }

    async fn find_kind(&self, kind: &'static str, query: &Query) -> Result<Vec<Entity>> {
        match self.translate(kind, query)? {
            Some(predicate) => self.load_where(kind, &predicate).await,
            None => Ok(Vec::new()),
        }
    }

    async fn load_by_id(&self, kind: &'static str, id: &str) -> Result<Option<Entity>> {
        Ok(self.load_where(kind, &id_predicate(id)).await?.into_iter().next())
    }

    /// Stored `target` instances whose `back_ref` points at `id`.
    pub(crate) async fn load_members(
        &self,
        target: &'static str,
        back_ref: &str,
        id: &str,
    ) -> Result<Vec<Entity>> {
        self.load_where(target, &back_ref_predicate(back_ref, id)).await
    }

    /// Top-level load: every instance cached by a failing load is evicted
    /// again, so nothing half-hydrated stays reachable.
    async fn load_where(&self, kind: &'static str, predicate: &Document) -> Result<Vec<Entity>> {
        let documents = self.collection(kind).find(predicate).await?;
        let mut entities = Vec::with_capacity(documents.len());
        for document in documents {
            let mut hydrated = Vec::new();
            let loaded = self.load_document(kind, document, &mut hydrated).await;
            entities.push(self.evict_on_error(loaded, &hydrated)?);
        }
        Ok(entities)
    }

    async fn load_document(
        &self,
        kind: &'static str,
        document: Document,
        hydrated: &mut Hydrated,
    ) -> Result<Entity> {
        let id = stored_id(kind, &document)?;
        match self.cache.get(kind, &id) {
            Some(cached) => {
                let schema = self.schemas.describe(kind);
                self.resolve_members(&cached, &schema, &id, hydrated).await?;
                Ok(cached)
            }
            None => self.hydrate(kind, document, hydrated).await,
        }
    }

    fn evict_on_error(&self, loaded: Result<Entity>, hydrated: &Hydrated) -> Result<Entity> {
        if loaded.is_err() {
            for (kind, id) in hydrated {
                self.cache.remove(kind, id);
            }
        }
        loaded
    }

    /// Loads reached while resolving relations; a cache hit is returned as is.
    async fn load_nested(
        &self,
        kind: &'static str,
        predicate: &Document,
        hydrated: &mut Hydrated,
    ) -> Result<Vec<Entity>> {
        let documents = self.collection(kind).find(predicate).await?;
        let mut entities = Vec::with_capacity(documents.len());
        for document in documents {
            entities.push(self.hydrate(kind, document, hydrated).await?);
        }
        Ok(entities)
    }

    #[async_recursion]
    async fn hydrate(&self, kind: &'static str, document: Document, hydrated: &mut Hydrated) -> Result<Entity> {
        let id = stored_id(kind, &document)?;
        if let Some(cached) = self.cache.get(kind, &id) {
            return Ok(cached);
        }

        let schema = self.schemas.describe(kind);
        let fresh = Entity::new(kind, schema.clone());
        fresh.set_id(Some(id.clone()));
        fresh.replace_values(self.column_values(&schema, &id, &document));

        // Cached before relations resolve, so a cycle back to this document
        // finds the in-progress instance.
        let entity = self.cache.get_or_insert(&id, &fresh);
        if !entity.same(&fresh) {
            return Ok(entity);
        }
        hydrated.push((kind, id.clone()));
        debug!("hydrating '{}' '{}'", kind, id);

        self.resolve_links(&entity, &schema, &document, hydrated).await?;
        self.resolve_members(&entity, &schema, &id, hydrated).await?;
        Ok(entity)
    }

    async fn resolve_links(
        &self,
        entity: &Entity,
        schema: &SchemaDescriptor,
        document: &Document,
        hydrated: &mut Hydrated,
    ) -> Result<()> {
        let section = document
            .get(RELATION_SECTION)
            .and_then(JsonValue::as_object);

        for (field, rel) in schema.single_relations() {
            let target_id = section
                .and_then(|relations| relations.get(field))
                .and_then(JsonValue::as_str);
            let Some(target_id) = target_id else {
                entity.unlink(field);
                continue;
            };

            let found = self
                .load_nested(rel.target, &id_predicate(target_id), hydrated)
                .await?;
            match found.into_iter().next() {
                Some(target) => entity.link(field, &target),
                None => {
                    warn!(
                        "'{}.{}' references missing '{}' '{}'",
                        entity.kind(),
                        field,
                        rel.target,
                        target_id
                    );
                    entity.unlink(field);
                }
            }
        }
        Ok(())
    }

    /// Recompute every one-to-many relation from the members' back-references.
    async fn resolve_members(
        &self,
        entity: &Entity,
        schema: &SchemaDescriptor,
        id: &str,
        hydrated: &mut Hydrated,
    ) -> Result<()> {
        for (field, rel) in schema.many_relations() {
            let Some(back_ref) = rel.back_ref.as_deref() else {
                continue;
            };
            let members = self
                .load_nested(rel.target, &back_ref_predicate(back_ref, id), hydrated)
                .await?;
            entity.set_related(field, &members);
        }
        Ok(())
    }
}

/// `(type, id)` of every instance a single top-level load put in the cache.
type Hydrated = Vec<(&'static str, String)>;

fn id_predicate(id: &str) -> Document {
    let mut predicate = Document::new();
    predicate.insert(ID_FIELD.to_string(), JsonValue::String(id.to_string()));
    predicate
}

fn back_ref_predicate(back_ref: &str, id: &str) -> Document {
    let mut predicate = Document::new();
    predicate.insert(
        format!("{}.{}", RELATION_SECTION, back_ref),
        JsonValue::String(id.to_string()),
    );
    predicate
}
