use super::{Mapper, check_target, stored_id};
use crate::core::{MapperError, Result};
use crate::entity::Entity;
use crate::schema::SchemaDescriptor;
use async_recursion::async_recursion;
use futures::future::try_join_all;
use log::debug;

impl Mapper {
    /// Insert `entity` (and every unsaved entity it relates to), or update it
    /// if it was saved before.
    ///
    /// The first store error aborts the whole chain; nothing is retried.
    pub async fn save(&self, entity: &Entity) -> Result<()> {
        self.save_from(entity, &[]).await.map(|_| ())
    }

    /// Save several entities concurrently.
    pub async fn save_all(&self, entities: &[Entity]) -> Result<()> {
        try_join_all(entities.iter().map(|entity| self.save(entity))).await?;
        Ok(())
    }

    /// Rewrite the stored document of an already saved entity.
    ///
    /// Fails with [`MapperError::NotPersisted`] before any store call if the
    /// entity has no persisted identifier.
    pub async fn update(&self, entity: &Entity) -> Result<()> {
        self.update_from(entity, &[]).await
    }

    /// `path` holds the entities whose saves led here; its last element is
    /// the caller.
    ///
    /// Returns `true` when the link back to the caller was left unset because
    /// the caller had no identifier yet.
    #[async_recursion]
    async fn save_from(&self, entity: &Entity, path: &[Entity]) -> Result<bool> {
        if entity.is_persisted() {
            self.update_from(entity, path).await?;
            return Ok(false);
        }
        if let Some(pos) = path.iter().position(|seen| seen.same(entity)) {
            return Err(MapperError::SaveCycle {
                entity: entity.kind().to_string(),
                length: path.len() - pos,
            });
        }

        let kind = entity.kind();
        let schema = self.schemas.describe(kind);
        self.check_relation_kinds(entity, &schema)?;

        let chain = extend(path, entity);
        let (skipped_caller, awaiting_link) = self
            .save_single_relations(entity, &schema, path.last(), &chain)
            .await?;

        if entity.is_persisted() {
            // Inserted meanwhile by a concurrent branch of the same save.
            self.update_from(entity, path).await?;
            self.relink(&awaiting_link, &chain).await?;
            return Ok(skipped_caller);
        }

        let document = self.to_document(entity)?;
        let stored = self.collection(kind).insert(document).await?;
        let id = stored_id(kind, &stored)?;
        debug!("inserted '{}' '{}'", kind, id);
        entity.set_id(Some(id.clone()));
        self.cache.insert(&id, entity);

        self.save_children(entity, &schema, &chain).await?;
        entity.replace_values(self.column_values(&schema, &id, &stored));

        self.relink(&awaiting_link, &chain).await?;
        Ok(skipped_caller)
    }

    /// Targets saved before the last entity of `chain` had an identifier
    /// skipped their link back to it; rewrite them so their documents carry it.
    async fn relink(&self, targets: &[Entity], chain: &[Entity]) -> Result<()> {
        try_join_all(targets.iter().map(|target| self.update_from(target, chain))).await?;
        Ok(())
    }

    #[async_recursion]
    async fn update_from(&self, entity: &Entity, path: &[Entity]) -> Result<()> {
        let kind = entity.kind();
        let Some(id) = entity.id() else {
            return Err(MapperError::NotPersisted(kind.to_string()));
        };

        let schema = self.schemas.describe(kind);
        self.check_relation_kinds(entity, &schema)?;
        let chain = extend(path, entity);
        self.save_single_relations(entity, &schema, path.last(), &chain)
            .await?;

        let document = self.to_document(entity)?;
        self.collection(kind).update(&id, document).await?;
        debug!("updated '{}' '{}'", kind, id);

        self.save_children(entity, &schema, &chain).await
    }

    /// Save unsaved one-to-one/many-to-one targets concurrently, skipping
    /// `caller`.
    ///
    /// Returns whether `caller` was skipped, and the targets whose stored link
    /// back to `entity` still has to be written once `entity` is saved. A
    /// relation pointing at `entity` itself is one of them.
    async fn save_single_relations(
        &self,
        entity: &Entity,
        schema: &SchemaDescriptor,
        caller: Option<&Entity>,
        chain: &[Entity],
    ) -> Result<(bool, Vec<Entity>)> {
        let mut skipped_caller = false;
        let mut self_link = false;
        let mut pending = Vec::new();
        for (field, _) in schema.single_relations() {
            let Some(target) = entity.related(field) else {
                continue;
            };
            if target.is_persisted() {
                continue;
            }
            if target.same(entity) {
                self_link = true;
                continue;
            }
            // One-level guard: only the immediate caller is recognised.
            if caller.is_some_and(|caller| caller.same(&target)) {
                skipped_caller = true;
                continue;
            }
            if !pending.iter().any(|seen: &Entity| seen.same(&target)) {
                pending.push(target);
            }
        }

        let skipped = try_join_all(pending.iter().map(|target| self.save_from(target, chain))).await?;

        let mut awaiting_link: Vec<Entity> = pending
            .into_iter()
            .zip(skipped)
            .filter_map(|(target, skipped)| skipped.then_some(target))
            .collect();
        if self_link {
            awaiting_link.push(entity.clone());
        }
        Ok((skipped_caller, awaiting_link))
    }

    /// Save unsaved one-to-many members concurrently, pointing each member's
    /// back-reference at `entity` first.
    ///
    /// Members already being saved further up `chain` only get the link; their
    /// own save writes it.
    async fn save_children(&self, entity: &Entity, schema: &SchemaDescriptor, chain: &[Entity]) -> Result<()> {
        let mut children = Vec::new();
        for (field, rel) in schema.many_relations() {
            let Some(back_ref) = rel.back_ref.as_deref() else {
                continue;
            };
            for child in entity.related_many(field) {
                check_target(entity, field, rel.target, &child)?;
                if child.is_persisted() {
                    continue;
                }
                child.link(back_ref, entity);
                if !chain.iter().any(|seen| seen.same(&child)) {
                    children.push(child);
                }
            }
        }

        try_join_all(children.iter().map(|child| self.save_from(child, chain))).await?;
        Ok(())
    }

    fn check_relation_kinds(&self, entity: &Entity, schema: &SchemaDescriptor) -> Result<()> {
        for (field, rel) in schema.single_relations() {
            if let Some(target) = entity.related(field) {
                check_target(entity, field, rel.target, &target)?;
            }
        }
        Ok(())
    }
}

fn extend(path: &[Entity], entity: &Entity) -> Vec<Entity> {
    let mut chain = Vec::with_capacity(path.len() + 1);
    chain.extend_from_slice(path);
    chain.push(entity.clone());
    chain
}
