use super::{CascadeFailurePolicy, Mapper};
use crate::core::{MapperError, Result};
use crate::entity::Entity;
use async_recursion::async_recursion;
use log::{debug, warn};
use std::collections::HashSet;

/// A related entity that could not be deleted during a cascade.
#[derive(Debug)]
pub struct CascadeFailure {
    pub entity: &'static str,
    pub id: Option<String>,
    pub error: MapperError,
}

/// Outcome of [`Mapper::delete`].
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Whether the entity's own document was removed.
    pub removed: bool,
    /// Cascade failures anywhere below the entity.
    pub cascade_failures: Vec<CascadeFailure>,
}

impl DeleteReport {
    /// Removed, and every cascade succeeded.
    pub fn is_complete(&self) -> bool {
        self.removed && self.cascade_failures.is_empty()
    }
}

impl Mapper {
    /// Delete `entity`, deleting the targets of cascade-flagged relations first.
    ///
    /// One-to-many members are looked up in the store, and a failing lookup
    /// fails the delete before anything is removed. An unsaved entity is left
    /// alone and reported as not removed. Once removed, the entity leaves the
    /// identity cache and loses its persisted identifier.
    pub async fn delete(&self, entity: &Entity) -> Result<DeleteReport> {
        let mut visited = HashSet::new();
        self.delete_inner(entity, &mut visited).await
    }

    #[async_recursion]
    async fn delete_inner(
        &self,
        entity: &Entity,
        visited: &mut HashSet<(&'static str, String)>,
    ) -> Result<DeleteReport> {
        let kind = entity.kind();
        let Some(id) = entity.id() else {
            return Ok(DeleteReport::default());
        };
        // Already being deleted further up this chain.
        if !visited.insert((kind, id.clone())) {
            return Ok(DeleteReport::default());
        }

        let schema = self.schemas.describe(kind);
        let mut targets = Vec::new();
        for (field, rel) in schema.relations() {
            if !rel.cascade {
                continue;
            }
            match rel.back_ref.as_deref() {
                // Members come from the store, not the in-memory list.
                Some(back_ref) if !rel.kind.is_single() => {
                    targets.extend(self.load_members(rel.target, back_ref, &id).await?);
                }
                _ => targets.extend(entity.related(field)),
            }
        }

        let mut report = DeleteReport::default();
        for target in &targets {
            match self.delete_inner(target, visited).await {
                Ok(nested) => report.cascade_failures.extend(nested.cascade_failures),
                Err(err) => match self.config.cascade_failure_policy {
                    CascadeFailurePolicy::Collect => {
                        warn!(
                            "cascade delete of '{}' {:?} from '{}' '{}' failed: {}",
                            target.kind(),
                            target.id(),
                            kind,
                            id,
                            err
                        );
                        report.cascade_failures.push(CascadeFailure {
                            entity: target.kind(),
                            id: target.id(),
                            error: err,
                        });
                    }
                    CascadeFailurePolicy::Abort => {
                        return Err(MapperError::CascadeAborted {
                            entity: kind.to_string(),
                            source: Box::new(err),
                        });
                    }
                },
            }
        }

        report.removed = self.collection(kind).remove(&id).await? > 0;
        debug!("removed '{}' '{}': {}", kind, id, report.removed);

        if self
            .cache
            .get(kind, &id)
            .is_some_and(|cached| cached.same(entity))
        {
            self.cache.remove(kind, &id);
        }
        entity.set_id(None);
        Ok(report)
    }
}
