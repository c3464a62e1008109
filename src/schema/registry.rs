use super::{DeclareFn, FieldClass, RelationDescriptor, RelationKind, SchemaBuilder, SchemaDescriptor};
use crate::core::{SchemaError, is_reserved};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Per-entity-type schema metadata.
///
/// Descriptors are replaced copy-on-write, so a descriptor handed out by
/// [`SchemaRegistry::describe`] never changes underneath its reader.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<&'static str, Arc<SchemaDescriptor>>>,
    declared: RwLock<HashSet<&'static str>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `field` on `entity`.
    ///
    /// Registering the same field again with an identical classification is a
    /// no-op. A one-to-many relation also registers its back-reference as a
    /// many-to-one relation on the destination type.
    pub fn register(
        &self,
        entity: &'static str,
        field: &str,
        class: FieldClass,
    ) -> Result<(), SchemaError> {
        validate_entity_name(entity)?;
        validate_field_name(entity, field)?;

        let back_link = match &class {
            FieldClass::Relation(rel) => {
                validate_entity_name(rel.target)?;
                match (rel.kind, &rel.back_ref) {
                    (RelationKind::OneToMany, None) => {
                        return Err(SchemaError::MissingBackReference {
                            entity: entity.to_string(),
                            field: field.to_string(),
                        });
                    }
                    (RelationKind::OneToMany, Some(back_ref)) => {
                        validate_field_name(rel.target, back_ref)?;
                        Some((rel.target, back_ref.clone()))
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);

        // Both sides are merged before anything is written back.
        let mut owner = schemas.get(entity).cloned().unwrap_or_default();
        if let Some(updated) = merge_field(entity, &owner, field, class, false)? {
            owner = Arc::new(updated);
        }

        let mut destination = None;
        if let Some((target, back_ref)) = back_link {
            let back = FieldClass::Relation(RelationDescriptor::new(RelationKind::ManyToOne, entity));
            let current = if target == entity {
                owner.clone()
            } else {
                schemas.get(target).cloned().unwrap_or_default()
            };
            if let Some(updated) = merge_field(target, &current, &back_ref, back, true)? {
                debug!("auto-linked back-reference '{}.{}' -> '{}'", target, back_ref, entity);
                if target == entity {
                    owner = Arc::new(updated);
                } else {
                    destination = Some((target, Arc::new(updated)));
                }
            }
        }

        schemas.insert(entity, owner);
        if let Some((target, descriptor)) = destination {
            schemas.insert(target, descriptor);
        }
        Ok(())
    }

    /// Accumulated descriptor for `entity`; empty if nothing was declared.
    pub fn describe(&self, entity: &str) -> Arc<SchemaDescriptor> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `entity` has run its declaration.
    pub fn is_declared(&self, entity: &str) -> bool {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(entity)
    }

    /// Interned name of a declared entity type.
    pub fn entity_name(&self, entity: &str) -> Option<&'static str> {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .copied()
    }

    /// Every declared entity type, sorted by name.
    pub fn entity_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        names.sort_unstable();
        names
    }

    /// Run `declare` for `entity` once, then declare every relation destination
    /// it references.
    pub fn ensure_declared(&self, entity: &'static str, declare: DeclareFn) -> Result<(), SchemaError> {
        validate_entity_name(entity)?;
        {
            let mut declared = self.declared.write().unwrap_or_else(PoisonError::into_inner);
            if !declared.insert(entity) {
                return Ok(());
            }
        }

        let mut builder = SchemaBuilder::new(self, entity);
        if let Err(err) = declare(&mut builder) {
            self.declared
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(entity);
            return Err(err);
        }
        debug!("declared entity type '{}'", entity);

        let pending: Vec<(&'static str, DeclareFn)> = self
            .describe(entity)
            .relations()
            .filter_map(|(_, rel)| rel.declare_target.map(|declare| (rel.target, declare)))
            .collect();
        for (target, declare) in pending {
            self.ensure_declared(target, declare)?;
        }
        Ok(())
    }
}

/// Returns the updated descriptor, or `None` when the field is already
/// registered with the same classification.
///
/// `implicit` marks auto-linked back-references, which never override an
/// explicit declaration's cascade flag.
fn merge_field(
    entity: &str,
    current: &SchemaDescriptor,
    field: &str,
    class: FieldClass,
    implicit: bool,
) -> Result<Option<SchemaDescriptor>, SchemaError> {
    let conflict = |existing: FieldClass| SchemaError::Conflict {
        entity: entity.to_string(),
        field: field.to_string(),
        existing: existing.to_string(),
    };

    let existing = current.classify(field);
    let mut updated = current.clone();
    match (existing, class) {
        (None, FieldClass::Column) => {
            updated.columns.insert(field.to_string());
        }
        (None, FieldClass::PrimaryKey) => {
            if let Some(pk) = &current.primary_key {
                return Err(SchemaError::DuplicatePrimaryKey {
                    entity: entity.to_string(),
                    existing: pk.clone(),
                });
            }
            updated.primary_key = Some(field.to_string());
        }
        (None, FieldClass::Relation(rel)) => {
            updated.relations.insert(field.to_string(), rel);
        }
        (Some(FieldClass::Column), FieldClass::Column)
        | (Some(FieldClass::PrimaryKey), FieldClass::PrimaryKey) => return Ok(None),
        (Some(FieldClass::Relation(old)), FieldClass::Relation(new)) if old.same_shape(&new) => {
            if implicit || (old.cascade == new.cascade && old.declare_target.is_some()) {
                return Ok(None);
            }
            let declare_target = new.declare_target.or(old.declare_target);
            updated.relations.insert(
                field.to_string(),
                RelationDescriptor {
                    declare_target,
                    ..new
                },
            );
        }
        (Some(existing), _) => return Err(conflict(existing)),
    }
    Ok(Some(updated))
}

pub(crate) fn validate_entity_name(name: &str) -> Result<(), SchemaError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(char::is_alphabetic)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidEntityType(name.to_string()))
    }
}

fn validate_field_name(entity: &str, field: &str) -> Result<(), SchemaError> {
    if is_reserved(field) {
        return Err(SchemaError::ReservedField {
            entity: entity.to_string(),
            field: field.to_string(),
        });
    }
    if field.is_empty() || field.contains('.') {
        return Err(SchemaError::InvalidField {
            entity: entity.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}
