use super::{FieldClass, RelationDescriptor, SchemaRegistry};
use crate::core::SchemaError;

/// Declaration handle passed to [`EntityKind::declare`](super::EntityKind::declare).
///
/// Every call registers immediately, so a bad declaration fails at the call
/// that introduced it.
pub struct SchemaBuilder<'a> {
    registry: &'a SchemaRegistry,
    entity: &'static str,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, entity: &'static str) -> Self {
        Self { registry, entity }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Field whose value doubles as the persisted identifier.
    pub fn primary_key(&mut self, field: &str) -> Result<&mut Self, SchemaError> {
        self.registry.register(self.entity, field, FieldClass::PrimaryKey)?;
        Ok(self)
    }

    pub fn column(&mut self, field: &str) -> Result<&mut Self, SchemaError> {
        self.registry.register(self.entity, field, FieldClass::Column)?;
        Ok(self)
    }

    pub fn columns(&mut self, fields: &[&str]) -> Result<&mut Self, SchemaError> {
        for field in fields {
            self.column(field)?;
        }
        Ok(self)
    }

    pub fn relation(
        &mut self,
        field: &str,
        descriptor: RelationDescriptor,
    ) -> Result<&mut Self, SchemaError> {
        self.registry
            .register(self.entity, field, FieldClass::Relation(descriptor))?;
        Ok(self)
    }
}
