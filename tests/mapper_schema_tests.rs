mod common;

use common::{Absence, Employee};
use docrel::{
    EntityKind, Mapper, MapperError, MemoryStore, RelationDescriptor, RelationKind, SchemaBuilder,
    SchemaError,
};
use std::sync::Arc;

struct Reserved;

impl EntityKind for Reserved {
    const NAME: &'static str = "Reserved";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema.column("ok")?.column("_hidden")?;
        Ok(())
    }
}

struct Clashing;

impl EntityKind for Clashing {
    const NAME: &'static str = "Clashing";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        // `employee` is already the auto-linked back-reference on Absence.
        schema.relation(
            "absences",
            RelationDescriptor::one_to_many::<Absence>("employee"),
        )?;
        Ok(())
    }
}

struct ExplicitAbsence;

impl EntityKind for ExplicitAbsence {
    const NAME: &'static str = "ExplicitAbsence";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema
            .column("reason")?
            .relation("owner", RelationDescriptor::many_to_one::<Manager>().cascade())?;
        Ok(())
    }
}

struct Manager;

impl EntityKind for Manager {
    const NAME: &'static str = "Manager";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema.relation(
            "absences",
            RelationDescriptor::one_to_many::<ExplicitAbsence>("owner"),
        )?;
        Ok(())
    }
}

#[test]
fn registering_declares_every_reachable_type() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    mapper.register::<Employee>().unwrap();

    assert_eq!(
        mapper.schemas().entity_types(),
        vec!["Absence", "Department", "Employee"]
    );

    let absence = mapper.schemas().describe("Absence");
    let back = absence.relation("employee").expect("auto-linked back-reference");
    assert_eq!(back.kind, RelationKind::ManyToOne);
    assert_eq!(back.target, "Employee");
    assert!(!back.cascade);
    assert!(absence.has_column("reason"));
}

#[test]
fn reserved_field_fails_at_declaration() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    let err = mapper.register::<Reserved>().unwrap_err();
    assert!(matches!(
        err,
        MapperError::Schema(SchemaError::ReservedField { ref field, .. }) if field == "_hidden"
    ));
    assert!(!mapper.schemas().is_declared("Reserved"));

    // A failed declaration fails again rather than leaving a half-declared type usable.
    assert!(mapper.create::<Reserved>().is_err());
}

#[test]
fn conflicting_back_reference_fails_at_declaration() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    mapper.register::<Employee>().unwrap();

    let err = mapper.register::<Clashing>().unwrap_err();
    assert!(matches!(
        err,
        MapperError::Schema(SchemaError::Conflict { ref entity, .. }) if entity == "Absence"
    ));
}

#[test]
fn explicit_back_reference_matches_auto_link() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    mapper.register::<Manager>().unwrap();

    let absence = mapper.schemas().describe("ExplicitAbsence");
    let owner = absence.relation("owner").unwrap();
    assert_eq!(owner.kind, RelationKind::ManyToOne);
    assert_eq!(owner.target, "Manager");
    assert!(owner.cascade);
    assert!(absence.has_column("reason"));
}

#[test]
fn isolated_mappers_do_not_share_schemas() {
    let first = Mapper::new(Arc::new(MemoryStore::new()));
    let second = Mapper::new(Arc::new(MemoryStore::new()));
    first.register::<Employee>().unwrap();

    assert!(first.schemas().is_declared("Employee"));
    assert!(!second.schemas().is_declared("Employee"));
    assert!(second.schemas().describe("Employee").is_empty());
}

#[tokio::test]
async fn lookup_by_name_requires_a_declared_type() {
    let mapper = Mapper::new(Arc::new(MemoryStore::new()));
    let err = mapper
        .find_by_kind("Employee", &docrel::Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::UnknownEntityType(ref name) if name == "Employee"));

    mapper.register::<Employee>().unwrap();
    let found = mapper
        .find_by_kind("Employee", &docrel::Query::new())
        .await
        .unwrap();
    assert!(found.is_empty());
}
