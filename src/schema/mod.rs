//! Per-type schema metadata and the declaration mechanism that fills it.

mod builder;
mod descriptor;
mod registry;

pub use builder::SchemaBuilder;
pub use descriptor::{FieldClass, RelationDescriptor, RelationKind, SchemaDescriptor};
pub use registry::SchemaRegistry;

use crate::core::SchemaError;

/// Declaration entry point stored alongside typed relations.
pub type DeclareFn = for<'a> fn(&mut SchemaBuilder<'a>) -> Result<(), SchemaError>;

/// A persisted entity type.
///
/// `NAME` doubles as the collection name. `declare` runs once per
/// [`Mapper`](crate::Mapper), on first use of the type.
///
/// ```ignore
/// struct Employee;
///
/// impl EntityKind for Employee {
///     const NAME: &'static str = "Employee";
///
///     fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
///         schema
///             .primary_key("name")?
///             .column("email")?
///             .relation("absences", RelationDescriptor::one_to_many::<Absence>("employee").cascade())?;
///         Ok(())
///     }
/// }
/// ```
pub trait EntityKind: 'static {
    const NAME: &'static str;

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Team;
    struct Player;
    struct Badge;

    impl EntityKind for Team {
        const NAME: &'static str = "Team";

        fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
            schema
                .primary_key("code")?
                .column("city")?
                .relation("players", RelationDescriptor::one_to_many::<Player>("team"))?;
            Ok(())
        }
    }

    impl EntityKind for Player {
        const NAME: &'static str = "Player";

        fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
            schema
                .column("name")?
                .relation("badge", RelationDescriptor::one_to_one::<Badge>().cascade())?;
            Ok(())
        }
    }

    impl EntityKind for Badge {
        const NAME: &'static str = "Badge";

        fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
            schema.column("label")?;
            Ok(())
        }
    }

    #[test]
    fn test_describe_unknown_type_is_empty() {
        let registry = SchemaRegistry::new();
        assert!(registry.describe("Nothing").is_empty());
        assert!(!registry.is_declared("Nothing"));
    }

    #[test]
    fn test_declaration_cascades_to_relation_targets() {
        let registry = SchemaRegistry::new();
        registry.ensure_declared(Team::NAME, Team::declare).unwrap();

        assert_eq!(registry.entity_types(), vec!["Badge", "Player", "Team"]);

        let team = registry.describe("Team");
        assert_eq!(team.primary_key(), Some("code"));
        assert!(team.has_column("city"));
        assert_eq!(team.many_relations().count(), 1);

        let player = registry.describe("Player");
        let back = player.relation("team").unwrap();
        assert_eq!(back.kind, RelationKind::ManyToOne);
        assert_eq!(back.target, "Team");
        assert!(player.relation("badge").unwrap().cascade);
    }

    #[test]
    fn test_reserved_and_invalid_names_are_rejected() {
        let registry = SchemaRegistry::new();
        let err = registry
            .register("Team", "_secret", FieldClass::Column)
            .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedField { .. }));

        let err = registry
            .register("Team", "a.b", FieldClass::Column)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));

        let err = registry
            .register("_Team", "name", FieldClass::Column)
            .unwrap_err();
        assert_eq!(err, SchemaError::InvalidEntityType("_Team".to_string()));

        let rel = RelationDescriptor::new(RelationKind::ManyToOne, "not a type");
        let err = registry
            .register("Team", "owner", FieldClass::Relation(rel))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidEntityType(_)));
    }

    #[test]
    fn test_field_has_exactly_one_classification() {
        let registry = SchemaRegistry::new();
        registry.register("Team", "city", FieldClass::Column).unwrap();
        registry.register("Team", "city", FieldClass::Column).unwrap();

        let err = registry
            .register("Team", "city", FieldClass::PrimaryKey)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict { .. }));

        registry.register("Team", "code", FieldClass::PrimaryKey).unwrap();
        let err = registry
            .register("Team", "other", FieldClass::PrimaryKey)
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicatePrimaryKey { .. }));
    }

    #[test]
    fn test_back_reference_conflict_leaves_owner_untouched() {
        let registry = SchemaRegistry::new();
        registry.register("Player", "team", FieldClass::Column).unwrap();

        let rel = RelationDescriptor::new(RelationKind::OneToMany, "Player").back_ref("team");
        let err = registry
            .register("Team", "players", FieldClass::Relation(rel))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict { .. }));
        assert!(registry.describe("Team").relation("players").is_none());
    }

    #[test]
    fn test_one_to_many_requires_back_reference() {
        let registry = SchemaRegistry::new();
        let rel = RelationDescriptor::new(RelationKind::OneToMany, "Player");
        let err = registry
            .register("Team", "players", FieldClass::Relation(rel))
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingBackReference { .. }));
    }

    #[test]
    fn test_self_referencing_one_to_many() {
        let registry = SchemaRegistry::new();
        let rel = RelationDescriptor::new(RelationKind::OneToMany, "Node").back_ref("parent");
        registry
            .register("Node", "children", FieldClass::Relation(rel))
            .unwrap();

        let node = registry.describe("Node");
        assert!(node.relation("children").is_some());
        assert_eq!(node.relation("parent").unwrap().kind, RelationKind::ManyToOne);
    }
}
