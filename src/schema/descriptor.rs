use super::{DeclareFn, EntityKind};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The type of relationship between two entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    /// Never stored on the owner; recomputed from the destination's back-reference.
    OneToMany,
}

impl RelationKind {
    /// Whether the owning document stores the destination's identifier.
    pub fn is_single(self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::OneToMany => "one-to-many",
        };
        f.write_str(name)
    }
}

/// Metadata about a relation field.
#[derive(Clone)]
pub struct RelationDescriptor {
    pub kind: RelationKind,
    /// Destination entity type name.
    pub target: &'static str,
    /// Delete the destination(s) when the owner is deleted.
    pub cascade: bool,
    /// Field on the destination pointing back to the owner (one-to-many only).
    pub back_ref: Option<String>,
    pub(crate) declare_target: Option<DeclareFn>,
}

impl RelationDescriptor {
    /// Relation to a destination known only by name.
    ///
    /// The destination is not declared automatically; typed constructors
    /// such as [`RelationDescriptor::one_to_one`] should be preferred.
    pub fn new(kind: RelationKind, target: &'static str) -> Self {
        Self {
            kind,
            target,
            cascade: false,
            back_ref: None,
            declare_target: None,
        }
    }

    pub fn one_to_one<D: EntityKind>() -> Self {
        Self::typed::<D>(RelationKind::OneToOne)
    }

    pub fn many_to_one<D: EntityKind>() -> Self {
        Self::typed::<D>(RelationKind::ManyToOne)
    }

    pub fn one_to_many<D: EntityKind>(back_ref: impl Into<String>) -> Self {
        Self::typed::<D>(RelationKind::OneToMany).back_ref(back_ref)
    }

    fn typed<D: EntityKind>(kind: RelationKind) -> Self {
        Self {
            declare_target: Some(D::declare as DeclareFn),
            ..Self::new(kind, D::NAME)
        }
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn back_ref(mut self, field: impl Into<String>) -> Self {
        self.back_ref = Some(field.into());
        self
    }

    /// Same kind, destination and back-reference. The cascade flag is not compared.
    pub fn same_shape(&self, other: &RelationDescriptor) -> bool {
        self.kind == other.kind && self.target == other.target && self.back_ref == other.back_ref
    }
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("cascade", &self.cascade)
            .field("back_ref", &self.back_ref)
            .finish()
    }
}

/// How a declared field is stored.
#[derive(Debug, Clone)]
pub enum FieldClass {
    Column,
    PrimaryKey,
    Relation(RelationDescriptor),
}

impl fmt::Display for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldClass::Column => f.write_str("a column"),
            FieldClass::PrimaryKey => f.write_str("the primary key"),
            FieldClass::Relation(rel) => write!(f, "a {} relation to '{}'", rel.kind, rel.target),
        }
    }
}

/// Accumulated schema of one entity type.
#[derive(Debug, Clone, Default)]
pub struct SchemaDescriptor {
    pub(crate) primary_key: Option<String>,
    pub(crate) columns: BTreeSet<String>,
    pub(crate) relations: BTreeMap<String, RelationDescriptor>,
}

impl SchemaDescriptor {
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationDescriptor)> {
        self.relations.iter().map(|(field, rel)| (field.as_str(), rel))
    }

    pub fn relation(&self, field: &str) -> Option<&RelationDescriptor> {
        self.relations.get(field)
    }

    /// One-to-one and many-to-one relations.
    pub fn single_relations(&self) -> impl Iterator<Item = (&str, &RelationDescriptor)> {
        self.relations().filter(|(_, rel)| rel.kind.is_single())
    }

    pub fn many_relations(&self) -> impl Iterator<Item = (&str, &RelationDescriptor)> {
        self.relations().filter(|(_, rel)| !rel.kind.is_single())
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.columns.contains(field)
    }

    pub fn is_primary_key(&self, field: &str) -> bool {
        self.primary_key.as_deref() == Some(field)
    }

    pub fn classify(&self, field: &str) -> Option<FieldClass> {
        if self.is_primary_key(field) {
            Some(FieldClass::PrimaryKey)
        } else if self.has_column(field) {
            Some(FieldClass::Column)
        } else {
            self.relation(field).cloned().map(FieldClass::Relation)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary_key.is_none() && self.columns.is_empty() && self.relations.is_empty()
    }
}
