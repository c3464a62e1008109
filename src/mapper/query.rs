use crate::entity::Entity;
use serde_json::Value as JsonValue;

/// Exact-match query over primary-key, column and single-relation fields.
///
/// ```ignore
/// let bobs = mapper.find::<Person>(Query::new().eq("name", "Bob")).await?;
/// let staff = mapper.find::<Absence>(Query::new().related("employee", &alice)).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub(crate) conditions: Vec<(String, Condition)>,
}

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Equals(JsonValue),
    /// Identifier of the related entity; `None` when it was never saved,
    /// which no stored document can reference.
    Related(Option<String>),
    Unrelated,
}

impl Query {
    /// Unconstrained query, matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions
            .push((field.into(), Condition::Equals(value.into())));
        self
    }

    /// Match entities whose single relation `field` points at `target`.
    pub fn related(mut self, field: impl Into<String>, target: &Entity) -> Self {
        self.conditions
            .push((field.into(), Condition::Related(target.id())));
        self
    }

    /// Match entities whose single relation `field` is unset.
    pub fn unrelated(mut self, field: impl Into<String>) -> Self {
        self.conditions.push((field.into(), Condition::Unrelated));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
