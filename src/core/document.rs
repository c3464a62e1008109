//! Stored document shape and the field-name conventions the mapper writes.

use serde_json::{Map, Value as JsonValue};

/// A stored document: a flat JSON object with an optional nested relation section.
pub type Document = Map<String, JsonValue>;

/// Prefix reserved for bookkeeping fields.
pub const RESERVED_PREFIX: &str = "_";

/// Persisted identifier field.
pub const ID_FIELD: &str = "_id";

/// Nested section holding single-relation identifiers.
pub const RELATION_SECTION: &str = "_rel";

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Returns the persisted identifier of a document, if it carries one.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(JsonValue::as_str)
}

/// Resolves a dotted path (`_rel.owner`) against a document.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Exact-match predicate check: every predicate field must equal the document's value.
///
/// A predicate value of `null` also matches an absent field.
pub fn matches(document: &Document, predicate: &Document) -> bool {
    predicate
        .iter()
        .all(|(path, expected)| match lookup_path(document, path) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
}
