//! Field-level copy rules shared by fork and merge.

use crate::model::{FieldMap, field};

/// Fields never carried from one document onto another.
///
/// Identity, timestamps and the locator are assigned by the store; the inline
/// taxonomy hints are re-derived by the explicit term copy.
pub const EXCLUDED_FIELDS: &[&str] = &[
    field::ID,
    field::CREATED_AT,
    field::CREATED_AT_GMT,
    field::PARENT,
    field::MODIFIED_AT,
    field::MODIFIED_AT_GMT,
    field::GUID,
    field::CATEGORY_INPUT,
    field::TAGS_INPUT,
    field::TAX_INPUT,
];

/// Whether `name` is excluded, either by default or by configuration.
#[must_use]
pub fn is_excluded(name: &str, extra: &[String]) -> bool {
    EXCLUDED_FIELDS.contains(&name) || extra.iter().any(|e| e == name)
}

/// Copy of `fields` with every excluded key removed.
#[must_use]
pub fn strip_excluded(fields: &FieldMap, extra: &[String]) -> FieldMap {
    fields
        .iter()
        .filter(|(name, _)| !is_excluded(name, extra))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
