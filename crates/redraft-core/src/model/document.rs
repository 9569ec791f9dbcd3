use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// Scalar fields of a document, keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

/// Well-known field names.
pub mod field {
    pub const ID: &str = "id";
    pub const STATUS: &str = "status";
    pub const PARENT: &str = "parent";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const EXCERPT: &str = "excerpt";
    pub const AUTHOR: &str = "author";
    pub const CREATED_AT: &str = "created_at";
    pub const CREATED_AT_GMT: &str = "created_at_gmt";
    pub const MODIFIED_AT: &str = "modified_at";
    pub const MODIFIED_AT_GMT: &str = "modified_at_gmt";
    /// Globally-unique locator assigned by the store.
    pub const GUID: &str = "guid";
    pub const CATEGORY_INPUT: &str = "category_input";
    pub const TAGS_INPUT: &str = "tags_input";
    pub const TAX_INPUT: &str = "tax_input";

    /// Timestamp fields the store maintains.
    pub const TIMESTAMPS: &[&str] = &[CREATED_AT, CREATED_AT_GMT, MODIFIED_AT, MODIFIED_AT_GMT];
}

/// Stable identifier of a stored document. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DocumentId(i64);

impl DocumentId {
    /// Wrap a raw identifier, rejecting zero and negative values.
    #[must_use]
    pub const fn new(raw: i64) -> Option<Self> {
        if raw > 0 { Some(Self(raw)) } else { None }
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DocumentId> for i64 {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl TryFrom<i64> for DocumentId {
    type Error = InvalidDocumentId;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| InvalidDocumentId(raw.to_string()))
    }
}

impl FromStr for DocumentId {
    type Err = InvalidDocumentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidDocumentId(s.to_string()))
    }
}

/// Error returned when text or a number is not a well-formed document id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid document id: '{0}'")]
pub struct InvalidDocumentId(pub String);

/// A stored document: identity, status, optional parent and scalar fields.
///
/// `fields` never contains the `id`, `status` or `parent` keys; those live in
/// the typed members and are folded back in by [`Document::to_field_map`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub status: String,
    pub parent: Option<DocumentId>,
    pub fields: FieldMap,
}

impl Document {
    /// Look up a scalar field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.field(field::TITLE).unwrap_or_default()
    }

    #[must_use]
    pub fn guid(&self) -> Option<&str> {
        self.field(field::GUID)
    }

    /// The complete field set, including identity, status and parent.
    #[must_use]
    pub fn to_field_map(&self) -> FieldMap {
        let mut map = self.fields.clone();
        map.insert(field::ID.to_string(), self.id.to_string());
        map.insert(field::STATUS.to_string(), self.status.clone());
        if let Some(parent) = self.parent {
            map.insert(field::PARENT.to_string(), parent.to_string());
        }
        map
    }
}

/// One metadata row. Keys may repeat; rows keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

impl MetaEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Taxonomy name to the ordered set of assigned term slugs.
pub type TermSet = BTreeMap<String, Vec<String>>;

/// Result of replacing a document's term assignments from another document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCopyOutcome {
    /// Number of terms assigned to the target, per taxonomy touched.
    pub per_taxonomy: BTreeMap<String, usize>,
}

impl TermCopyOutcome {
    #[must_use]
    pub fn total(&self) -> usize {
        self.per_taxonomy.values().sum()
    }
}
