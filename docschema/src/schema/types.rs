use serde::{Deserialize, Serialize};

/// The primitive kind a field's value is stored as.
///
/// Leaf composites (timestamps, object ids, decimals) get their own kind and
/// are never recursed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Bool,
    Int,
    Uint,
    Float,
    Timestamp,
    ObjectId,
    Decimal,
    Binary,
    Any,
    Object,
    Array,
}

impl FieldKind {
    /// True when `value` is the zero value for this kind.
    ///
    /// A missing field should be passed as `Value::Null`.
    pub fn is_empty(&self, value: &serde_json::Value) -> bool {
        match (self, value) {
            (_, serde_json::Value::Null) => true,
            (FieldKind::ObjectId, serde_json::Value::String(s)) => s.is_empty() || s.bytes().all(|b| b == b'0'),
            _ => is_zero_value(value),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Int | FieldKind::Uint | FieldKind::Float)
    }
}

/// Structural zero test used for kinds without a more specific rule.
pub(crate) fn is_zero_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(map) => map.values().all(is_zero_value),
    }
}

/// One node of the canonical field tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Name as declared on the Rust type.
    pub name: String,
    /// Name as written to the store.
    pub wire_name: String,
    pub type_label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub index: bool,
    pub immutable: bool,
    pub omit_empty: bool,
    pub default: Option<String>,
    pub enum_values: Vec<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub reference: Option<String>,
    pub sub_fields: Vec<FieldSchema>,
    /// Set when `sub_fields` describe the elements of a sequence.
    pub is_slice: bool,
}

impl FieldSchema {
    pub fn is_nested(&self) -> bool {
        !self.sub_fields.is_empty()
    }

    /// Unique or indexed fields contribute a single-field index.
    pub fn is_indexed(&self) -> bool {
        self.unique || self.index
    }
}

/// A multi-field index declared by a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundIndex {
    pub fields: Vec<String>,
    pub unique: bool,
}

impl CompoundIndex {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            unique: true,
            ..Self::new(fields)
        }
    }

    /// Canonical index name, e.g. `author_1_status_1`.
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{f}_1"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadConcern {
    Local,
    Available,
    Majority,
    Linearizable,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConcern {
    /// Acknowledgement level: a node count or a tag such as `majority`.
    pub w: Option<String>,
    #[serde(default)]
    pub journal: bool,
    pub timeout_ms: Option<u64>,
}

/// Per-collection consistency settings supplied by a [`crate::Configurable`] model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    pub read_preference: Option<ReadPreference>,
    pub read_concern: Option<ReadConcern>,
    pub write_concern: Option<WriteConcern>,
}

/// Lifecycle hooks a model implements. Only presence is recorded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    BeforeCreate,
    AfterCreate,
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeCreate => "before_create",
            HookKind::AfterCreate => "after_create",
            HookKind::BeforeSave => "before_save",
            HookKind::AfterSave => "after_save",
            HookKind::BeforeDelete => "before_delete",
            HookKind::AfterDelete => "after_delete",
        }
    }
}

/// Canonical schema for one registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub model_name: String,
    pub collection: String,
    pub fields: Vec<FieldSchema>,
    pub compound_indexes: Vec<CompoundIndex>,
    pub hooks: Vec<HookKind>,
    pub collection_options: Option<CollectionOptions>,
}

impl Schema {
    /// Top-level field by wire name.
    pub fn field(&self, wire_name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }

    pub fn has_hook(&self, hook: HookKind) -> bool {
        self.hooks.contains(&hook)
    }
}
