use crate::context::Context;
use crate::document::Value;
use crate::error::{DocSchemaError, Result};
use crate::index::IndexKey;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub const DEFAULT_SAMPLE_SIZE: usize = 500;

/// A field type inferred from sampled documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InferredType {
    String,
    Int32,
    Int64,
    Double,
    Bool,
    ObjectId,
    DateTime,
    Document,
    Binary,
    Decimal,
    Null,
    /// No single type fits.
    Any,
    /// `None` for empty or mixed arrays.
    Array(Option<Box<InferredType>>),
    Nullable(Box<InferredType>),
}

impl InferredType {
    fn is_integer(&self) -> bool {
        matches!(self, InferredType::Int32 | InferredType::Int64)
    }

    /// Rust type used when generating a model for this field.
    pub fn rust_type(&self) -> String {
        match self {
            InferredType::String => "String".into(),
            InferredType::Int32 => "i32".into(),
            InferredType::Int64 => "i64".into(),
            InferredType::Double => "f64".into(),
            InferredType::Bool => "bool".into(),
            InferredType::ObjectId => "ObjectId".into(),
            InferredType::DateTime => "DateTime<Utc>".into(),
            InferredType::Binary => "Vec<u8>".into(),
            InferredType::Decimal => "Decimal128".into(),
            InferredType::Document | InferredType::Null | InferredType::Any => "serde_json::Value".into(),
            InferredType::Array(None) => "Vec<serde_json::Value>".into(),
            InferredType::Array(Some(inner)) => format!("Vec<{}>", inner.rust_type()),
            InferredType::Nullable(inner) => format!("Option<{}>", inner.rust_type()),
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::String => f.write_str("string"),
            InferredType::Int32 => f.write_str("int32"),
            InferredType::Int64 => f.write_str("int64"),
            InferredType::Double => f.write_str("double"),
            InferredType::Bool => f.write_str("bool"),
            InferredType::ObjectId => f.write_str("objectId"),
            InferredType::DateTime => f.write_str("date"),
            InferredType::Document => f.write_str("object"),
            InferredType::Binary => f.write_str("binData"),
            InferredType::Decimal => f.write_str("decimal"),
            InferredType::Null => f.write_str("null"),
            InferredType::Any => f.write_str("any"),
            InferredType::Array(None) => f.write_str("array"),
            InferredType::Array(Some(inner)) => write!(f, "array<{inner}>"),
            InferredType::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredField {
    pub name: String,
    pub inferred: InferredType,
    /// Present in every sampled document.
    pub required: bool,
    pub unique: bool,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredIndex {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCollection {
    pub name: String,
    /// In first-seen order.
    pub fields: Vec<DiscoveredField>,
    pub indexes: Vec<DiscoveredIndex>,
    pub doc_count: u64,
}

impl DiscoveredCollection {
    pub fn field(&self, name: &str) -> Option<&DiscoveredField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverOptions {
    /// Documents sampled per collection; `0` means the default of 500.
    #[serde(default)]
    pub sample_size: usize,
    /// Collections to inspect; empty means every collection in the store.
    #[serde(default)]
    pub collections: Vec<String>,
}

impl DiscoverOptions {
    pub fn effective_sample_size(&self) -> usize {
        if self.sample_size == 0 {
            DEFAULT_SAMPLE_SIZE
        } else {
            self.sample_size
        }
    }
}

/// Inferred type of a single stored value.
pub fn infer_value_type(value: &Value) -> InferredType {
    match value {
        Value::String(_) => InferredType::String,
        Value::Int32(_) => InferredType::Int32,
        Value::Int64(_) => InferredType::Int64,
        Value::Double(_) => InferredType::Double,
        Value::Boolean(_) => InferredType::Bool,
        Value::ObjectId(_) => InferredType::ObjectId,
        Value::DateTime(_) => InferredType::DateTime,
        Value::Document(_) => InferredType::Document,
        Value::Binary(_) => InferredType::Binary,
        Value::Decimal(_) => InferredType::Decimal,
        Value::Null => InferredType::Null,
        Value::Regex { .. } => InferredType::Any,
        Value::Array(items) => infer_array_type(items),
    }
}

fn infer_array_type(items: &[Value]) -> InferredType {
    let mut types = items.iter().map(infer_value_type);
    let Some(first) = types.next() else {
        return InferredType::Array(None);
    };
    if first == InferredType::Null || types.any(|t| t != first) {
        return InferredType::Array(None);
    }
    InferredType::Array(Some(Box::new(first)))
}

/// Collapse the set of types observed for one field.
///
/// `null` only makes the result nullable; int32 widens to int64; integers
/// mixed with doubles become double. Anything still ambiguous is `Any`.
pub fn resolve_type(observed: &BTreeSet<InferredType>) -> InferredType {
    let mut kinds = observed.clone();
    let nullable = kinds.remove(&InferredType::Null);

    if kinds.contains(&InferredType::Int32) && kinds.contains(&InferredType::Int64) {
        kinds.remove(&InferredType::Int32);
    }
    if kinds.contains(&InferredType::Double) && kinds.iter().any(InferredType::is_integer) {
        kinds.retain(|k| !k.is_integer());
    }

    let mut remaining = kinds.into_iter();
    match (remaining.next(), remaining.next()) {
        (Some(only), None) if nullable => InferredType::Nullable(Box::new(only)),
        (Some(only), None) => only,
        _ => InferredType::Any,
    }
}

/// Discover every selected collection, one after another.
pub fn discover(
    store: &dyn DocumentStore,
    ctx: &Context,
    options: &DiscoverOptions,
) -> Result<Vec<DiscoveredCollection>> {
    let names = if options.collections.is_empty() {
        store
            .list_collections(ctx)
            .map_err(|e| DocSchemaError::store("discover: list collections", e))?
    } else {
        options.collections.clone()
    };

    let sample_size = options.effective_sample_size();
    names
        .iter()
        .map(|name| discover_collection(store, ctx, name, sample_size))
        .collect()
}

/// Infer fields and list indexes for one collection.
pub fn discover_collection(
    store: &dyn DocumentStore,
    ctx: &Context,
    collection: &str,
    sample_size: usize,
) -> Result<DiscoveredCollection> {
    let wrap = |e| DocSchemaError::store(format!("discover: collection {collection}"), e);

    let documents = store.sample_documents(ctx, collection, sample_size).map_err(wrap)?;
    log::debug!("Sampled {} documents from {collection}", documents.len());

    let mut order: Vec<String> = Vec::new();
    let mut seen: HashMap<String, (usize, BTreeSet<InferredType>)> = HashMap::new();
    for doc in &documents {
        for (key, value) in doc.iter() {
            let entry = seen.entry(key.to_string()).or_insert_with(|| {
                order.push(key.to_string());
                (0, BTreeSet::new())
            });
            entry.0 += 1;
            entry.1.insert(infer_value_type(value));
        }
    }

    let mut fields: Vec<DiscoveredField> = order
        .into_iter()
        .filter_map(|name| {
            let (count, kinds) = seen.remove(&name)?;
            Some(DiscoveredField {
                inferred: resolve_type(&kinds),
                required: count == documents.len(),
                unique: false,
                indexed: false,
                name,
            })
        })
        .collect();

    let indexes: Vec<DiscoveredIndex> = store
        .list_indexes(ctx, collection)
        .map_err(wrap)?
        .into_iter()
        .map(|i| DiscoveredIndex {
            name: i.name,
            keys: i.keys,
            unique: i.unique,
        })
        .collect();

    let doc_count = store.count_documents(ctx, collection).map_err(wrap)?;

    for index in indexes.iter().filter(|i| i.keys.len() == 1) {
        if let Some(field) = fields.iter_mut().find(|f| f.name == index.keys[0].field) {
            if index.unique {
                field.unique = true;
            } else {
                field.indexed = true;
            }
        }
    }

    Ok(DiscoveredCollection {
        name: collection.to_string(),
        fields,
        indexes,
        doc_count,
    })
}
