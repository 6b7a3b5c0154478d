// Store-side document model - ordered fields with typed values

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 12-byte document identifier, rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a new, time-ordered identifier.
    pub fn new() -> Self {
        let bytes = ulid::Ulid::new().to_bytes();
        let mut id = [0u8; 12];
        id.copy_from_slice(&bytes[..12]);
        ObjectId(id)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 12]
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        if s.len() != 24 || !s.is_ascii() {
            return None;
        }
        let mut id = [0u8; 12];
        for (i, byte) in id.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(ObjectId(id))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s).ok_or_else(|| format!("invalid object id: {s:?}"))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Arbitrary-precision decimal kept in its textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal128(String);

impl Decimal128 {
    /// Accepts an optional sign, digits with at most one decimal point, and an
    /// optional exponent.
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix(['-', '+']).unwrap_or(s);
        let (mantissa, exponent) = match body.split_once(['e', 'E']) {
            Some((m, e)) => (m, Some(e)),
            None => (body, None),
        };
        let digits = mantissa.replacen('.', "", 1);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if let Some(exp) = exponent {
            let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            if exp.is_empty() || !exp.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
        }
        Some(Decimal128(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    Document(Document),
    Array(Vec<Value>),
    Binary(Vec<u8>),
    Decimal(Decimal128),
    Regex { pattern: String, options: String },
    Null,
}

impl Value {
    /// Render as extended JSON. Plain JSON types map directly; `Int64`,
    /// identifiers, timestamps, binary, decimals and regexes use `$`-keys.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::String(s) => json!(s),
            Value::Int32(n) => json!(n),
            Value::Int64(n) => json!({ "$numberLong": n.to_string() }),
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| json!({ "$numberDouble": f.to_string() })),
            Value::Boolean(b) => json!(b),
            Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
            Value::DateTime(dt) => {
                json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) })
            }
            Value::Document(doc) => doc.to_json(),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Binary(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                json!({ "$binary": hex })
            }
            Value::Decimal(d) => json!({ "$numberDecimal": d.as_str() }),
            Value::Regex { pattern, options } => json!({ "$regex": pattern, "$options": options }),
            Value::Null => serde_json::Value::Null,
        }
    }

    /// Parse extended JSON. Integers that fit 32 bits become `Int32`, larger
    /// ones `Int64`; numbers with a fractional part become `Double`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map_or(Value::Int64(i), Value::Int32)
                } else if let Some(u) = n.as_u64() {
                    i64::try_from(u).map_or(Value::Double(u as f64), Value::Int64)
                } else {
                    Value::Double(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                extended_value(map).unwrap_or_else(|| {
                    Value::Document(
                        map.iter()
                            .map(|(k, v)| (k.clone(), Value::from_json(v)))
                            .collect(),
                    )
                })
            }
        }
    }
}

fn extended_value(map: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    if map.len() == 2 {
        let pattern = map.get("$regex")?.as_str()?;
        let options = map.get("$options")?.as_str()?;
        return Some(Value::Regex {
            pattern: pattern.to_string(),
            options: options.to_string(),
        });
    }
    if map.len() != 1 {
        return None;
    }
    let (key, value) = map.iter().next()?;
    let text = value.as_str()?;
    match key.as_str() {
        "$oid" => ObjectId::parse_str(text).map(Value::ObjectId),
        "$date" => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
        "$numberLong" => text.parse().ok().map(Value::Int64),
        "$numberDouble" => text.parse().ok().map(Value::Double),
        "$numberDecimal" => Decimal128::parse(text).map(Value::Decimal),
        "$binary" => decode_hex(text).map(Value::Binary),
        _ => None,
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// An ordered set of named values, as returned by a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field. Replacement keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Insert a field at the front, as stores do for a generated `_id`.
    pub fn insert_first(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(0, (key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Resolve a dotted path through nested documents.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            match current {
                Value::Document(doc) => current = doc.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Build a document from an extended-JSON object; `None` for non-objects.
    pub fn from_json(json: &serde_json::Value) -> Option<Document> {
        match Value::from_json(json) {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_object_id_hex() {
        let id = ObjectId::new();
        assert!(!id.is_zero());
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ObjectId::parse_str(&hex), Some(id));
        assert_eq!(ObjectId::parse_str("xyz"), None);
        assert!(ObjectId::default().is_zero());
    }

    #[test]
    fn test_decimal_parse() {
        assert!(Decimal128::parse("12.50").is_some());
        assert!(Decimal128::parse("-1e10").is_some());
        assert!(Decimal128::parse("1.2.3").is_none());
        assert!(Decimal128::parse("abc").is_none());
    }

    #[test]
    fn test_from_json_number_kinds() {
        let doc = Document::from_json(&json!({
            "small": 7,
            "big": 5_000_000_000i64,
            "long": { "$numberLong": "7" },
            "ratio": 0.5,
        }))
        .unwrap();
        assert_eq!(doc.get("small"), Some(&Value::Int32(7)));
        assert_eq!(doc.get("big"), Some(&Value::Int64(5_000_000_000)));
        assert_eq!(doc.get("long"), Some(&Value::Int64(7)));
        assert_eq!(doc.get("ratio"), Some(&Value::Double(0.5)));
    }

    #[test]
    fn test_extended_json_kinds_survive_rendering() {
        let id = ObjectId::new();
        let when = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let doc = Document::new()
            .with("_id", id)
            .with("at", when)
            .with("count", Value::Int64(3))
            .with("blob", Value::Binary(vec![0xde, 0xad]))
            .with("price", Value::Decimal(Decimal128::parse("9.99").unwrap()))
            .with("re", Value::Regex { pattern: "^a".into(), options: "i".into() })
            .with("nested", Document::new().with("city", "Oslo"));

        let parsed = Document::from_json(&doc.to_json()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_field_order_preserved() {
        let mut doc = Document::from_json(&json!({ "b": 1, "a": 2 })).unwrap();
        doc.insert_first("_id", ObjectId::new());
        doc.insert("b", 3);
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["_id", "b", "a"]);
    }

    #[test]
    fn test_get_path() {
        let doc = Document::new().with("address", Document::new().with("city", "Oslo"));
        assert_eq!(doc.get_path("address.city"), Some(&Value::from("Oslo")));
        assert_eq!(doc.get_path("address.zip"), None);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Document::from_json(&json!([1, 2])).is_none());
    }
}
