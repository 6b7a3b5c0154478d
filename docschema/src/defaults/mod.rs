use crate::document::{Decimal128, ObjectId};
use crate::error::{DocSchemaError, Result};
use crate::schema::{FieldKind, FieldSchema, Model, Schema};
use crate::validation::field_path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Fill empty fields that declare a `default=` with the parsed default.
///
/// Only the default-bearing fields are written; everything else on the
/// instance is left as it was. Meant for the create path only. Any unparsable
/// default fails the whole call and leaves `instance` untouched.
pub fn apply_defaults<T: Model>(instance: &mut T, schema: &Schema) -> Result<()> {
    if instance.fill_fields(&schema.fields, "", Pass::Check)? > 0 {
        instance.fill_fields(&schema.fields, "", Pass::Apply)?;
    }
    Ok(())
}

/// Same as [`apply_defaults`] on an already-serialized instance.
pub fn apply_defaults_document(document: &mut Value, schema: &Schema) -> Result<()> {
    let mut working = document.clone();
    apply_fields(&schema.fields, &mut working, "")?;
    *document = working;
    Ok(())
}

/// Whether a fill walk writes to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Build every default that would be assigned, then drop it.
    Check,
    Apply,
}

/// A value that can take a field default in place.
///
/// Implemented for every type with a [`crate::schema::FieldShape`] impl, and
/// by `#[derive(Model)]` for model structs.
pub trait DefaultSlot {
    /// Assign `field`'s default when this slot is empty, then descend into
    /// its sub-fields. Returns the number of defaults assigned.
    fn fill_slot(&mut self, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize>;

    /// A value built from `field`'s default, for a slot that holds nothing yet.
    fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self>
    where
        Self: Sized;

    /// Fill the named fields of a model struct. Other types have none.
    fn fill_fields(&mut self, _fields: &[FieldSchema], _prefix: &str, _pass: Pass) -> Result<usize> {
        Ok(0)
    }
}

/// Fill one struct field. Called from derived `fill_fields`.
#[doc(hidden)]
pub fn fill_field<T: DefaultSlot>(slot: &mut T, field: &FieldSchema, prefix: &str, pass: Pass) -> Result<usize> {
    slot.fill_slot(field, &field_path(prefix, &field.wire_name), pass)
}

/// `fill_slot` for a model struct nested under `field`. Empty objects are
/// not descended into.
#[doc(hidden)]
pub fn fill_model<T>(slot: &mut T, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize>
where
    T: DefaultSlot + Serialize,
{
    if field.kind.is_empty(&serde_json::to_value(&*slot)?) {
        return match &field.default {
            Some(raw) => Err(unsupported_default(field, raw, path)),
            None => Ok(0),
        };
    }
    slot.fill_fields(&field.sub_fields, path, pass)
}

fn fill_scalar<T>(slot: &mut T, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize>
where
    T: Serialize + DeserializeOwned,
{
    let Some(raw) = &field.default else {
        return Ok(0);
    };
    if !field.kind.is_empty(&serde_json::to_value(&*slot)?) {
        return Ok(0);
    }
    let value = scalar_from_default(field, raw, path)?;
    if pass == Pass::Apply {
        *slot = value;
    }
    Ok(1)
}

fn scalar_from_default<T: DeserializeOwned>(field: &FieldSchema, raw: &str, path: &str) -> Result<T> {
    let value = parse_default(field, raw, path)?;
    serde_json::from_value(value).map_err(|e| invalid(path, raw, e.to_string()))
}

macro_rules! scalar_slot {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl DefaultSlot for $ty {
                fn fill_slot(&mut self, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize> {
                    fill_scalar(self, field, path, pass)
                }

                fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self> {
                    scalar_from_default(field, raw, path)
                }
            }
        )+
    };
}

scalar_slot!(String, char, bool);
scalar_slot!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
scalar_slot!(ObjectId, Decimal128, Value);
scalar_slot!(chrono::DateTime<chrono::Utc>, chrono::NaiveDate);

impl<T: DefaultSlot> DefaultSlot for Option<T> {
    fn fill_slot(&mut self, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize> {
        match self {
            Some(inner) => inner.fill_slot(field, path, pass),
            None => {
                let Some(raw) = &field.default else {
                    return Ok(0);
                };
                let value = T::from_default(field, raw, path)?;
                if pass == Pass::Apply {
                    *self = Some(value);
                }
                Ok(1)
            }
        }
    }

    fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self> {
        T::from_default(field, raw, path).map(Some)
    }

    fn fill_fields(&mut self, fields: &[FieldSchema], prefix: &str, pass: Pass) -> Result<usize> {
        match self {
            Some(inner) => inner.fill_fields(fields, prefix, pass),
            None => Ok(0),
        }
    }
}

impl<T: DefaultSlot> DefaultSlot for Box<T> {
    fn fill_slot(&mut self, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize> {
        (**self).fill_slot(field, path, pass)
    }

    fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self> {
        T::from_default(field, raw, path).map(Box::new)
    }

    fn fill_fields(&mut self, fields: &[FieldSchema], prefix: &str, pass: Pass) -> Result<usize> {
        (**self).fill_fields(fields, prefix, pass)
    }
}

impl<T: DefaultSlot> DefaultSlot for Vec<T> {
    fn fill_slot(&mut self, field: &FieldSchema, path: &str, pass: Pass) -> Result<usize> {
        if self.is_empty() {
            return match &field.default {
                Some(raw) => Err(unsupported_default(field, raw, path)),
                None => Ok(0),
            };
        }
        if !field.is_slice {
            return Ok(0);
        }
        let mut applied = 0;
        for (i, item) in self.iter_mut().enumerate() {
            applied += item.fill_fields(&field.sub_fields, &format!("{path}[{i}]"), pass)?;
        }
        Ok(applied)
    }

    fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self> {
        Err(unsupported_default(field, raw, path))
    }
}

macro_rules! map_slot {
    ($($map:ident),+) => {
        $(
            impl<K, V> DefaultSlot for $map<K, V> {
                fn fill_slot(&mut self, field: &FieldSchema, path: &str, _pass: Pass) -> Result<usize> {
                    match &field.default {
                        Some(raw) if self.is_empty() => Err(unsupported_default(field, raw, path)),
                        _ => Ok(0),
                    }
                }

                fn from_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Self> {
                    Err(unsupported_default(field, raw, path))
                }
            }
        )+
    };
}

map_slot!(HashMap, BTreeMap);

fn apply_fields(fields: &[FieldSchema], parent: &mut Value, prefix: &str) -> Result<usize> {
    let mut applied = 0;

    for field in fields {
        let path = field_path(prefix, &field.wire_name);

        if let Some(raw) = &field.default {
            let current = parent.get(&field.wire_name).unwrap_or(&Value::Null);
            if field.kind.is_empty(current) {
                let value = parse_default(field, raw, &path)?;
                if let Value::Object(map) = parent {
                    map.insert(field.wire_name.clone(), value);
                    applied += 1;
                }
            }
        }

        if field.sub_fields.is_empty() {
            continue;
        }
        let Some(child) = parent.get_mut(&field.wire_name) else {
            continue;
        };
        if field.is_slice {
            if let Value::Array(items) = child {
                for (i, item) in items.iter_mut().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    applied += apply_fields(&field.sub_fields, item, &format!("{path}[{i}]"))?;
                }
            }
        } else if !field.kind.is_empty(child) {
            applied += apply_fields(&field.sub_fields, child, &path)?;
        }
    }

    Ok(applied)
}

fn invalid(path: &str, raw: &str, message: String) -> DocSchemaError {
    DocSchemaError::Default {
        field: path.to_string(),
        value: raw.to_string(),
        message,
    }
}

/// The error for a default on a field whose kind takes none.
#[doc(hidden)]
pub fn unsupported_default(field: &FieldSchema, raw: &str, path: &str) -> DocSchemaError {
    invalid(path, raw, format!("unsupported type {}", field.type_label))
}

fn parse_default(field: &FieldSchema, raw: &str, path: &str) -> Result<Value> {
    match field.kind {
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| invalid(path, raw, "invalid boolean".into())),
        FieldKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| invalid(path, raw, e.to_string())),
        FieldKind::Uint => raw
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .map_err(|e| invalid(path, raw, e.to_string())),
        FieldKind::Float => {
            let parsed = raw.trim().parse::<f64>().map_err(|e| invalid(path, raw, e.to_string()))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| invalid(path, raw, "value is not a finite number".into()))
        }
        _ => Err(unsupported_default(field, raw, path)),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use crate::Model;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, Model)]
    pub struct Settings {
        #[docschema("default=light")]
        pub theme: String,
        #[docschema("default=true")]
        pub notify: bool,
        #[docschema("default=-5")]
        pub offset: i32,
        #[docschema("default=25")]
        pub page_size: u16,
        #[docschema("default=0.75")]
        pub ratio: f64,
        pub label: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, Model)]
    pub struct Step {
        #[docschema("default=pending")]
        pub state: String,
        pub name: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, Model)]
    pub struct Pipeline {
        pub steps: Vec<Option<Step>>,
        pub current: Option<Step>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct BadNumber {
        #[docschema("default=x")]
        pub title: String,
        #[docschema("default=lots")]
        pub count: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Session {
        #[docschema("default=guest")]
        pub role: String,
        #[serde(skip)]
        pub token_cache: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Profile {
        #[docschema("default=guest")]
        pub role: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        pub nickname: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Audit {
        #[docschema("default=system")]
        pub actor: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Entry {
        #[serde(flatten)]
        pub audit: Audit,
        #[docschema("default=3")]
        pub priority: Option<u8>,
        #[docschema("default=300")]
        pub retries: u8,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct BadKind {
        #[docschema("default=now")]
        pub at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_defaults_fill_empty_fields() {
        let schema = parse_schema::<Settings>("settings").unwrap();
        let mut settings = Settings::default();
        apply_defaults(&mut settings, &schema).unwrap();
        assert_eq!(
            settings,
            Settings {
                theme: "light".into(),
                notify: true,
                offset: -5,
                page_size: 25,
                ratio: 0.75,
                label: String::new(),
            }
        );
    }

    #[test]
    fn test_defaults_keep_set_values() {
        let schema = parse_schema::<Settings>("settings").unwrap();
        let mut settings = Settings {
            theme: "dark".into(),
            offset: 3,
            ..Default::default()
        };
        apply_defaults(&mut settings, &schema).unwrap();
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.offset, 3);
        assert!(settings.notify);
    }

    #[test]
    fn test_defaults_recurse_and_skip_null_elements() {
        let schema = parse_schema::<Pipeline>("pipelines").unwrap();
        let mut pipeline = Pipeline {
            steps: vec![
                Some(Step { state: String::new(), name: "build".into() }),
                None,
                Some(Step { state: "done".into(), name: "test".into() }),
            ],
            current: None,
        };
        apply_defaults(&mut pipeline, &schema).unwrap();
        assert_eq!(pipeline.steps[0].as_ref().unwrap().state, "pending");
        assert!(pipeline.steps[1].is_none());
        assert_eq!(pipeline.steps[2].as_ref().unwrap().state, "done");
        assert!(pipeline.current.is_none());
    }

    #[test]
    fn test_unparsable_default_fails_whole_operation() {
        let schema = parse_schema::<BadNumber>("bad").unwrap();
        let mut instance = BadNumber::default();
        let err = apply_defaults(&mut instance, &schema).unwrap_err();
        assert!(matches!(&err, DocSchemaError::Default { field, value, .. } if field == "count" && value == "lots"));
        assert_eq!(instance.title, "");
    }

    #[test]
    fn test_skipped_field_survives() {
        let schema = parse_schema::<Session>("sessions").unwrap();
        let mut session = Session {
            role: String::new(),
            token_cache: "hot".into(),
        };
        apply_defaults(&mut session, &schema).unwrap();
        assert_eq!(session.role, "guest");
        assert_eq!(session.token_cache, "hot");
    }

    #[test]
    fn test_asymmetric_serde_attributes() {
        let schema = parse_schema::<Profile>("profiles").unwrap();
        let mut profile = Profile::default();
        apply_defaults(&mut profile, &schema).unwrap();
        assert_eq!(profile.role, "guest");
        assert_eq!(profile.nickname, "");
    }

    #[test]
    fn test_flattened_and_optional_fields() {
        let schema = parse_schema::<Entry>("entries").unwrap();
        let mut entry = Entry {
            retries: 2,
            ..Default::default()
        };
        apply_defaults(&mut entry, &schema).unwrap();
        assert_eq!(entry.audit.actor, "system");
        assert_eq!(entry.priority, Some(3));
        assert_eq!(entry.retries, 2);
    }

    #[test]
    fn test_out_of_range_default() {
        let schema = parse_schema::<Entry>("entries").unwrap();
        let mut entry = Entry::default();
        let err = apply_defaults(&mut entry, &schema).unwrap_err();
        assert!(matches!(&err, DocSchemaError::Default { field, value, .. } if field == "retries" && value == "300"));
        assert_eq!(entry.audit.actor, "");
        assert_eq!(entry.priority, None);
    }

    #[test]
    fn test_unsupported_kind() {
        let schema = parse_schema::<BadKind>("bad").unwrap();
        let err = apply_defaults(&mut BadKind::default(), &schema).unwrap_err();
        assert!(err.to_string().contains("unsupported type Option<DateTime<Utc>>"));
    }

    #[test]
    fn test_document_variant() {
        let schema = parse_schema::<Step>("steps").unwrap();
        let mut document = json!({ "name": "lint" });
        apply_defaults_document(&mut document, &schema).unwrap();
        assert_eq!(document, json!({ "name": "lint", "state": "pending" }));
    }

    #[test]
    fn test_bool_forms() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true));
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false));
        }
        assert_eq!(parse_bool("yes"), None);
    }
}
