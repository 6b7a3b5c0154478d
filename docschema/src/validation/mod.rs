use crate::defaults::apply_defaults;
use crate::error::{DocSchemaError, Result};
use crate::schema::{FieldKind, FieldSchema, Model, Schema};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One violation at a field path such as `items[2].name`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// All violations found in one instance, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Violations recorded for an exact field path.
    pub fn for_field<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.0.iter().filter(move |e| e.field == path)
    }

    /// `Ok(())` when there are no violations.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DocSchemaError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Validate a serialized instance against a schema.
///
/// Every violation in the tree is collected. Bounds and enum membership are
/// only checked for non-empty values; immutability is not checked here.
pub fn validate_document(document: &Value, schema: &Schema) -> ValidationErrors {
    let mut errors = Vec::new();
    validate_fields(&schema.fields, document, "", &mut errors);
    ValidationErrors(errors)
}

/// Serialize `instance` and validate it.
pub fn validate<T: Serialize>(instance: &T, schema: &Schema) -> Result<ValidationErrors> {
    let document = serde_json::to_value(instance)?;
    Ok(validate_document(&document, schema))
}

/// Apply defaults, then reject the instance if any violation remains.
/// Used to guard a single create.
pub fn validate_and_prepare<T>(instance: &mut T, schema: &Schema) -> Result<()>
where
    T: Model + Serialize,
{
    apply_defaults(instance, schema)?;
    validate(instance, schema)?.into_result()
}

pub(crate) fn field_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_fields(fields: &[FieldSchema], parent: &Value, prefix: &str, errors: &mut Vec<ValidationError>) {
    for field in fields {
        let path = field_path(prefix, &field.wire_name);
        let value = parent.get(&field.wire_name).unwrap_or(&Value::Null);
        validate_field(field, value, &path, errors);
    }
}

fn validate_field(field: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let mut report = |message: String| {
        errors.push(ValidationError {
            field: path.to_string(),
            message,
        })
    };

    let empty = field.kind.is_empty(value);
    if field.required && empty {
        report("field is required".to_string());
    }

    if !empty {
        if !field.enum_values.is_empty() {
            let rendered = render(value);
            if !field.enum_values.contains(&rendered) {
                report(format!(
                    "value {rendered:?} is not in enum [{}]",
                    field.enum_values.join(" ")
                ));
            }
        }
        if let Some(message) = check_bounds(field, value) {
            report(message);
        }
    }

    if field.sub_fields.is_empty() {
        return;
    }
    if field.is_slice {
        if let Value::Array(items) = value {
            for (i, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                validate_fields(&field.sub_fields, item, &format!("{path}[{i}]"), errors);
            }
        }
    } else if !empty {
        validate_fields(&field.sub_fields, value, path, errors);
    }
}

fn check_bounds(field: &FieldSchema, value: &Value) -> Option<String> {
    if field.min.is_none() && field.max.is_none() {
        return None;
    }
    match (field.kind, value) {
        (FieldKind::Text, Value::String(s)) => {
            let len = s.chars().count() as i128;
            bound_message("length", len as f64, &len.to_string(), field)
        }
        (kind, Value::Number(n)) if kind.is_numeric() => {
            let magnitude = match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => i as f64,
                (None, Some(u)) => u as f64,
                (None, None) => n.as_f64()?,
            };
            bound_message("value", magnitude, &n.to_string(), field)
        }
        _ => None,
    }
}

fn bound_message(subject: &str, magnitude: f64, rendered: &str, field: &FieldSchema) -> Option<String> {
    if let Some(min) = field.min {
        if magnitude < min as f64 {
            return Some(format!("{subject} {rendered} is less than minimum {min}"));
        }
    }
    if let Some(max) = field.max {
        if magnitude > max as f64 {
            return Some(format!("{subject} {rendered} exceeds maximum {max}"));
        }
    }
    None
}

/// Text rendering used for enum membership.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use crate::Model;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Signup {
        #[docschema("unique,required")]
        pub email: String,
        #[docschema("min=13,max=120")]
        pub age: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Member {
        #[docschema("required,enum=admin|member|guest,default=member")]
        pub role: String,
        #[docschema("min=3,max=8")]
        pub handle: String,
        #[docschema("enum=1|2|3")]
        pub tier: u32,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Address {
        #[docschema("required")]
        pub city: String,
        pub zip: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct LineItem {
        #[docschema("required")]
        pub sku: String,
        pub shipping: Option<Address>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Order {
        #[docschema("required")]
        pub items: Vec<Option<LineItem>>,
        pub billing: Option<Address>,
    }

    fn messages(errors: &ValidationErrors) -> Vec<(String, String)> {
        errors
            .iter()
            .map(|e| (e.field.clone(), e.message.clone()))
            .collect()
    }

    #[test]
    fn test_required_and_maximum() {
        let schema = parse_schema::<Signup>("signups").unwrap();
        let errors = validate(&Signup { email: String::new(), age: 200 }, &schema).unwrap();
        assert_eq!(
            messages(&errors),
            vec![
                ("email".to_string(), "field is required".to_string()),
                ("age".to_string(), "value 200 exceeds maximum 120".to_string()),
            ]
        );
    }

    #[test]
    fn test_zero_value_skips_bounds() {
        let schema = parse_schema::<Signup>("signups").unwrap();
        let errors = validate(&Signup { email: "a@b.c".into(), age: 0 }, &schema).unwrap();
        assert!(errors.is_empty());

        let errors = validate(&Signup { email: "a@b.c".into(), age: 12 }, &schema).unwrap();
        assert_eq!(errors.0[0].message, "value 12 is less than minimum 13");
    }

    #[test]
    fn test_enum_and_text_length() {
        let schema = parse_schema::<Member>("members").unwrap();
        let member = Member {
            role: "owner".into(),
            handle: "ab".into(),
            tier: 4,
        };
        let errors = validate(&member, &schema).unwrap();
        assert_eq!(
            messages(&errors),
            vec![
                ("role".to_string(), r#"value "owner" is not in enum [admin member guest]"#.to_string()),
                ("handle".to_string(), "length 2 is less than minimum 3".to_string()),
                ("tier".to_string(), r#"value "4" is not in enum [1 2 3]"#.to_string()),
            ]
        );

        let member = Member {
            role: "guest".into(),
            handle: "abcdefghij".into(),
            tier: 2,
        };
        let errors = validate(&member, &schema).unwrap();
        assert_eq!(
            messages(&errors),
            vec![("handle".to_string(), "length 10 exceeds maximum 8".to_string())]
        );
    }

    #[test]
    fn test_nested_path_inside_sequence() {
        let schema = parse_schema::<Order>("orders").unwrap();
        let order = Order {
            items: vec![Some(LineItem {
                sku: "A-1".into(),
                shipping: Some(Address {
                    city: String::new(),
                    zip: "0150".into(),
                }),
            })],
            billing: None,
        };
        let errors = validate(&order, &schema).unwrap();
        assert_eq!(
            messages(&errors),
            vec![("items[0].shipping.city".to_string(), "field is required".to_string())]
        );
    }

    #[test]
    fn test_null_elements_and_absent_objects_skipped() {
        let schema = parse_schema::<Order>("orders").unwrap();
        let document = json!({
            "items": [null, { "sku": "", "shipping": null }],
            "billing": null,
        });
        let errors = validate_document(&document, &schema);
        assert_eq!(
            messages(&errors),
            vec![("items[1].sku".to_string(), "field is required".to_string())]
        );
    }

    #[test]
    fn test_empty_sequence_only_flags_parent() {
        let schema = parse_schema::<Order>("orders").unwrap();
        let errors = validate_document(&json!({ "items": [] }), &schema);
        assert_eq!(
            messages(&errors),
            vec![("items".to_string(), "field is required".to_string())]
        );
    }

    #[test]
    fn test_validate_and_prepare_applies_defaults_first() {
        let schema = parse_schema::<Member>("members").unwrap();
        let mut member = Member {
            role: String::new(),
            handle: "carol".into(),
            tier: 1,
        };
        validate_and_prepare(&mut member, &schema).unwrap();
        assert_eq!(member.role, "member");

        let mut member = Member {
            role: String::new(),
            handle: "x".into(),
            tier: 1,
        };
        let err = validate_and_prepare(&mut member, &schema).unwrap_err();
        match err {
            DocSchemaError::Validation(errors) => {
                assert_eq!(errors.to_string(), "handle: length 1 is less than minimum 3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
