use super::descriptor::{FieldDescriptor, Model, Shape, TypeDescriptor};
use super::types::{FieldKind, FieldSchema, Schema};
use crate::annotation::{parse_constraints, parse_storage_tag, StorageTag};
use crate::error::{DocSchemaError, Result};
use regex::Regex;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Build the canonical schema for a derived model.
pub fn parse_schema<M: Model>(collection: &str) -> Result<Schema> {
    build_schema(&M::descriptor(), collection)
}

/// Build the canonical schema from a type descriptor.
///
/// Self-referential types terminate: a type already being expanded on the
/// current path is recorded with no sub-fields.
pub fn build_schema(descriptor: &TypeDescriptor, collection: &str) -> Result<Schema> {
    validate_collection_name(collection)?;

    let mut visiting = HashSet::from([descriptor.type_id]);
    let mut fields = Vec::new();
    collect_fields(descriptor, &mut visiting, &mut fields);

    let capabilities = &descriptor.capabilities;
    let compound_indexes = capabilities.compound_indexes.map(|f| f()).unwrap_or_default();
    for index in &compound_indexes {
        if index.fields.is_empty() || index.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(DocSchemaError::Schema(format!(
                "model '{}': compound index must name at least one field and no empty field names",
                descriptor.name
            )));
        }
    }

    let mut hooks = capabilities.hooks.clone();
    hooks.sort();
    hooks.dedup();

    Ok(Schema {
        model_name: descriptor.name.to_string(),
        collection: collection.to_string(),
        fields,
        compound_indexes,
        hooks,
        collection_options: capabilities.collection_options.map(|f| f()),
    })
}

fn validate_collection_name(collection: &str) -> Result<()> {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();

    if collection.is_empty() {
        return Err(DocSchemaError::Schema("collection name must not be empty".into()));
    }
    let valid = NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").ok())
        .as_ref()
        .map_or(true, |re| re.is_match(collection));
    if !valid || collection.starts_with("system.") {
        return Err(DocSchemaError::Schema(format!(
            "invalid collection name '{collection}'"
        )));
    }
    Ok(())
}

fn collect_fields(
    descriptor: &TypeDescriptor,
    visiting: &mut HashSet<TypeId>,
    out: &mut Vec<FieldSchema>,
) {
    for field in &descriptor.fields {
        if !field.public {
            continue;
        }
        let tag = parse_storage_tag(field.storage_tag);
        if tag.is_excluded() {
            continue;
        }

        if field.embedded {
            // Embedded types contribute their fields directly to the parent.
            if let Shape::Object(nested) = (field.shape)() {
                let nested = nested();
                if visiting.insert(nested.type_id) {
                    collect_fields(&nested, visiting, out);
                    visiting.remove(&nested.type_id);
                }
                continue;
            }
        }

        out.push(build_field(field, &tag, visiting));
    }
}

fn build_field(
    field: &FieldDescriptor,
    tag: &StorageTag,
    visiting: &mut HashSet<TypeId>,
) -> FieldSchema {
    let constraints = parse_constraints(field.constraint_tag);
    let wire_name = if tag.name.is_empty() {
        field.name.to_lowercase()
    } else {
        tag.name.clone()
    };

    let (kind, sub_fields, is_slice) = match (field.shape)() {
        Shape::Scalar(kind) => (kind, Vec::new(), false),
        Shape::Object(nested) => (FieldKind::Object, expand(nested, visiting), false),
        Shape::Sequence(element) => match *element {
            Shape::Object(nested) => (FieldKind::Array, expand(nested, visiting), true),
            _ => (FieldKind::Array, Vec::new(), false),
        },
    };

    FieldSchema {
        name: field.name.to_string(),
        wire_name,
        type_label: (field.type_label)(),
        kind,
        required: constraints.required,
        unique: constraints.unique,
        index: constraints.index,
        immutable: constraints.immutable,
        omit_empty: tag.omit_empty,
        default: constraints.default,
        enum_values: constraints.enum_values,
        min: constraints.min,
        max: constraints.max,
        reference: constraints.reference,
        sub_fields,
        is_slice,
    }
}

fn expand(nested: fn() -> TypeDescriptor, visiting: &mut HashSet<TypeId>) -> Vec<FieldSchema> {
    let descriptor = nested();
    if !visiting.insert(descriptor.type_id) {
        return Vec::new();
    }
    let mut fields = Vec::new();
    collect_fields(&descriptor, visiting, &mut fields);
    visiting.remove(&descriptor.type_id);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::model::Base;
    use crate::schema::{BeforeCreate, BeforeSave, CompoundIndex, HookKind, Indexable};
    use crate::Model;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
    pub struct Address {
        #[docschema("required")]
        pub city: String,
        pub zip: String,
    }

    #[allow(dead_code)]
    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct User {
        #[serde(flatten)]
        pub base: Base,
        #[docschema("unique,required")]
        pub email: String,
        #[serde(rename = "displayName")]
        pub name: String,
        #[serde(skip)]
        pub cache: String,
        secret: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub address: Option<Address>,
        pub addresses: Vec<Address>,
        pub tags: Vec<String>,
        pub joined: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct TreeNode {
        pub value: i64,
        pub children: Vec<TreeNode>,
        pub parent: Option<Box<TreeNode>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Left {
        pub label: String,
        pub right: Option<Box<Right>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    pub struct Right {
        pub left: Option<Box<Left>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    #[docschema(indexes, hooks(before_save, before_create))]
    pub struct Post {
        pub author: String,
        pub status: String,
    }

    impl Indexable for Post {
        fn indexes() -> Vec<CompoundIndex> {
            vec![CompoundIndex::new(["author", "status"])]
        }
    }

    impl BeforeCreate for Post {
        fn before_create(&mut self, _ctx: &Context) -> crate::Result<()> {
            Ok(())
        }
    }

    impl BeforeSave for Post {
        fn before_save(&mut self, _ctx: &Context) -> crate::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    #[docschema(indexes)]
    pub struct Broken {
        pub a: String,
    }

    impl Indexable for Broken {
        fn indexes() -> Vec<CompoundIndex> {
            vec![CompoundIndex::new(Vec::<String>::new())]
        }
    }

    fn wire_names(fields: &[FieldSchema]) -> Vec<&str> {
        fields.iter().map(|f| f.wire_name.as_str()).collect()
    }

    #[test]
    fn test_user_schema_fields() {
        let schema = parse_schema::<User>("users").unwrap();
        assert_eq!(schema.model_name, "User");
        assert_eq!(schema.collection, "users");
        assert_eq!(
            wire_names(&schema.fields),
            vec![
                "_id",
                "created_at",
                "updated_at",
                "__v",
                "email",
                "displayName",
                "address",
                "addresses",
                "tags",
                "joined",
            ]
        );

        let email = schema.field("email").unwrap();
        assert!(email.unique && email.required);
        assert_eq!(email.kind, FieldKind::Text);

        let id = schema.field("_id").unwrap();
        assert_eq!(id.kind, FieldKind::ObjectId);
        assert!(id.omit_empty);

        let joined = schema.field("joined").unwrap();
        assert_eq!(joined.kind, FieldKind::Timestamp);
        assert!(joined.sub_fields.is_empty());
        assert_eq!(joined.type_label, "Option<DateTime<Utc>>");
    }

    #[test]
    fn test_nested_object_and_sequence() {
        let schema = parse_schema::<User>("users").unwrap();

        let address = schema.field("address").unwrap();
        assert_eq!(address.kind, FieldKind::Object);
        assert!(!address.is_slice);
        assert_eq!(wire_names(&address.sub_fields), vec!["city", "zip"]);
        assert!(address.sub_fields[0].required);

        let addresses = schema.field("addresses").unwrap();
        assert_eq!(addresses.kind, FieldKind::Array);
        assert!(addresses.is_slice);
        assert_eq!(wire_names(&addresses.sub_fields), vec!["city", "zip"]);

        let tags = schema.field("tags").unwrap();
        assert_eq!(tags.kind, FieldKind::Array);
        assert!(!tags.is_slice);
        assert!(tags.sub_fields.is_empty());
    }

    #[test]
    fn test_self_reference_terminates() {
        let schema = parse_schema::<TreeNode>("nodes").unwrap();
        let children = schema.field("children").unwrap();
        assert!(children.is_slice);
        assert!(children.sub_fields.is_empty());
        let parent = schema.field("parent").unwrap();
        assert_eq!(parent.kind, FieldKind::Object);
        assert!(parent.sub_fields.is_empty());
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let schema = parse_schema::<Left>("lefts").unwrap();
        let right = schema.field("right").unwrap();
        assert_eq!(wire_names(&right.sub_fields), vec!["left"]);
        assert!(right.sub_fields[0].sub_fields.is_empty());
    }

    #[test]
    fn test_capabilities_detected() {
        let schema = parse_schema::<Post>("posts").unwrap();
        assert_eq!(schema.compound_indexes, vec![CompoundIndex::new(["author", "status"])]);
        assert_eq!(schema.hooks, vec![HookKind::BeforeCreate, HookKind::BeforeSave]);
        assert!(schema.has_hook(HookKind::BeforeCreate));
        assert!(!schema.has_hook(HookKind::AfterDelete));
        assert!(schema.collection_options.is_none());
    }

    #[test]
    fn test_malformed_definitions() {
        assert!(matches!(
            parse_schema::<Post>(""),
            Err(DocSchemaError::Schema(_))
        ));
        assert!(matches!(
            parse_schema::<Post>("bad name"),
            Err(DocSchemaError::Schema(_))
        ));
        let err = parse_schema::<Broken>("broken").unwrap_err();
        assert!(err.to_string().contains("compound index"));
    }
}
