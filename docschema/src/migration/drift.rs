use crate::context::Context;
use crate::error::{DocSchemaError, Result};
use crate::index::{IndexKey, IndexSpec, PRIMARY_INDEX};
use crate::schema::Schema;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Documents sampled when looking for drift.
pub const DRIFT_SAMPLE_SIZE: usize = 100;

/// A stored field the schema does not know about. Never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("drift in {collection}.{field}: {message}")]
pub struct DriftError {
    pub collection: String,
    pub field: String,
    pub message: String,
}

/// Report, once per field, every top-level field found in sampled documents
/// that the schema does not declare. `_id` is always known.
pub fn detect_drift(
    store: &dyn DocumentStore,
    ctx: &Context,
    schema: &Schema,
    sample_size: usize,
) -> Result<Vec<DriftError>> {
    let documents = store
        .sample_documents(ctx, &schema.collection, sample_size)
        .map_err(|e| DocSchemaError::store(format!("drift: collection {}", schema.collection), e))?;

    let known: HashSet<&str> = schema
        .fields
        .iter()
        .map(|f| f.wire_name.as_str())
        .chain(std::iter::once("_id"))
        .collect();

    let mut seen = HashSet::new();
    let mut drifts = Vec::new();
    for doc in &documents {
        for key in doc.keys() {
            if !known.contains(key) && seen.insert(key.to_string()) {
                drifts.push(DriftError {
                    collection: schema.collection.clone(),
                    field: key.to_string(),
                    message: "field exists in database but not in schema".to_string(),
                });
            }
        }
    }
    Ok(drifts)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Skip drift detection.
    #[default]
    Ignore,
    /// Log each drift and carry on.
    Warn,
    /// Fail on the first collection with drift.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforceOptions {
    #[serde(default)]
    pub drift_policy: DriftPolicy,
    #[serde(default = "default_drift_sample_size")]
    pub drift_sample_size: usize,
}

fn default_drift_sample_size() -> usize {
    DRIFT_SAMPLE_SIZE
}

impl Default for EnforceOptions {
    fn default() -> Self {
        Self {
            drift_policy: DriftPolicy::Ignore,
            drift_sample_size: DRIFT_SAMPLE_SIZE,
        }
    }
}

/// Create every missing index the schemas declare, then check for drift.
///
/// Unlike a migration this never drops anything and stops at the first
/// failure. Returns the drift found under [`DriftPolicy::Warn`].
pub fn enforce(
    store: &dyn DocumentStore,
    ctx: &Context,
    schemas: &[Arc<Schema>],
    options: &EnforceOptions,
) -> Result<Vec<DriftError>> {
    let mut warnings = Vec::new();

    for schema in schemas {
        enforce_schema(store, ctx, schema)?;

        if options.drift_policy == DriftPolicy::Ignore {
            continue;
        }
        let drifts = detect_drift(store, ctx, schema, options.drift_sample_size)?;
        if drifts.is_empty() {
            continue;
        }

        match options.drift_policy {
            DriftPolicy::Fatal => {
                let messages: Vec<String> = drifts.iter().map(ToString::to_string).collect();
                return Err(DocSchemaError::Enforcement {
                    collection: schema.collection.clone(),
                    message: format!("schema drift detected: {}", messages.join("; ")),
                });
            }
            _ => {
                for drift in &drifts {
                    log::warn!("{drift}");
                }
                warnings.extend(drifts);
            }
        }
    }

    Ok(warnings)
}

fn enforce_schema(store: &dyn DocumentStore, ctx: &Context, schema: &Schema) -> Result<()> {
    let collection = &schema.collection;
    let existing: HashSet<String> = store
        .list_indexes(ctx, collection)
        .map_err(|e| DocSchemaError::Enforcement {
            collection: collection.clone(),
            message: format!("failed to list indexes: {e}"),
        })?
        .into_iter()
        .map(|i| i.name)
        .filter(|name| name != PRIMARY_INDEX)
        .collect();

    for field in schema.fields.iter().filter(|f| f.is_indexed()) {
        let spec = IndexSpec {
            keys: vec![IndexKey::asc(field.wire_name.clone())],
            unique: field.unique,
        };
        if existing.contains(&spec.name()) {
            continue;
        }
        store.create_index(ctx, collection, &spec).map_err(|e| {
            let kind = if field.unique { "unique index" } else { "index" };
            DocSchemaError::Enforcement {
                collection: collection.clone(),
                message: format!("failed to create {kind} on {}: {e}", field.wire_name),
            }
        })?;
        log::info!("Created index {} on {collection}", spec.name());
    }

    for compound in &schema.compound_indexes {
        let spec = IndexSpec {
            keys: compound.fields.iter().map(IndexKey::asc).collect(),
            unique: compound.unique,
        };
        let name = compound.name();
        if existing.contains(&name) {
            continue;
        }
        store
            .create_index(ctx, collection, &spec)
            .map_err(|e| DocSchemaError::Enforcement {
                collection: collection.clone(),
                message: format!("failed to create compound index {name}: {e}"),
            })?;
        log::info!("Created index {name} on {collection}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::schema::{parse_schema, CompoundIndex, Indexable};
    use crate::store::MemoryStore;
    use crate::Model;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    #[docschema(indexes)]
    pub struct Article {
        #[docschema("unique")]
        pub slug: String,
        #[docschema("index")]
        pub author: String,
        pub status: String,
    }

    impl Indexable for Article {
        fn indexes() -> Vec<CompoundIndex> {
            vec![CompoundIndex::unique(["author", "status"])]
        }
    }

    fn article_schema() -> Arc<Schema> {
        Arc::new(parse_schema::<Article>("articles").unwrap())
    }

    fn index_names(store: &MemoryStore) -> Vec<(String, bool)> {
        store
            .list_indexes(&Context::background(), "articles")
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.unique))
            .collect()
    }

    #[test]
    fn test_detect_drift_reports_each_field_once() {
        let store = MemoryStore::new();
        store
            .insert_many(
                "articles",
                vec![
                    Document::new().with("slug", "a").with("legacy", 1),
                    Document::new().with("slug", "b").with("legacy", 2).with("extra", true),
                ],
            )
            .unwrap();
        let drifts = detect_drift(&store, &Context::background(), &article_schema(), 100).unwrap();
        let fields: Vec<_> = drifts.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["legacy", "extra"]);
        assert_eq!(
            drifts[0].to_string(),
            "drift in articles.legacy: field exists in database but not in schema"
        );
    }

    #[test]
    fn test_enforce_creates_missing_indexes() {
        let store = MemoryStore::new();
        let drifts = enforce(&store, &Context::background(), &[article_schema()], &EnforceOptions::default()).unwrap();
        assert!(drifts.is_empty());
        assert_eq!(
            index_names(&store),
            vec![
                ("_id_".to_string(), true),
                ("slug_1".to_string(), true),
                ("author_1".to_string(), false),
                ("author_1_status_1".to_string(), true),
            ]
        );

        // Second run finds everything in place.
        enforce(&store, &Context::background(), &[article_schema()], &EnforceOptions::default()).unwrap();
        assert_eq!(index_names(&store).len(), 4);
    }

    #[test]
    fn test_enforce_create_failure_is_enforcement_error() {
        let store = MemoryStore::new();
        store
            .insert_many(
                "articles",
                vec![
                    Document::new().with("slug", "same"),
                    Document::new().with("slug", "same"),
                ],
            )
            .unwrap();
        let err = enforce(&store, &Context::background(), &[article_schema()], &EnforceOptions::default())
            .unwrap_err();
        match err {
            DocSchemaError::Enforcement { collection, message } => {
                assert_eq!(collection, "articles");
                assert!(message.starts_with("failed to create unique index on slug:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_drift_policies() {
        let store = MemoryStore::new();
        store
            .insert("articles", Document::new().with("slug", "a").with("legacy", 1))
            .unwrap();
        let ctx = Context::background();

        let warn = EnforceOptions {
            drift_policy: DriftPolicy::Warn,
            ..Default::default()
        };
        let drifts = enforce(&store, &ctx, &[article_schema()], &warn).unwrap();
        assert_eq!(drifts.len(), 1);

        let fatal = EnforceOptions {
            drift_policy: DriftPolicy::Fatal,
            ..Default::default()
        };
        let err = enforce(&store, &ctx, &[article_schema()], &fatal).unwrap_err();
        assert_eq!(
            err.to_string(),
            "enforcement error on articles: schema drift detected: \
             drift in articles.legacy: field exists in database but not in schema"
        );
    }
}
