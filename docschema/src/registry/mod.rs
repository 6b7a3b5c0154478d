use crate::error::{DocSchemaError, Result};
use crate::schema::{parse_schema, Model, Schema};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Map of model name to its canonical schema.
///
/// Lookups share a read lock. Registration builds the schema before taking
/// the write lock, so readers only wait for the insert itself.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Schema>>> {
        self.schemas.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Schema>>> {
        self.schemas.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Derive and register the schema for `M`, stored in `collection`.
    pub fn register<M: Model>(&self, collection: &str) -> Result<Arc<Schema>> {
        self.insert(parse_schema::<M>(collection)?)
    }

    /// Register an already-built schema. Fails without side effects if the
    /// model name is taken.
    pub fn insert(&self, schema: Schema) -> Result<Arc<Schema>> {
        let schema = Arc::new(schema);
        {
            let mut schemas = self.write();
            if schemas.contains_key(&schema.model_name) {
                return Err(DocSchemaError::Schema(format!(
                    "model '{}' is already registered",
                    schema.model_name
                )));
            }
            schemas.insert(schema.model_name.clone(), Arc::clone(&schema));
        }
        log::info!(
            "Registered model '{}' for collection '{}' ({} fields)",
            schema.model_name,
            schema.collection,
            schema.fields.len()
        );
        Ok(schema)
    }

    pub fn get(&self, model_name: &str) -> Result<Arc<Schema>> {
        self.read()
            .get(model_name)
            .cloned()
            .ok_or_else(|| DocSchemaError::Schema(format!("model '{model_name}' is not registered")))
    }

    /// All schemas, sorted by model name.
    pub fn get_all(&self) -> Vec<Arc<Schema>> {
        let mut all: Vec<_> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        all
    }

    /// Schemas targeting `collection`.
    pub fn for_collection(&self, collection: &str) -> Vec<Arc<Schema>> {
        self.get_all()
            .into_iter()
            .filter(|s| s.collection == collection)
            .collect()
    }

    pub fn unregister(&self, model_name: &str) -> Option<Arc<Schema>> {
        self.write().remove(model_name)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// The process-wide registry. Empty until the first registration.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}

pub fn register<M: Model>(collection: &str) -> Result<Arc<Schema>> {
    global().register::<M>(collection)
}

pub fn get(model_name: &str) -> Result<Arc<Schema>> {
    global().get(model_name)
}

pub fn get_all() -> Vec<Arc<Schema>> {
    global().get_all()
}
