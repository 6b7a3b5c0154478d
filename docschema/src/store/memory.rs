use super::{DocumentStore, StoreResult};
use crate::context::Context;
use crate::document::{Document, ObjectId, Value};
use crate::error::StoreError;
use crate::index::{IndexInfo, IndexKey, IndexSpec, PRIMARY_INDEX};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Collection {
    name: String,
    documents: Vec<Document>,
    /// Secondary indexes; the primary-key index is implicit.
    indexes: Vec<IndexInfo>,
}

impl Collection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn key_of(doc: &Document, keys: &[IndexKey]) -> Vec<Value> {
        keys.iter()
            .map(|k| doc.get_path(&k.field).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn unique_indexes(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter().filter(|i| i.unique)
    }
}

/// A process-local [`DocumentStore`], mainly for tests and tooling.
///
/// Collections keep insertion order; unique indexes are enforced on insert
/// and when an index is created over existing documents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Vec<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Collection>> {
        self.collections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collection_mut<'a>(collections: &'a mut Vec<Collection>, name: &str) -> &'a mut Collection {
        match collections.iter().position(|c| c.name == name) {
            Some(pos) => &mut collections[pos],
            None => {
                collections.push(Collection::new(name));
                let last = collections.len() - 1;
                &mut collections[last]
            }
        }
    }

    /// Create an empty collection. A no-op if it already exists.
    pub fn create_collection(&self, name: &str) {
        Self::collection_mut(&mut self.lock(), name);
    }

    /// Insert a document, assigning `_id` when it is missing.
    pub fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Value> {
        if !document.contains_key("_id") {
            document.insert_first("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned().unwrap_or(Value::Null);

        let mut collections = self.lock();
        let coll = Self::collection_mut(&mut collections, collection);

        if coll.documents.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                message: format!("index {PRIMARY_INDEX} dup key: {}", id.to_json()),
            });
        }
        for index in coll.unique_indexes() {
            let key = Collection::key_of(&document, &index.keys);
            if coll
                .documents
                .iter()
                .any(|d| Collection::key_of(d, &index.keys) == key)
            {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    message: format!("index {} dup key", index.name),
                });
            }
        }

        coll.documents.push(document);
        Ok(id)
    }

    /// Insert several documents in order, stopping at the first failure.
    pub fn insert_many(&self, collection: &str, documents: impl IntoIterator<Item = Document>) -> StoreResult<Vec<Value>> {
        documents
            .into_iter()
            .map(|doc| self.insert(collection, doc))
            .collect()
    }
}

fn primary_index() -> IndexInfo {
    IndexInfo {
        name: PRIMARY_INDEX.to_string(),
        keys: vec![IndexKey::asc("_id")],
        unique: true,
    }
}

impl DocumentStore for MemoryStore {
    fn list_collections(&self, ctx: &Context) -> StoreResult<Vec<String>> {
        ctx.check()?;
        Ok(self.lock().iter().map(|c| c.name.clone()).collect())
    }

    fn sample_documents(&self, ctx: &Context, collection: &str, limit: usize) -> StoreResult<Vec<Document>> {
        ctx.check()?;
        Ok(self
            .lock()
            .iter()
            .find(|c| c.name == collection)
            .map(|c| c.documents.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn count_documents(&self, ctx: &Context, collection: &str) -> StoreResult<u64> {
        ctx.check()?;
        Ok(self
            .lock()
            .iter()
            .find(|c| c.name == collection)
            .map_or(0, |c| c.documents.len() as u64))
    }

    fn list_indexes(&self, ctx: &Context, collection: &str) -> StoreResult<Vec<IndexInfo>> {
        ctx.check()?;
        Ok(self
            .lock()
            .iter()
            .find(|c| c.name == collection)
            .map(|c| {
                std::iter::once(primary_index())
                    .chain(c.indexes.iter().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create_index(&self, ctx: &Context, collection: &str, spec: &IndexSpec) -> StoreResult<String> {
        ctx.check()?;
        if spec.keys.is_empty() {
            return Err(StoreError::Invalid("index must have at least one key".into()));
        }
        let name = spec.name();

        let mut collections = self.lock();
        let coll = Self::collection_mut(&mut collections, collection);

        if let Some(existing) = coll.indexes.iter().find(|i| i.name == name) {
            if existing.keys == spec.keys && existing.unique == spec.unique {
                return Ok(name);
            }
            return Err(StoreError::IndexConflict {
                collection: collection.to_string(),
                message: format!("index {name} already exists with different options"),
            });
        }

        if spec.unique {
            let mut seen: Vec<Vec<Value>> = Vec::with_capacity(coll.documents.len());
            for doc in &coll.documents {
                let key = Collection::key_of(doc, &spec.keys);
                if seen.contains(&key) {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.to_string(),
                        message: format!("cannot build unique index {name}: duplicate key"),
                    });
                }
                seen.push(key);
            }
        }

        coll.indexes.push(IndexInfo {
            name: name.clone(),
            keys: spec.keys.clone(),
            unique: spec.unique,
        });
        Ok(name)
    }

    fn drop_index(&self, ctx: &Context, collection: &str, name: &str) -> StoreResult<()> {
        ctx.check()?;
        if name == PRIMARY_INDEX {
            return Err(StoreError::Invalid(format!("cannot drop {PRIMARY_INDEX} index")));
        }

        let mut collections = self.lock();
        let coll = collections.iter_mut().find(|c| c.name == collection);
        let pos = coll
            .as_ref()
            .and_then(|c| c.indexes.iter().position(|i| i.name == name));
        match (coll, pos) {
            (Some(coll), Some(pos)) => {
                coll.indexes.remove(pos);
                Ok(())
            }
            _ => Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
        }
    }
}
