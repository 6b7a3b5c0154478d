use super::{DocumentStore, StoreResult};
use crate::context::Context;
use crate::document::{Document, ObjectId, Value};
use crate::error::StoreError;
use crate::index::{IndexInfo, IndexKey, IndexSpec, PRIMARY_INDEX};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A [`DocumentStore`] persisted in a single SQLite file.
///
/// Documents are kept as extended JSON. Each created index becomes a real
/// SQLite expression index over `json_extract`, restricted to its collection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = SqliteStore { conn: Mutex::new(conn) };
        store.initialize_tables()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn: Mutex::new(conn) };
        store.initialize_tables()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn initialize_tables(&self) -> StoreResult<()> {
        self.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE (collection, doc_id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);

            CREATE TABLE IF NOT EXISTS index_catalog (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                name TEXT NOT NULL,
                keys_json TEXT NOT NULL,
                is_unique INTEGER NOT NULL,
                sql_name TEXT NOT NULL,
                UNIQUE (collection, name)
            );
            ",
        )?;
        Ok(())
    }

    /// Create an empty collection. A no-op if it already exists.
    pub fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.lock().execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![name],
        )?;
        Ok(())
    }

    /// Insert a document, assigning `_id` when it is missing.
    pub fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Value> {
        if !document.contains_key("_id") {
            document.insert_first("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned().unwrap_or(Value::Null);
        let doc_id = serde_json::to_string(&id.to_json())?;
        let body = serde_json::to_string(&document.to_json())?;

        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![collection],
        )?;
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
            params![collection, doc_id, body],
        )
        .map_err(|e| duplicate_key(e, collection))?;
        Ok(id)
    }

    fn collection_exists(conn: &Connection, collection: &str) -> StoreResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1",
                params![collection],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn duplicate_key(err: rusqlite::Error, collection: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateKey {
                collection: collection.to_string(),
                message: message.clone().unwrap_or_else(|| "duplicate key".to_string()),
            }
        }
        _ => StoreError::Sqlite(err),
    }
}

/// `$."a"."b"` for the dotted field `a.b`.
fn json_path(field: &str) -> String {
    let segments: Vec<String> = field
        .split('.')
        .map(|s| format!("\"{}\"", s.replace('"', "\\\"")))
        .collect();
    format!("$.{}", segments.join("."))
}

fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn index_ddl(sql_name: &str, collection: &str, spec: &IndexSpec) -> String {
    let columns: Vec<String> = spec
        .keys
        .iter()
        .map(|k| {
            let order = match k.direction {
                crate::index::Direction::Ascending => "ASC",
                crate::index::Direction::Descending => "DESC",
            };
            format!("json_extract(body, {}) {order}", sql_literal(&json_path(&k.field)))
        })
        .collect();
    format!(
        "CREATE {}INDEX \"{sql_name}\" ON documents ({}) WHERE collection = {}",
        if spec.unique { "UNIQUE " } else { "" },
        columns.join(", "),
        sql_literal(collection),
    )
}

impl DocumentStore for SqliteStore {
    fn list_collections(&self, ctx: &Context) -> StoreResult<Vec<String>> {
        ctx.check()?;
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn sample_documents(&self, ctx: &Context, collection: &str, limit: usize) -> StoreResult<Vec<Document>> {
        ctx.check()?;
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT body FROM documents WHERE collection = ?1 ORDER BY seq LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![collection, limit], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for row in rows {
            let json: serde_json::Value = serde_json::from_str(&row?)?;
            let doc = Document::from_json(&json).ok_or_else(|| StoreError::Corrupt {
                collection: collection.to_string(),
                message: "stored body is not an object".into(),
            })?;
            docs.push(doc);
        }
        Ok(docs)
    }

    fn count_documents(&self, ctx: &Context, collection: &str) -> StoreResult<u64> {
        ctx.check()?;
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_indexes(&self, ctx: &Context, collection: &str) -> StoreResult<Vec<IndexInfo>> {
        ctx.check()?;
        let conn = self.lock();
        if !Self::collection_exists(&conn, collection)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(
            "SELECT name, keys_json, is_unique FROM index_catalog WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut indexes = vec![IndexInfo {
            name: PRIMARY_INDEX.to_string(),
            keys: vec![IndexKey::asc("_id")],
            unique: true,
        }];
        for row in rows {
            let (name, keys_json, unique) = row?;
            let keys: Vec<IndexKey> = serde_json::from_str(&keys_json)?;
            indexes.push(IndexInfo { name, keys, unique });
        }
        Ok(indexes)
    }

    fn create_index(&self, ctx: &Context, collection: &str, spec: &IndexSpec) -> StoreResult<String> {
        ctx.check()?;
        if spec.keys.is_empty() {
            return Err(StoreError::Invalid("index must have at least one key".into()));
        }
        let name = spec.name();
        let keys_json = serde_json::to_string(&spec.keys)?;

        let mut conn = self.lock();
        let existing = conn
            .query_row(
                "SELECT keys_json, is_unique FROM index_catalog WHERE collection = ?1 AND name = ?2",
                params![collection, name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        if let Some((existing_keys, existing_unique)) = existing {
            if existing_keys == keys_json && existing_unique == spec.unique {
                return Ok(name);
            }
            return Err(StoreError::IndexConflict {
                collection: collection.to_string(),
                message: format!("index {name} already exists with different options"),
            });
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
            params![collection],
        )?;
        tx.execute(
            "INSERT INTO index_catalog (collection, name, keys_json, is_unique, sql_name)
             VALUES (?1, ?2, ?3, ?4, '')",
            params![collection, name, keys_json, spec.unique],
        )?;
        let sql_name = format!("dsx_{}", tx.last_insert_rowid());
        tx.execute(
            "UPDATE index_catalog SET sql_name = ?1 WHERE collection = ?2 AND name = ?3",
            params![sql_name, collection, name],
        )?;
        tx.execute_batch(&index_ddl(&sql_name, collection, spec))
            .map_err(|e| duplicate_key(e, collection))?;
        tx.commit()?;

        log::debug!("Created SQLite index {sql_name} for {collection}.{name}");
        Ok(name)
    }

    fn drop_index(&self, ctx: &Context, collection: &str, name: &str) -> StoreResult<()> {
        ctx.check()?;
        if name == PRIMARY_INDEX {
            return Err(StoreError::Invalid(format!("cannot drop {PRIMARY_INDEX} index")));
        }

        let mut conn = self.lock();
        let sql_name: Option<String> = conn
            .query_row(
                "SELECT sql_name FROM index_catalog WHERE collection = ?1 AND name = ?2",
                params![collection, name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(sql_name) = sql_name else {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        };

        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP INDEX IF EXISTS \"{sql_name}\""))?;
        tx.execute(
            "DELETE FROM index_catalog WHERE collection = ?1 AND name = ?2",
            params![collection, name],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context::background()
    }

    fn email_unique() -> IndexSpec {
        IndexSpec {
            keys: vec![IndexKey::asc("email")],
            unique: true,
        }
    }

    #[test]
    fn test_insert_and_sample() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("users", Document::new().with("name", "Ada")).unwrap();
        store.insert("users", Document::new().with("name", "Grace")).unwrap();

        let docs = store.sample_documents(&ctx(), "users", 10).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get("name"), Some(&Value::from("Ada")));
        assert_eq!(store.count_documents(&ctx(), "users").unwrap(), 2);
        assert_eq!(store.list_collections(&ctx()).unwrap(), vec!["users"]);
    }

    #[test]
    fn test_value_kinds_survive_storage() {
        let store = SqliteStore::open_in_memory().unwrap();
        let when: DateTime<Utc> = "2024-05-01T08:30:00Z".parse().unwrap();
        let doc = Document::new()
            .with("_id", ObjectId::new())
            .with("small", 3)
            .with("big", Value::Int64(9_000_000_000))
            .with("ratio", 1.5)
            .with("flag", true)
            .with("at", when)
            .with("nested", Document::new().with("k", "v"))
            .with("list", vec![Value::from(1), Value::Null])
            .with("blob", Value::Binary(vec![1, 2, 3]))
            .with("none", Value::Null);
        store.insert("kinds", doc.clone()).unwrap();

        let stored = store.sample_documents(&ctx(), "kinds", 1).unwrap();
        assert_eq!(stored, vec![doc]);
    }

    #[test]
    fn test_unique_index_enforced() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.create_index(&ctx(), "users", &email_unique()).unwrap(), "email_1");
        store.insert("users", Document::new().with("email", "a@x.io")).unwrap();
        assert!(matches!(
            store.insert("users", Document::new().with("email", "a@x.io")),
            Err(StoreError::DuplicateKey { .. })
        ));
        // Other collections are not covered by the index.
        store.insert("admins", Document::new().with("email", "a@x.io")).unwrap();
    }

    #[test]
    fn test_unique_index_over_duplicates_fails_cleanly() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("users", Document::new().with("email", "a@x.io")).unwrap();
        store.insert("users", Document::new().with("email", "a@x.io")).unwrap();

        assert!(matches!(
            store.create_index(&ctx(), "users", &email_unique()),
            Err(StoreError::DuplicateKey { .. })
        ));
        let names: Vec<_> = store
            .list_indexes(&ctx(), "users")
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["_id_"]);
    }

    #[test]
    fn test_index_catalog_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_collection("posts").unwrap();
        let spec = IndexSpec {
            keys: vec![IndexKey::asc("author"), IndexKey::desc("created_at")],
            unique: false,
        };
        let name = store.create_index(&ctx(), "posts", &spec).unwrap();
        assert_eq!(name, "author_1_created_at_-1");
        assert_eq!(store.create_index(&ctx(), "posts", &spec).unwrap(), name);

        let indexes = store.list_indexes(&ctx(), "posts").unwrap();
        assert_eq!(indexes[1], IndexInfo { name: name.clone(), keys: spec.keys.clone(), unique: false });

        store.drop_index(&ctx(), "posts", &name).unwrap();
        assert!(matches!(
            store.drop_index(&ctx(), "posts", &name),
            Err(StoreError::IndexNotFound { .. })
        ));
        assert!(store.list_indexes(&ctx(), "ghost").unwrap().is_empty());
    }

    #[test]
    fn test_reopen_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert("users", Document::new().with("email", "a@x.io")).unwrap();
            store.create_index(&ctx(), "users", &email_unique()).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_documents(&ctx(), "users").unwrap(), 1);
        assert_eq!(store.list_indexes(&ctx(), "users").unwrap().len(), 2);
    }
}
