mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::context::Context;
use crate::document::Document;
use crate::error::StoreError;
use crate::index::{IndexInfo, IndexSpec};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The capability set the engine needs from a document database.
///
/// Every call takes a [`Context`] and must fail with `Cancelled` or
/// `DeadlineExceeded` once it has expired. Calls against a collection that
/// does not exist behave as if it were empty.
pub trait DocumentStore: Send + Sync {
    fn list_collections(&self, ctx: &Context) -> StoreResult<Vec<String>>;

    /// Up to `limit` documents in the store's natural order.
    fn sample_documents(&self, ctx: &Context, collection: &str, limit: usize) -> StoreResult<Vec<Document>>;

    /// Exact document count.
    fn count_documents(&self, ctx: &Context, collection: &str) -> StoreResult<u64>;

    /// All indexes, including the implicit primary-key index.
    fn list_indexes(&self, ctx: &Context, collection: &str) -> StoreResult<Vec<IndexInfo>>;

    /// Create an index and return its name. Creating an identical index again
    /// is a no-op; reusing a name with different options is a conflict.
    fn create_index(&self, ctx: &Context, collection: &str, spec: &IndexSpec) -> StoreResult<String>;

    fn drop_index(&self, ctx: &Context, collection: &str, name: &str) -> StoreResult<()>;
}
