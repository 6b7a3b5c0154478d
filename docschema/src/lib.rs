extern crate self as docschema;

pub mod annotation;
pub mod config;
pub mod context;
pub mod defaults;
pub mod discovery;
pub mod document;
pub mod error;
pub mod index;
pub mod migration;
pub mod model;
pub mod registry;
pub mod schema;
pub mod store;
pub mod validation;

pub use config::EngineConfig;
pub use context::Context;
pub use defaults::apply_defaults;
pub use discovery::{discover, DiscoverOptions, DiscoveredCollection, InferredType};
pub use document::{Decimal128, Document, ObjectId, Value};
pub use error::{DocSchemaError, Result, StoreError};
pub use migration::{
    detect_drift, enforce, execute_migration, migrate, plan_migration, MigrateOptions, MigrationPlan,
    MigrationResult,
};
pub use model::Base;
pub use registry::Registry;
pub use schema::{
    AfterCreate, AfterDelete, AfterSave, BeforeCreate, BeforeDelete, BeforeSave, CompoundIndex,
    Configurable, FieldSchema, Indexable, Model, Schema,
};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use validation::{validate, ValidationError, ValidationErrors};

pub use docschema_derive::Model;
