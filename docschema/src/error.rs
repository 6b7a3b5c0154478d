use crate::validation::ValidationErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocSchemaError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("cannot apply default {value:?} to field {field}: {message}")]
    Default {
        field: String,
        value: String,
        message: String,
    },

    #[error("enforcement error on {collection}: {message}")]
    Enforcement { collection: String, message: String },

    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocSchemaError {
    /// Wrap a store failure with a component-identifying prefix.
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        DocSchemaError::Store {
            context: context.into(),
            source,
        }
    }

    /// True when the underlying cause is a cancelled or expired [`crate::Context`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DocSchemaError::Store { source, .. } if source.is_cancellation())
    }
}

impl From<ValidationErrors> for DocSchemaError {
    fn from(errors: ValidationErrors) -> Self {
        DocSchemaError::Validation(errors)
    }
}

/// Failures reported by a [`crate::store::DocumentStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("index not found: {collection}.{name}")]
    IndexNotFound { collection: String, name: String },

    #[error("duplicate key error on {collection}: {message}")]
    DuplicateKey { collection: String, message: String },

    #[error("index conflict on {collection}: {message}")]
    IndexConflict { collection: String, message: String },

    #[error("invalid operation: {0}")]
    Invalid(String),

    #[error("corrupt document in {collection}: {message}")]
    Corrupt { collection: String, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, DocSchemaError>;
