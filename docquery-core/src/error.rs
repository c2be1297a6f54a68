//! Error types and result types for query compilation, execution and streaming.
//!
//! Every fallible operation in this crate returns a [`StoreResult<T>`]. Errors are
//! never retried and never re-wrapped on their way out: a backend failure keeps the
//! driver's original error as its [`source`](std::error::Error::source), and a row
//! handler's failure is handed back to the caller exactly as the handler produced it.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A boxed, thread-safe error used to carry foreign causes unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when compiling, executing or
/// streaming a query.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The filter tree or update descriptor is malformed (unknown tag, empty
    /// composite, empty field name, update without fields).
    ///
    /// Raised before any store interaction happens and never worth retrying.
    #[error("Compile error: {0}")]
    Compile(String),
    /// The underlying store failed while executing a request.
    #[error("Query execution error: {0}")]
    QueryExecution(#[source] BoxError),
    /// A per-row stream handler failed.
    #[error("Stream callback error: {0}")]
    Callback(#[source] BoxError),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or configuration.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A document with the given `_id` already exists in the collection.
    /// The first argument is the document id, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A streaming driver was asked to run after its cursor was already consumed.
    #[error("Cursor already consumed")]
    CursorConsumed,
}

impl StoreError {
    /// Wraps a backend failure, keeping the original error as the source.
    pub fn execution(err: impl Into<BoxError>) -> Self {
        StoreError::QueryExecution(err.into())
    }

    /// Wraps a failure raised by a per-row stream handler.
    pub fn callback(err: impl Into<BoxError>) -> Self {
        StoreError::Callback(err.into())
    }

    /// Returns `true` for errors raised before the store was contacted.
    pub fn is_compile(&self) -> bool {
        matches!(self, StoreError::Compile(_))
    }
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
