//! Failures raised while executing a request against the in-memory store.
//!
//! These never reach callers directly: the backend wraps them in
//! [`StoreError::QueryExecution`](docquery_core::error::StoreError::QueryExecution),
//! where they remain available as the error source.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryStoreError {
    #[error("invalid $regex pattern `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("cannot apply $inc to non-numeric field `{0}`")]
    NonNumericField(String),
    #[error("$inc amount for field `{0}` is not a number")]
    NonNumericAmount(String),
    #[error("$inc on field `{0}` overflows a 64-bit integer")]
    IntegerOverflow(String),
    #[error("cannot create field `{0}`: a parent path holds a non-document value")]
    PathConflict(String),
    #[error("the `_id` field is immutable")]
    ImmutableId,
}
