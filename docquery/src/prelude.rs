//! Convenient re-exports of commonly used types from docquery.
//!
//! ```ignore
//! use docquery::prelude::*;
//! ```

pub use docquery_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    collection::{Collection, TypedCollection},
    compiler::{FilterCompiler, compile, negate},
    cursor::{BoxCursor, RowCursor, StreamCursor},
    document::{Document, DocumentExt, Row},
    driver::{CursorDriver, HandlerOutcome, StreamPhase},
    error::{StoreError, StoreResult},
    filter::{Expr, FieldOp, Filter, QueryVisitor},
    native::{Condition, NativeQuery},
    page::{Page, PaginationParams},
    query::{CursorRequest, Projection, Query, QueryBuilder, Sort, SortDirection},
    store::{AsDynDocumentStore, DocumentStore, DynDocumentStore, IntoDynDocumentStore},
    update::{Update, UpdateOp},
};
