//! Storage backend abstraction.
//!
//! A [`StoreBackend`] is the store's native client as seen by this crate: it executes
//! already-compiled [`NativeQuery`]s and [`CursorRequest`]s and hands back cursors,
//! counts and write outcomes. Every method is a pass-through to the store. No retries
//! happen here, and failures surface as
//! [`StoreError::QueryExecution`](crate::error::StoreError::QueryExecution) with the
//! driver's error as the source.
//!
//! The trait is object safe: `Box<dyn StoreBackend>` is itself a backend, which is what
//! [`DynDocumentStore`](crate::store::DynDocumentStore) is built on.
//!
//! # Examples
//!
//! ```ignore
//! use docquery::backend::StoreBackend;
//! use docquery::query::CursorRequest;
//! use bson::doc;
//!
//! backend.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
//! let cursor = backend.open_cursor("users", CursorRequest::match_all()).await?;
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{
    cursor::BoxCursor,
    document::Row,
    error::StoreResult,
    native::NativeQuery,
    query::CursorRequest,
    update::Update,
};

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents that matched the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and support concurrent use from multiple
/// async tasks. Cursors they return are owned and independent of the backend borrow.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Opens a forward-only cursor over the documents matching `request`.
    ///
    /// Sort, skip, limit and projection are applied by the store in that order.
    async fn open_cursor(&self, collection: &str, request: CursorRequest) -> StoreResult<BoxCursor>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64>;

    /// Sums the numeric values of `field` over the documents matching `filter`.
    ///
    /// Non-numeric and missing values are ignored; no matches sum to `0.0`.
    async fn sum(&self, collection: &str, field: &str, filter: &NativeQuery) -> StoreResult<f64>;

    /// Inserts one row and returns its `_id`.
    async fn insert_one(&self, collection: &str, row: Row) -> StoreResult<Bson>;

    /// Inserts rows in order and returns their `_id`s in the same order.
    async fn insert_many(&self, collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`; returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64>;

    /// Deletes every document matching `filter`; returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64>;

    /// Releases backend resources. The default implementation is a no-op.
    async fn shutdown(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn open_cursor(&self, collection: &str, request: CursorRequest) -> StoreResult<BoxCursor> {
        (**self).open_cursor(collection, request).await
    }

    async fn count(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn sum(&self, collection: &str, field: &str, filter: &NativeQuery) -> StoreResult<f64> {
        (**self).sum(collection, field, filter).await
    }

    async fn insert_one(&self, collection: &str, row: Row) -> StoreResult<Bson> {
        (**self).insert_one(collection, row).await
    }

    async fn insert_many(&self, collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
        (**self).insert_many(collection, rows).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        (**self).update_one(collection, filter, update).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        (**self).update_many(collection, filter, update).await
    }

    async fn delete_one(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn shutdown(&self) -> StoreResult<()> {
        (**self).shutdown().await
    }
}

#[async_trait]
impl<B> StoreBackend for Box<B>
where
    B: StoreBackend + ?Sized,
{
    async fn open_cursor(&self, collection: &str, request: CursorRequest) -> StoreResult<BoxCursor> {
        (**self).open_cursor(collection, request).await
    }

    async fn count(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn sum(&self, collection: &str, field: &str, filter: &NativeQuery) -> StoreResult<f64> {
        (**self).sum(collection, field, filter).await
    }

    async fn insert_one(&self, collection: &str, row: Row) -> StoreResult<Bson> {
        (**self).insert_one(collection, row).await
    }

    async fn insert_many(&self, collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
        (**self).insert_many(collection, rows).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        (**self).update_one(collection, filter, update).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        (**self).update_many(collection, filter, update).await
    }

    async fn delete_one(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn shutdown(&self) -> StoreResult<()> {
        (**self).shutdown().await
    }
}

/// Asynchronous factory for a backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
