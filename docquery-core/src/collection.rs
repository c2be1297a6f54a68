//! Collection types for document store operations.
//!
//! A collection is a named handle on a backend. It compiles every filter before it
//! talks to the backend, so a malformed [`Expr`] surfaces as
//! [`StoreError::Compile`](crate::error::StoreError::Compile) without any I/O.
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped collection working on raw [`Row`]s
//! - [`TypedCollection`] - Collection mapping rows to a [`Document`] type through serde
//!
//! Both work over any [`StoreBackend`], including `Box<dyn StoreBackend>`, so the
//! dynamically dispatched store needs no separate collection types.
//!
//! # Example
//!
//! ```ignore
//! use docquery::prelude::*;
//!
//! let users = store.typed_collection::<User>();
//! users.insert_one(&User { name: "Alice".to_string(), age: 30 }).await?;
//!
//! users
//!     .for_each_await(Query::builder().filter(Filter::gte("age", 18)).build(), |user| async move {
//!         notify(&user).await.map_err(StoreError::callback)
//!     })
//!     .await?;
//! ```

use bson::Bson;
use futures::future::{Either, Future, ready};
use std::marker::PhantomData;

use crate::{
    backend::{StoreBackend, UpdateOutcome},
    compiler::compile,
    cursor::BoxCursor,
    document::{Document, DocumentExt, Row},
    driver::CursorDriver,
    error::StoreResult,
    filter::Expr,
    page::{Page, PaginationParams},
    query::Query,
    update::Update,
};

/// An untyped collection with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a cursor for `query` and wraps it in a [`CursorDriver`].
    ///
    /// Use this when the driver's state is of interest after the run; otherwise
    /// [`for_each_await`](Self::for_each_await) and [`for_each_sync`](Self::for_each_sync)
    /// are shorter.
    ///
    /// # Errors
    ///
    /// Returns a compile error for a malformed filter, or the backend's error if the
    /// cursor cannot be opened.
    pub async fn cursor(&self, query: &Query) -> StoreResult<CursorDriver<BoxCursor>> {
        let request = query.compile()?;
        let cursor = self.backend.open_cursor(&self.name, request).await?;

        Ok(CursorDriver::new(cursor))
    }

    /// Streams every matching row through an async handler.
    ///
    /// Each handler future is awaited before the next row is pulled. The first error
    /// from the handler or the cursor stops the stream, closes the cursor and is
    /// returned as raised.
    pub async fn for_each_await<F, Fut>(&self, query: &Query, handler: F) -> StoreResult<()>
    where
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        self.cursor(query).await?.for_each_await(handler).await
    }

    /// Streams every matching row through a synchronous handler.
    pub async fn for_each_sync<F>(&self, query: &Query, handler: F) -> StoreResult<()>
    where
        F: FnMut(Row) -> StoreResult<()>,
    {
        self.cursor(query).await?.for_each_sync(handler).await
    }

    /// Collects every matching row.
    ///
    /// # Returns
    ///
    /// The rows in cursor order, after sort, skip, limit and projection.
    pub async fn find(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let mut rows = Vec::new();

        self.for_each_sync(query, |row| {
            rows.push(row);
            Ok(())
        })
        .await?;

        Ok(rows)
    }

    /// Returns the first matching row, if any. Any limit on `query` is replaced by 1.
    pub async fn find_one(&self, query: &Query) -> StoreResult<Option<Row>> {
        let query = Query { limit: Some(1), ..query.clone() };

        Ok(self.find(&query).await?.into_iter().next())
    }

    /// Returns one page of results together with the total match count.
    ///
    /// The page window replaces any offset or limit set on `query`.
    pub async fn find_page(&self, query: &Query, params: &PaginationParams) -> StoreResult<Page<Row>> {
        let window = Query {
            offset: Some(params.offset()),
            limit: Some(params.per_page),
            ..query.clone()
        };

        let count = self.count(query.filter.as_ref()).await?;
        let items = self.find(&window).await?;

        Ok(Page::from_window(items, count, params))
    }

    /// Counts the rows matching `filter`. `None` counts every row.
    pub async fn count(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        let filter = compile(filter)?;

        self.backend.count(&self.name, &filter).await
    }

    /// Sums the numeric values of `field` over the rows matching `filter`.
    ///
    /// No matching rows sum to `0.0`.
    pub async fn sum(&self, field: &str, filter: Option<&Expr>) -> StoreResult<f64> {
        let filter = compile(filter)?;

        self.backend.sum(&self.name, field, &filter).await
    }

    /// Inserts a row and returns its `_id`.
    pub async fn insert_one(&self, row: Row) -> StoreResult<Bson> {
        self.backend.insert_one(&self.name, row).await
    }

    /// Inserts rows in order and returns their `_id`s.
    pub async fn insert_many(&self, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
        self.backend.insert_many(&self.name, rows).await
    }

    /// Applies `update` to the first row matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a compile error for a malformed filter or an empty update before the
    /// backend is called.
    pub async fn update_one(&self, filter: Option<&Expr>, update: &Update) -> StoreResult<UpdateOutcome> {
        let filter = compile(filter)?;
        update.to_document()?;

        self.backend.update_one(&self.name, &filter, update).await
    }

    /// Applies `update` to every row matching `filter`.
    pub async fn update_many(&self, filter: Option<&Expr>, update: &Update) -> StoreResult<UpdateOutcome> {
        let filter = compile(filter)?;
        update.to_document()?;

        self.backend.update_many(&self.name, &filter, update).await
    }

    /// Deletes the first row matching `filter`; returns the number deleted.
    pub async fn delete_one(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        let filter = compile(filter)?;

        self.backend.delete_one(&self.name, &filter).await
    }

    /// Deletes every row matching `filter`; returns the number deleted.
    pub async fn delete_many(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        let filter = compile(filter)?;

        self.backend.delete_many(&self.name, &filter).await
    }
}

/// A collection whose rows are mapped to and from `D`.
///
/// A row that fails to decode is a
/// [`StoreError::Serialization`](crate::error::StoreError::Serialization) and aborts a
/// stream exactly like a failing handler.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Converts this typed collection to a different document type.
    ///
    /// This method allows switching between different document types for the same collection.
    pub fn with_type<T: Document>(&self) -> TypedCollection<'a, B, T> {
        TypedCollection::new(self.inner.name.clone(), self.inner.backend)
    }

    /// The untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Streams every matching document through an async handler.
    ///
    /// See [`Collection::for_each_await`]. Decoding happens per row, right before the
    /// handler is called.
    pub async fn for_each_await<F, Fut>(&self, query: &Query, mut handler: F) -> StoreResult<()>
    where
        F: FnMut(D) -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        self.inner
            .for_each_await(query, move |row| match D::from_row(row) {
                Ok(document) => Either::Left(handler(document)),
                Err(err) => Either::Right(ready(Err(err))),
            })
            .await
    }

    /// Streams every matching document through a synchronous handler.
    pub async fn for_each_sync<F>(&self, query: &Query, mut handler: F) -> StoreResult<()>
    where
        F: FnMut(D) -> StoreResult<()>,
    {
        self.inner
            .for_each_sync(query, move |row| handler(D::from_row(row)?))
            .await
    }

    /// Collects every matching document.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) if the query fails or any row
    /// does not decode.
    pub async fn find(&self, query: &Query) -> StoreResult<Vec<D>> {
        let mut documents = Vec::new();

        self.for_each_sync(query, |document| {
            documents.push(document);
            Ok(())
        })
        .await?;

        Ok(documents)
    }

    pub async fn find_one(&self, query: &Query) -> StoreResult<Option<D>> {
        self.inner
            .find_one(query)
            .await?
            .map(D::from_row)
            .transpose()
    }

    pub async fn find_page(&self, query: &Query, params: &PaginationParams) -> StoreResult<Page<D>> {
        let page = self.inner.find_page(query, params).await?;

        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(D::from_row)
                .collect::<StoreResult<Vec<D>>>()?,
            count: page.count,
            next_page: page.next_page,
            previous_page: page.previous_page,
        })
    }

    pub async fn count(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    pub async fn sum(&self, field: &str, filter: Option<&Expr>) -> StoreResult<f64> {
        self.inner.sum(field, filter).await
    }

    /// Serializes and inserts a document, returning its `_id`.
    pub async fn insert_one(&self, document: &D) -> StoreResult<Bson> {
        self.inner.insert_one(document.to_row()?).await
    }

    /// Serializes and inserts documents in order, returning their `_id`s.
    pub async fn insert_many(&self, documents: &[D]) -> StoreResult<Vec<Bson>> {
        let rows = documents
            .iter()
            .map(DocumentExt::to_row)
            .collect::<StoreResult<Vec<Row>>>()?;

        self.inner.insert_many(rows).await
    }

    pub async fn update_one(&self, filter: Option<&Expr>, update: &Update) -> StoreResult<UpdateOutcome> {
        self.inner.update_one(filter, update).await
    }

    pub async fn update_many(&self, filter: Option<&Expr>, update: &Update) -> StoreResult<UpdateOutcome> {
        self.inner.update_many(filter, update).await
    }

    pub async fn delete_one(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        self.inner.delete_one(filter).await
    }

    pub async fn delete_many(&self, filter: Option<&Expr>) -> StoreResult<u64> {
        self.inner.delete_many(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cursor::StreamCursor, error::StoreError, filter::Filter, native::NativeQuery, query::CursorRequest};
    use async_trait::async_trait;
    use bson::doc;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        rows: Vec<Row>,
        calls: Mutex<Vec<String>>,
        requests: Mutex<Vec<CursorRequest>>,
    }

    impl RecordingBackend {
        fn with_rows(rows: Vec<Row>) -> Self {
            Self { rows, ..Default::default() }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn open_cursor(&self, _collection: &str, request: CursorRequest) -> StoreResult<BoxCursor> {
            self.record("open_cursor");
            self.requests.lock().unwrap().push(request);
            Ok(Box::new(StreamCursor::from_rows(self.rows.clone())))
        }

        async fn count(&self, _collection: &str, _filter: &NativeQuery) -> StoreResult<u64> {
            self.record("count");
            Ok(self.rows.len() as u64)
        }

        async fn sum(&self, _collection: &str, _field: &str, _filter: &NativeQuery) -> StoreResult<f64> {
            self.record("sum");
            Ok(0.0)
        }

        async fn insert_one(&self, _collection: &str, _row: Row) -> StoreResult<Bson> {
            self.record("insert_one");
            Ok(Bson::Int32(1))
        }

        async fn insert_many(&self, _collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
            self.record("insert_many");
            Ok((0..rows.len() as i32).map(Bson::Int32).collect())
        }

        async fn update_one(
            &self,
            _collection: &str,
            _filter: &NativeQuery,
            _update: &Update,
        ) -> StoreResult<UpdateOutcome> {
            self.record("update_one");
            Ok(UpdateOutcome::default())
        }

        async fn update_many(
            &self,
            _collection: &str,
            _filter: &NativeQuery,
            _update: &Update,
        ) -> StoreResult<UpdateOutcome> {
            self.record("update_many");
            Ok(UpdateOutcome::default())
        }

        async fn delete_one(&self, _collection: &str, _filter: &NativeQuery) -> StoreResult<u64> {
            self.record("delete_one");
            Ok(0)
        }

        async fn delete_many(&self, _collection: &str, _filter: &NativeQuery) -> StoreResult<u64> {
            self.record("delete_many");
            Ok(0)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Player {
        name: String,
        score: i32,
    }

    impl Document for Player {
        fn collection_name() -> &'static str {
            "players"
        }
    }

    fn bad_filter() -> Expr {
        Expr::Or(vec![])
    }

    #[tokio::test]
    async fn malformed_filters_never_reach_the_backend() {
        let backend = RecordingBackend::default();
        let players = Collection::new("players".to_string(), &backend);
        let query = Query::builder().filter(bad_filter()).build();

        assert!(players.find(&query).await.unwrap_err().is_compile());
        assert!(players.count(Some(&bad_filter())).await.unwrap_err().is_compile());
        assert!(players.sum("score", Some(&bad_filter())).await.unwrap_err().is_compile());
        assert!(players.delete_many(Some(&Filter::eq("", 1))).await.unwrap_err().is_compile());
        assert!(
            players
                .update_many(None, &Update::new())
                .await
                .unwrap_err()
                .is_compile()
        );

        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn find_one_limits_the_request_to_one_row() {
        let backend = RecordingBackend::with_rows(vec![doc! { "n": 1 }]);
        let players = Collection::new("players".to_string(), &backend);

        let row = players
            .find_one(&Query::builder().limit(50).build())
            .await
            .unwrap();

        assert_eq!(row, Some(doc! { "n": 1 }));
        assert_eq!(backend.requests.lock().unwrap()[0].limit, Some(1));
    }

    #[tokio::test]
    async fn find_page_windows_the_query() {
        let backend = RecordingBackend::with_rows(vec![doc! { "n": 1 }, doc! { "n": 2 }]);
        let players = Collection::new("players".to_string(), &backend);

        let page = players
            .find_page(&Query::new(), &PaginationParams::new(2, 2))
            .await
            .unwrap();

        let request = backend.requests.lock().unwrap()[0].clone();
        assert_eq!((request.skip, request.limit), (Some(2), Some(2)));
        assert_eq!(page.count, 2);
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(backend.calls(), vec!["count", "open_cursor"]);
    }

    #[tokio::test]
    async fn typed_streams_decode_each_row() {
        let backend = RecordingBackend::with_rows(vec![
            doc! { "name": "ada", "score": 3 },
            doc! { "name": "bob", "score": 5 },
        ]);
        let players = TypedCollection::<_, Player>::new("players".to_string(), &backend);
        let mut seen = Vec::new();

        players
            .for_each_await(&Query::new(), |player| {
                seen.push(player.name);
                async { Ok::<_, StoreError>(()) }
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["ada", "bob"]);
    }

    #[tokio::test]
    async fn undecodable_rows_abort_the_stream() {
        let backend = RecordingBackend::with_rows(vec![
            doc! { "name": "ada", "score": 3 },
            doc! { "name": "bob", "score": "lots" },
            doc! { "name": "cy", "score": 7 },
        ]);
        let players = TypedCollection::<_, Player>::new("players".to_string(), &backend);
        let mut seen = Vec::new();

        let err = players
            .for_each_sync(&Query::new(), |player| {
                seen.push(player.name);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Serialization(_)), "unexpected error: {err:?}");
        assert_eq!(seen, vec!["ada"]);
    }

    #[tokio::test]
    async fn typed_inserts_serialize_documents() {
        let backend = RecordingBackend::default();
        let players = TypedCollection::<_, Player>::new("players".to_string(), &backend);

        let ids = players
            .insert_many(&[
                Player { name: "ada".to_string(), score: 1 },
                Player { name: "bob".to_string(), score: 2 },
            ])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(players.with_type::<Player>().name(), "players");
    }
}
