//! In-memory storage implementation for document stores.
//!
//! Collections are vectors of rows kept in insertion order behind an async-safe
//! read-write lock. Queries scan the whole collection.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docquery_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    cursor::{BoxCursor, StreamCursor},
    document::Row,
    error::{StoreError, StoreResult},
    native::NativeQuery,
    query::CursorRequest,
    update::Update,
};

use crate::{
    apply::{apply_update, numeric, project, sort_rows},
    evaluator::{DocumentEvaluator, lookup},
};

type StoreMap = HashMap<String, Vec<Row>>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Cursors
///
/// A cursor iterates a snapshot taken when it was opened: writes made while a stream
/// is running are not observed by it.
///
/// # Example
///
/// ```ignore
/// use docquery_memory::InMemoryStore;
/// use docquery::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> rows in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docquery_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    async fn update(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
        multi: bool,
    ) -> StoreResult<UpdateOutcome> {
        update.to_document()?;
        let evaluator = DocumentEvaluator::new(filter)?;

        let mut store = self.store.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let mut changes = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !evaluator.matches(row) {
                continue;
            }

            changes.push((index, apply_update(row, update)?));

            if !multi {
                break;
            }
        }

        let mut outcome = UpdateOutcome { matched: changes.len() as u64, modified: 0 };
        for (index, updated) in changes {
            if rows[index] != updated {
                rows[index] = updated;
                outcome.modified += 1;
            }
        }

        debug!(collection, matched = outcome.matched, modified = outcome.modified, "updated rows");

        Ok(outcome)
    }

    async fn delete(&self, collection: &str, filter: &NativeQuery, multi: bool) -> StoreResult<u64> {
        let evaluator = DocumentEvaluator::new(filter)?;

        let mut store = self.store.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = rows.len();
        if multi {
            rows.retain(|row| !evaluator.matches(row));
        } else if let Some(index) = rows.iter().position(|row| evaluator.matches(row)) {
            rows.remove(index);
        }

        let deleted = (before - rows.len()) as u64;
        debug!(collection, deleted, "deleted rows");

        Ok(deleted)
    }
}

/// Puts an `_id` first in the row, generating an `ObjectId` when absent.
fn with_id(row: Row) -> (Bson, Row) {
    if let Some(id) = row.get("_id") {
        return (id.clone(), row);
    }

    let id = Bson::ObjectId(ObjectId::new());
    let mut identified = Row::new();
    identified.insert("_id", id.clone());
    for (key, value) in row {
        identified.insert(key, value);
    }

    (id, identified)
}

fn insert_row(rows: &mut Vec<Row>, collection: &str, row: Row) -> StoreResult<Bson> {
    let (id, row) = with_id(row);

    if rows.iter().any(|existing| existing.get("_id") == Some(&id)) {
        return Err(StoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
    }

    rows.push(row);

    Ok(id)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn open_cursor(&self, collection: &str, request: CursorRequest) -> StoreResult<BoxCursor> {
        let evaluator = DocumentEvaluator::new(&request.filter)?;
        let store = self.store.read().await;

        let snapshot = match store.get(collection) {
            Some(rows) => {
                let mut matched = evaluator.filter_rows(rows);

                if let Some(sort) = &request.sort {
                    sort_rows(&mut matched, sort);
                }

                matched
                    .into_iter()
                    .skip(request.skip.unwrap_or(0) as usize)
                    .take(request.limit.map_or(usize::MAX, |limit| limit as usize))
                    .map(|row| match &request.projection {
                        Some(projection) => project(row, projection),
                        None => row.clone(),
                    })
                    .collect::<Vec<_>>()
            }
            None => Vec::new(),
        };

        debug!(collection, rows = snapshot.len(), "opened cursor");

        Ok(Box::new(StreamCursor::from_rows(snapshot)))
    }

    async fn count(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        let evaluator = DocumentEvaluator::new(filter)?;
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map_or(0, |rows| rows.iter().filter(|row| evaluator.matches(row)).count()) as u64)
    }

    /// Values reached through an array are skipped, as an aggregation `$sum` over a
    /// field path ignores array operands.
    async fn sum(&self, collection: &str, field: &str, filter: &NativeQuery) -> StoreResult<f64> {
        let evaluator = DocumentEvaluator::new(filter)?;
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|rows| {
                evaluator
                    .filter_rows(rows)
                    .into_iter()
                    .filter_map(|row| lookup(row, field).and_then(numeric))
                    .sum::<f64>()
            })
            .unwrap_or(0.0))
    }

    async fn insert_one(&self, collection: &str, row: Row) -> StoreResult<Bson> {
        let mut store = self.store.write().await;
        let rows = store.entry(collection.to_string()).or_default();

        let id = insert_row(rows, collection, row)?;
        debug!(collection, inserted = 1, "inserted rows");

        Ok(id)
    }

    async fn insert_many(&self, collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
        let mut store = self.store.write().await;
        let existing = store.entry(collection.to_string()).or_default();

        let ids = rows
            .into_iter()
            .map(|row| insert_row(existing, collection, row))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(collection, inserted = ids.len(), "inserted rows");

        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        self.update(collection, filter, update, false).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        self.update(collection, filter, update, true).await
    }

    async fn delete_one(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        self.delete(collection, filter, false).await
    }

    async fn delete_many(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        self.delete(collection, filter, true).await
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docquery_memory::InMemoryStore;
/// use docquery::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docquery_core::{
        compiler::compile,
        cursor::RowCursor,
        filter::{Expr, Filter},
        query::{Projection, Query, SortDirection},
    };
    use pretty_assertions::assert_eq;

    fn native(filter: Expr) -> NativeQuery {
        compile(Some(&filter)).unwrap()
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "users",
                vec![
                    doc! { "_id": 1, "name": "ada", "age": 36, "visits": 2 },
                    doc! { "_id": 2, "name": "bob", "age": 17 },
                    doc! { "_id": 3, "name": "cy", "age": 52, "visits": 5.5 },
                    doc! { "_id": 4, "name": "dee", "age": null },
                ],
            )
            .await
            .unwrap();
        store
    }

    async fn drain(mut cursor: BoxCursor) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row().await {
            rows.push(row.unwrap());
        }
        rows
    }

    #[tokio::test]
    async fn cursors_apply_filter_sort_window_and_projection() {
        let store = seeded().await;
        let request = Query::builder()
            .filter(Filter::exists("age"))
            .sort("age", SortDirection::Desc)
            .offset(1)
            .limit(2)
            .projection(Projection::include(["name"]))
            .build()
            .compile()
            .unwrap();

        let rows = drain(store.open_cursor("users", request).await.unwrap()).await;

        assert_eq!(
            rows,
            vec![doc! { "_id": 1, "name": "ada" }, doc! { "_id": 2, "name": "bob" }]
        );
    }

    #[tokio::test]
    async fn unknown_collections_are_empty() {
        let store = InMemoryStore::new();

        let rows = drain(store.open_cursor("nothing", CursorRequest::match_all()).await.unwrap()).await;

        assert!(rows.is_empty());
        assert_eq!(store.count("nothing", &NativeQuery::MatchAll).await.unwrap(), 0);
        assert_eq!(store.sum("nothing", "n", &NativeQuery::MatchAll).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn counts_and_sums_matching_rows() {
        let store = seeded().await;

        assert_eq!(store.count("users", &native(Filter::gte("age", 18))).await.unwrap(), 2);
        assert_eq!(store.sum("users", "visits", &NativeQuery::MatchAll).await.unwrap(), 7.5);
        assert_eq!(
            store.sum("users", "visits", &native(Filter::eq("name", "nobody"))).await.unwrap(),
            0.0
        );
    }

    #[tokio::test]
    async fn sums_skip_values_behind_arrays() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "carts",
                vec![
                    doc! { "total": { "net": 4 }, "items": [{ "price": 10 }, { "price": 20 }] },
                    doc! { "total": { "net": 6.5 }, "items": { "price": 1 } },
                    doc! { "total": [1, 2], "items": [] },
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.sum("carts", "items.price", &NativeQuery::MatchAll).await.unwrap(), 1.0);
        assert_eq!(store.sum("carts", "total.net", &NativeQuery::MatchAll).await.unwrap(), 10.5);
        assert_eq!(store.sum("carts", "total", &NativeQuery::MatchAll).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn int64_overflow_rejects_the_whole_update() {
        let store = InMemoryStore::new();
        store
            .insert_many("counters", vec![doc! { "_id": 1, "n": 1_i64 }, doc! { "_id": 2, "n": i64::MAX }])
            .await
            .unwrap();

        let err = store
            .update_many("counters", &NativeQuery::MatchAll, &Update::new().inc("n", 1_i64))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::QueryExecution(_)));
        assert_eq!(store.sum("counters", "n", &native(Filter::eq("_id", 1))).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn inserts_assign_ids_and_reject_duplicates() {
        let store = seeded().await;

        let id = store.insert_one("users", doc! { "name": "eve" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let err = store.insert_one("users", doc! { "_id": 2, "name": "bob" }).await.unwrap_err();
        assert!(matches!(err, StoreError::DocumentAlreadyExists(_, ref collection) if collection == "users"));
    }

    #[tokio::test]
    async fn updates_report_matched_and_modified() {
        let store = seeded().await;

        let outcome = store
            .update_many("users", &native(Filter::lt("age", 40)), &Update::new().set("minor", false))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 2, modified: 2 });

        let outcome = store
            .update_one("users", &native(Filter::eq("_id", 1)), &Update::new().set("minor", false))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        store
            .update_one("users", &native(Filter::eq("_id", 1)), &Update::new().inc("visits", 1))
            .await
            .unwrap();
        assert_eq!(store.sum("users", "visits", &native(Filter::eq("_id", 1))).await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn failed_updates_leave_rows_untouched() {
        let store = seeded().await;

        let err = store
            .update_many("users", &NativeQuery::MatchAll, &Update::new().inc("name", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::QueryExecution(_)));
        assert_eq!(store.count("users", &native(Filter::eq("name", "ada"))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deletes_one_or_many() {
        let store = seeded().await;

        assert_eq!(store.delete_one("users", &native(Filter::gt("age", 0))).await.unwrap(), 1);
        assert_eq!(store.count("users", &native(Filter::eq("_id", 1))).await.unwrap(), 0);
        assert_eq!(store.delete_many("users", &NativeQuery::MatchAll).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::builder().build().await.unwrap();
        let clone = store.clone();

        clone.insert_one("users", doc! { "name": "ada" }).await.unwrap();

        assert_eq!(store.count("users", &NativeQuery::MatchAll).await.unwrap(), 1);
    }
}
