use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
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

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Driver options for a compiled read.
fn find_options(request: &CursorRequest) -> FindOptions {
    let mut options = FindOptions::default();

    options.sort = request.sort.clone();
    options.skip = request.skip;
    // A negative limit means "single batch" to the server; too large means unlimited.
    options.limit = request.limit.and_then(|limit| i64::try_from(limit).ok());
    options.projection = request.projection.clone();

    options
}

/// `[{ $match }, { $group: { _id: null, total: { $sum: "$field" } } }]`
fn sum_pipeline(field: &str, filter: &NativeQuery) -> Vec<Document> {
    vec![
        doc! { "$match": filter.to_document() },
        doc! { "$group": { "_id": null, "total": { "$sum": format!("${field}") } } },
    ]
}

fn total(group: Option<Document>) -> f64 {
    match group.as_ref().and_then(|group| group.get("total")) {
        Some(Bson::Int32(n)) => *n as f64,
        Some(Bson::Int64(n)) => *n as f64,
        Some(Bson::Double(n)) => *n,
        _ => 0.0,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn open_cursor(&self, collection: &str, request: CursorRequest) -> StoreResult<BoxCursor> {
        let cursor = self
            .get_collection(collection)
            .find(request.filter.to_document())
            .with_options(find_options(&request))
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, "opened cursor");

        Ok(Box::new(StreamCursor::new(
            cursor.map_err(StoreError::execution).boxed(),
        )))
    }

    async fn count(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter.to_document())
            .await
            .map_err(StoreError::execution)
    }

    async fn sum(&self, collection: &str, field: &str, filter: &NativeQuery) -> StoreResult<f64> {
        let group = self
            .get_collection(collection)
            .aggregate(sum_pipeline(field, filter))
            .await
            .map_err(StoreError::execution)?
            .try_next()
            .await
            .map_err(StoreError::execution)?;

        Ok(total(group))
    }

    async fn insert_one(&self, collection: &str, row: Row) -> StoreResult<Bson> {
        let result = self
            .get_collection(collection)
            .insert_one(row)
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, inserted = 1, "inserted rows");

        Ok(result.inserted_id)
    }

    async fn insert_many(&self, collection: &str, rows: Vec<Row>) -> StoreResult<Vec<Bson>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .get_collection(collection)
            .insert_many(rows)
            .await
            .map_err(StoreError::execution)?;

        let mut ids = result.inserted_ids.into_iter().collect::<Vec<_>>();
        ids.sort_by_key(|(index, _)| *index);

        debug!(collection, inserted = ids.len(), "inserted rows");

        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(filter.to_document(), update.to_document()?)
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, matched = result.matched_count, modified = result.modified_count, "updated rows");

        Ok(UpdateOutcome { matched: result.matched_count, modified: result.modified_count })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &NativeQuery,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_many(filter.to_document(), update.to_document()?)
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, matched = result.matched_count, modified = result.modified_count, "updated rows");

        Ok(UpdateOutcome { matched: result.matched_count, modified: result.modified_count })
    }

    async fn delete_one(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        let result = self
            .get_collection(collection)
            .delete_one(filter.to_document())
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, deleted = result.deleted_count, "deleted rows");

        Ok(result.deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: &NativeQuery) -> StoreResult<u64> {
        let result = self
            .get_collection(collection)
            .delete_many(filter.to_document())
            .await
            .map_err(StoreError::execution)?;

        debug!(collection, deleted = result.deleted_count, "deleted rows");

        Ok(result.deleted_count)
    }

    async fn shutdown(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| StoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docquery_core::{
        compiler::compile,
        filter::Filter,
        query::{Projection, Query, SortDirection},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn read_options_carry_the_compiled_request() {
        let request = Query::builder()
            .sort("age", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .offset(20)
            .limit(10)
            .projection(Projection::exclude(["secret"]))
            .build()
            .compile()
            .unwrap();

        let options = find_options(&request);

        assert_eq!(options.sort, Some(doc! { "age": -1, "name": 1 }));
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.projection, Some(doc! { "secret": 0 }));
    }

    #[test]
    fn oversized_limits_are_left_unset() {
        let request = Query::builder().limit(usize::MAX).build().compile().unwrap();

        assert_eq!(find_options(&request).limit, None);

        let request = CursorRequest { limit: Some(i64::MAX as u64), ..CursorRequest::match_all() };

        assert_eq!(find_options(&request).limit, Some(i64::MAX));
    }

    #[test]
    fn sums_group_on_a_constant_key() {
        let filter = compile(Some(&Filter::eq("status", "paid"))).unwrap();

        assert_eq!(
            sum_pipeline("amount", &filter),
            vec![
                doc! { "$match": { "status": { "$eq": "paid" } } },
                doc! { "$group": { "_id": null, "total": { "$sum": "$amount" } } }
            ]
        );
    }

    #[test]
    fn missing_groups_sum_to_zero() {
        assert_eq!(total(None), 0.0);
        assert_eq!(total(Some(doc! { "_id": null, "total": 12_i64 })), 12.0);
        assert_eq!(total(Some(doc! { "_id": null, "total": 2.5 })), 2.5);
    }
}
