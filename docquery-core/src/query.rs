//! Query descriptors: filter, sort, pagination and projection.
//!
//! A [`Query`] is the store-agnostic description of a read. [`Query::compile`] turns it
//! into a [`CursorRequest`], the shape every backend consumes when opening a cursor.
//!
//! # Query Building
//!
//! ```ignore
//! use docquery::query::{Query, Projection, SortDirection};
//! use docquery::filter::Filter;
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "active"))
//!     .sort("created_at", SortDirection::Desc)
//!     .sort("name", SortDirection::Asc)
//!     .offset(20)
//!     .limit(10)
//!     .projection(Projection::include(["name", "email"]))
//!     .build();
//! ```

use bson::{Bson, Document, doc};

use crate::{
    compiler::compile,
    error::StoreResult,
    filter::Expr,
    native::NativeQuery,
    page::PaginationParams,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field selection applied to returned rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Return only these fields (plus `_id`).
    Include(Vec<String>),
    /// Return every field except these.
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Renders the projection as `{ field: 1 }` or `{ field: 0 }` pairs.
    pub fn to_document(&self) -> Document {
        let (fields, flag) = match self {
            Projection::Include(fields) => (fields, 1),
            Projection::Exclude(fields) => (fields, 0),
        };

        fields
            .iter()
            .map(|field| (field.clone(), Bson::Int32(flag)))
            .collect()
    }
}

/// A structured, store-agnostic read request.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression; `None` matches every document.
    pub filter: Option<Expr>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Field selection for returned rows.
    pub projection: Option<Projection>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Compiles the filter and renders sort and projection in native form.
    ///
    /// Fails with [`StoreError::Compile`](crate::error::StoreError::Compile) when the
    /// filter tree is malformed.
    pub fn compile(&self) -> StoreResult<CursorRequest> {
        Ok(CursorRequest {
            filter: compile(self.filter.as_ref())?,
            sort: (!self.sort.is_empty()).then(|| sort_document(&self.sort)),
            skip: self.offset.map(|offset| offset as u64),
            limit: self.limit.map(|limit| limit as u64),
            projection: self.projection.as_ref().map(Projection::to_document),
        })
    }
}

fn sort_document(sort: &[Sort]) -> Document {
    let mut document = doc! {};

    for key in sort {
        document.insert(
            key.field.clone(),
            match key.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            },
        );
    }

    document
}

/// A compiled read, ready to hand to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRequest {
    pub filter: NativeQuery,
    /// `{ field: 1 | -1, ... }` in key order.
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// `{ field: 0 | 1, ... }`
    pub projection: Option<Document>,
}

impl CursorRequest {
    /// A request that matches every document with no options.
    pub fn match_all() -> Self {
        CursorRequest {
            filter: NativeQuery::MatchAll,
            sort: None,
            skip: None,
            limit: None,
            projection: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key. Earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Restricts the fields of returned rows.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Sets offset and limit from 1-based pagination parameters.
    pub fn page(self, params: &PaginationParams) -> Self {
        self.offset(params.offset()).limit(params.per_page)
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn compiles_every_option() {
        let request = Query::builder()
            .filter(Filter::eq("status", "active"))
            .sort("created_at", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .offset(20)
            .limit(10)
            .projection(Projection::include(["name", "email"]))
            .build()
            .compile()
            .unwrap();

        assert_eq!(request.filter.to_document(), doc! { "status": { "$eq": "active" } });
        assert_eq!(request.sort, Some(doc! { "created_at": -1, "name": 1 }));
        assert_eq!(request.skip, Some(20));
        assert_eq!(request.limit, Some(10));
        assert_eq!(request.projection, Some(doc! { "name": 1, "email": 1 }));
    }

    #[test]
    fn empty_query_compiles_to_match_all() {
        assert_eq!(Query::new().compile().unwrap(), CursorRequest::match_all());
    }

    #[test]
    fn exclusion_projection() {
        assert_eq!(
            Projection::exclude(["password"]).to_document(),
            doc! { "password": 0 }
        );
    }

    #[test]
    fn page_sets_offset_and_limit() {
        let query = Query::builder().page(&PaginationParams::new(3, 25)).build();

        assert_eq!(query.offset, Some(50));
        assert_eq!(query.limit, Some(25));
    }

    #[test]
    fn malformed_filter_fails_before_any_request_exists() {
        let query = Query::builder().filter(Filter::or([Filter::eq("", 1)])).build();

        assert!(query.compile().unwrap_err().is_compile());
    }
}
