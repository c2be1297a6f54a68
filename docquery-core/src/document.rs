//! Rows and typed documents.
//!
//! Backends speak in [`Row`]s: ordered BSON documents. Application types implement
//! [`Document`] to be read and written through a
//! [`TypedCollection`](crate::collection::TypedCollection); the blanket [`DocumentExt`]
//! impl handles the conversion.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// An ordered mapping of field name to value, as returned by a backend.
pub type Row = bson::Document;

/// Core trait for types stored through a typed collection.
///
/// # Example
///
/// ```ignore
/// use docquery::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub name: String,
///     pub age: i32,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion between documents and rows. Implemented for every [`Document`].
pub trait DocumentExt: Document + Sized {
    /// Converts this document into a row.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the type does not serialize to a
    /// BSON document.
    fn to_row(&self) -> StoreResult<Row>;

    /// Creates a document from a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not match the document's shape.
    fn from_row(row: Row) -> StoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_row(&self) -> StoreResult<Row> {
        match serialize_to_bson(self)? {
            Bson::Document(row) => Ok(row),
            other => Err(StoreError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_row(row: Row) -> StoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(row))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: i32,
    }

    impl Document for User {
        fn collection_name() -> &'static str {
            "users"
        }
    }

    #[test]
    fn converts_to_and_from_rows() {
        let user = User { name: "Ada".to_string(), age: 36 };

        assert_eq!(user.to_row().unwrap(), doc! { "name": "Ada", "age": 36 });
        assert_eq!(User::from_row(doc! { "name": "Ada", "age": 36, "_id": 1 }).unwrap(), user);
    }

    #[test]
    fn mismatched_rows_are_serialization_errors() {
        let err = User::from_row(doc! { "name": 5 }).unwrap_err();

        assert!(matches!(err, StoreError::Serialization(_)), "unexpected error: {err:?}");
    }
}
