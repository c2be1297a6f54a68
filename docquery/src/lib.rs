//! Main docquery crate providing a unified interface for querying document stores.
//!
//! This crate is the primary entry point for users of the docquery framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! access to the storage backends.
//!
//! # Features
//!
//! - **Store-agnostic filters** - Build predicate trees once, run them on any backend
//! - **Correct negation** - `not` is pushed down to the leaves instead of wrapping whole queries
//! - **Backpressured streaming** - Handle huge result sets one row at a time, in order
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.typed_collection::<User>();
//!
//!     users.insert_one(&User { name: "Alice".to_string(), age: 30 }).await?;
//!
//!     let adults = Query::builder()
//!         .filter(Filter::gte("age", 18).and(Filter::not(Filter::eq("name", "Bob"))))
//!         .sort("age", SortDirection::Desc)
//!         .build();
//!
//!     // One row in flight at a time; the next row is pulled only after the handler settles.
//!     users
//!         .for_each_await(&adults, |user| async move {
//!             println!("{user:?}");
//!             Ok(())
//!         })
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A typed `DocumentStore` can be turned into a [`DynDocumentStore`](store::DynDocumentStore)
//! with `into_dyn`, or built straight from configuration:
//!
//! ```ignore
//! use docquery::{prelude::*, config::StoreConfig};
//!
//! let store = StoreConfig::from_json_str(r#"{"backend": "memory"}"#)?.connect().await?;
//! let orders = store.collection("orders");
//! let revenue = orders.sum("amount", Some(&Filter::eq("status", "paid"))).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod config;
pub mod prelude;

pub use docquery_core::{
    backend, collection, compiler, cursor, document, driver, error, filter, native, page, query,
    store, update,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docquery_memory::{InMemoryStore, InMemoryStoreBuilder, MemoryStoreError};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docquery_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
