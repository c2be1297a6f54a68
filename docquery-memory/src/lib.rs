//! In-memory document storage backend for docquery.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates compiled queries with the same semantics a document store applies, which
//! makes it suitable for development, tests and small datasets.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Document-store semantics** - Dotted paths, array matching, null/missing rules, regexes
//! - **Full read support** - Filtering, multi-key sorting, skip/limit and projection
//! - **Writes** - `$set`/`$inc` updates, generated `ObjectId`s, duplicate `_id` detection
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::{Document, DocumentStore, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!     let users = store.typed_collection::<User>();
//!
//!     users.insert_one(&User { name: "Alice".to_string() }).await?;
//!
//!     Ok(())
//! }
//! ```

mod apply;
pub mod error;
mod evaluator;
pub mod store;

pub use error::MemoryStoreError;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
