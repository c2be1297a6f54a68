//! MongoDB backend implementation for docquery.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Compiled
//! queries are handed to the server as they are, and cursors stream straight from the
//! driver, so rows are fetched in driver batches only as fast as the consumer pulls them.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docquery = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Errors
//!
//! Driver failures surface as `StoreError::QueryExecution` with the driver's error as
//! the source. Connection problems while building the store are `StoreError::Initialization`.
//!
//! # Example
//!
//! ```ignore
//! use docquery::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
