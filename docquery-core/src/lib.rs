//! Store-agnostic query compilation and backpressured result streaming for document stores.
//!
//! This crate is the core of the docquery project and provides:
//!
//! - **Filter trees** ([`filter`]) - The store-independent predicate AST and its builders
//! - **Native queries** ([`native`]) - The typed, compiled form of a filter
//! - **Filter compiler** ([`compiler`]) - Lowering of filter trees, including negation push-down
//! - **Query and update descriptors** ([`query`], [`update`]) - Sort, window, projection and writes
//! - **Cursors and streaming** ([`cursor`], [`driver`]) - Pull-based rows and the one-row-in-flight driver
//! - **Store backend abstraction** ([`backend`]) - The trait every store implements
//! - **Collections interface** ([`collection`]) - High-level API for interacting with document collections
//! - **Document store** ([`store`]) - Main entry point, typed or dynamically dispatched
//! - **Error handling** ([`error`]) - The error enum shared by every layer
//! - **Pagination** ([`page`]) - Page windows and page results
//!
//! # Example
//!
//! ```ignore
//! use docquery_core::filter::Filter;
//! use docquery_core::compiler::compile;
//! use bson::doc;
//!
//! let filter = Filter::not(Filter::or([Filter::eq("age", 5), Filter::eq("age", 10)]));
//!
//! assert_eq!(
//!     compile(Some(&filter))?.to_document(),
//!     doc! { "$and": [{ "age": { "$ne": 5 } }, { "age": { "$ne": 10 } }] },
//! );
//! ```

pub mod backend;
pub mod collection;
pub mod compiler;
pub mod cursor;
pub mod document;
pub mod driver;
pub mod error;
pub mod filter;
pub mod native;
pub mod page;
pub mod query;
pub mod store;
pub mod update;
