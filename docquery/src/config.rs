//! Backend selection from configuration.
//!
//! A [`StoreConfig`] names a backend and carries its connection settings. It is
//! usually read from JSON:
//!
//! ```json
//! { "backend": "memory" }
//! { "backend": "mongodb", "dsn": "mongodb://localhost:27017", "database": "app" }
//! ```
//!
//! [`StoreConfig::connect`] builds the matching backend and returns it as a
//! [`DynDocumentStore`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use docquery_core::{
    backend::StoreBackendBuilder,
    error::{StoreError, StoreResult},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};
use docquery_memory::InMemoryStoreBuilder;

/// Which backend to use, and how to reach it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// The in-memory backend. Data lives as long as the store.
    #[default]
    Memory,
    /// A MongoDB deployment. Requires the `mongodb` cargo feature.
    MongoDb { dsn: String, database: String },
}

impl StoreConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Malformed JSON or an unknown backend name is a
    /// [`StoreError::Initialization`] error.
    pub fn from_json_str(input: &str) -> StoreResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| StoreError::Initialization(format!("invalid store configuration: {e}")))
    }

    /// Builds the configured backend.
    pub async fn connect(&self) -> StoreResult<DynDocumentStore> {
        match self {
            StoreConfig::Memory => {
                debug!(backend = "memory", "connecting document store");

                Ok(DocumentStore::new(InMemoryStoreBuilder.build().await?).into_dyn())
            }
            StoreConfig::MongoDb { dsn, database } => connect_mongodb(dsn, database).await,
        }
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(dsn: &str, database: &str) -> StoreResult<DynDocumentStore> {
    debug!(backend = "mongodb", database, "connecting document store");

    let backend = docquery_mongodb::MongoDbStoreBuilder::new(dsn, database)
        .build()
        .await?;

    Ok(DocumentStore::new(backend).into_dyn())
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_dsn: &str, _database: &str) -> StoreResult<DynDocumentStore> {
    Err(StoreError::Initialization(
        "the mongodb backend requires the `mongodb` feature".to_string(),
    ))
}
