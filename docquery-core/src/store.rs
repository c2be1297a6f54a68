//! Main document store interface.
//!
//! - [`DocumentStore`] - Store bound to a concrete backend type
//! - [`DynDocumentStore`] - Store over a boxed backend, for runtime backend selection
//! - [`DynDocumentStoreRef`] - Borrowed, type-erased view of any store
//!
//! Every store variant is the same generic type over a different backend, because the
//! blanket impls in [`backend`](crate::backend) make `Box<dyn StoreBackend>` and
//! `&dyn StoreBackend` backends in their own right.
//!
//! # Example
//!
//! ```ignore
//! use docquery::store::{DocumentStore, IntoDynDocumentStore};
//!
//! let store = DocumentStore::new(backend).into_dyn();
//! let users = store.typed_collection::<User>();
//! ```

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::Document,
    error::StoreResult,
};

/// A document store bound to a backend.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A store over a dynamically dispatched backend.
pub type DynDocumentStore = DocumentStore<Box<dyn StoreBackend>>;

/// A borrowed, dynamically dispatched view of a store.
pub type DynDocumentStoreRef<'a> = DocumentStore<&'a dyn StoreBackend>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets an untyped collection with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the collection
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// The backend this store runs on.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shuts the backend down, consuming the store.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.backend.shutdown().await
    }
}

/// Borrows any store as a [`DynDocumentStoreRef`].
pub trait AsDynDocumentStore {
    fn as_dyn(&self) -> DynDocumentStoreRef<'_>;
}

/// Converts a store into a [`DynDocumentStore`].
pub trait IntoDynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> AsDynDocumentStore for DocumentStore<B> {
    fn as_dyn(&self) -> DynDocumentStoreRef<'_> {
        DocumentStore::new(&self.backend as &dyn StoreBackend)
    }
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DocumentStore::new(Box::new(self.backend) as Box<dyn StoreBackend>)
    }
}
