//! Collection handles for document store operations.
//!
//! A [`Collection`] binds a collection name to a [`DocumentStore`] so call sites do not
//! repeat it. Every method forwards to the store operation of the same name.
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use bson::doc;
//!
//! let items = store.collection("items");
//! let id = items.create(&doc! { "name": "Widget" }, None, Scope::Auto).await?;
//! let item: bson::Document = items.get_by_id(&id, Scope::Auto).await?;
//! ```

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    backend::StoreBackend,
    error::AppResult,
    query::FieldFilter,
    store::DocumentStore,
    transaction::Scope,
};

/// A named collection with a reference to its document store.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the store reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    store: &'a DocumentStore<B>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, store: &'a DocumentStore<B>) -> Self {
        Self { name, store }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`DocumentStore::create`].
    pub async fn create<D>(&self, data: &D, id: Option<&str>, scope: Scope<'_>) -> AppResult<String>
    where
        D: Serialize + ?Sized,
    {
        self.store
            .create(&self.name, data, id, scope)
            .await
    }

    /// See [`DocumentStore::get_all`].
    pub async fn get_all<D: DeserializeOwned>(&self, scope: Scope<'_>) -> AppResult<Vec<D>> {
        self.store.get_all(&self.name, scope).await
    }

    /// See [`DocumentStore::find`].
    pub async fn find<D: DeserializeOwned>(
        &self,
        filters: &[FieldFilter],
        scope: Scope<'_>,
    ) -> AppResult<Vec<D>> {
        self.store
            .find(&self.name, filters, scope)
            .await
    }

    /// See [`DocumentStore::get_by_id`].
    pub async fn get_by_id<D: DeserializeOwned>(&self, id: &str, scope: Scope<'_>) -> AppResult<D> {
        self.store
            .get_by_id(&self.name, id, scope)
            .await
    }

    /// See [`DocumentStore::update`].
    pub async fn update<P>(&self, id: &str, partial: &P, scope: Scope<'_>) -> AppResult<()>
    where
        P: Serialize + ?Sized,
    {
        self.store
            .update(&self.name, id, partial, scope)
            .await
    }

    /// See [`DocumentStore::delete`].
    pub async fn delete(&self, id: &str, scope: Scope<'_>) -> AppResult<()> {
        self.store.delete(&self.name, id, scope).await
    }

    /// See [`DocumentStore::delete_by_filters`].
    pub async fn delete_by_filters(&self, filters: &[FieldFilter], scope: Scope<'_>) -> AppResult<usize> {
        self.store
            .delete_by_filters(&self.name, filters, scope)
            .await
    }
}
