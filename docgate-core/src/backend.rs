//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over concrete storage implementations,
//! allowing the [`DocumentStore`](crate::store::DocumentStore) to run against an in-memory
//! fake in tests and against a remote document database in production.
//!
//! # Traits
//!
//! - [`StoreBackend`]: point reads, equality queries, atomic batch commits and transactions
//! - [`BackendTransaction`]: one optimistic transaction opened by a backend
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Failure reporting
//!
//! Every method returns [`BackendResult`](crate::error::BackendResult). Backends report an
//! optimistic-concurrency conflict as [`BackendError::Conflict`](crate::error::BackendError::Conflict)
//! (code `aborted`); the transaction coordinator retries on exactly that code.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    document::{self, Fields},
    error::BackendResult,
    query::FieldFilter,
};

/// A single staged mutation.
///
/// Field maps are stored unresolved: sentinels are resolved by the backend when the
/// write is applied, so `ServerTimestamp` reflects commit time.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Creates the document or overwrites it entirely.
    Set {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Merges fields into an existing document. Fails with not-found if it is absent.
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Removes the document. Removing an absent document is a no-op.
    Delete { collection: String, id: String },
}

impl Write {
    pub fn collection(&self) -> &str {
        match self {
            Write::Set { collection, .. }
            | Write::Update { collection, .. }
            | Write::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Write::Set { id, .. } | Write::Update { id, .. } | Write::Delete { id, .. } => id,
        }
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and tolerate concurrent calls from many tasks.
/// Consistency between concurrent writers is the backend's job: callers needing
/// read-then-write atomicity go through [`begin_transaction`](Self::begin_transaction).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Produces a fresh, unique document id.
    fn generate_id(&self) -> String {
        document::generate_id()
    }

    /// Reads one document. Returns `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>>;

    /// Returns every `(id, fields)` pair matching all filters. An empty filter list
    /// matches the whole collection. Ordering is unspecified.
    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>>;

    /// Applies all writes atomically: either every write takes effect or none does.
    ///
    /// Not isolated from concurrent writers beyond the backend's per-commit guarantees.
    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()>;

    /// Opens an optimistic transaction.
    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections override it.
    async fn shutdown(self) -> BackendResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// One open transaction.
///
/// Reads observe the transaction's own staged writes. `commit` fails with
/// [`BackendError::Conflict`](crate::error::BackendError::Conflict) when a concurrent
/// writer invalidated anything the transaction read.
#[async_trait]
pub trait BackendTransaction: Send {
    async fn get_document(&mut self, collection: &str, id: &str) -> BackendResult<Option<Fields>>;

    async fn query_documents(
        &mut self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>>;

    /// Stages a write to be applied at commit.
    async fn stage(&mut self, write: Write) -> BackendResult<()>;

    async fn commit(self: Box<Self>) -> BackendResult<()>;

    async fn rollback(self: Box<Self>) -> BackendResult<()>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    fn generate_id(&self) -> String {
        (**self).generate_id()
    }

    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        (**self).get_document(collection, id).await
    }

    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        (**self)
            .query_documents(collection, filters)
            .await
    }

    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()> {
        (**self).commit_writes(writes).await
    }

    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>> {
        (**self).begin_transaction().await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    fn generate_id(&self) -> String {
        (**self).generate_id()
    }

    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        (**self).get_document(collection, id).await
    }

    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        (**self)
            .query_documents(collection, filters)
            .await
    }

    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()> {
        (**self).commit_writes(writes).await
    }

    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>> {
        (**self).begin_transaction().await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> BackendResult<Self::Backend>;
}
