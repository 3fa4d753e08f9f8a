//! Main document store interface for interacting with document backends.
//!
//! [`DocumentStore`] is the only component that talks to a [`StoreBackend`]. It offers
//! generic create/read/update/delete/list operations over named collections, a
//! delete-by-filter operation, and [`run_transaction`](DocumentStore::run_transaction).
//! Every backend failure is classified into an [`AppError`] before it leaves this module.
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use bson::doc;
//!
//! let store = DocumentStore::new(backend);
//!
//! let id = store.create("items", &doc! { "name": "Widget" }, None, Scope::Auto).await?;
//! store.update("items", &id, &doc! { "price": 10 }, Scope::Auto).await?;
//!
//! store
//!     .run_transaction(async |tx| {
//!         let item: bson::Document = store.get_by_id("items", &id, tx.into()).await?;
//!         store.delete("items", &id, tx.into()).await?;
//!         Ok(item)
//!     })
//!     .await?;
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    backend::{StoreBackend, Write},
    classify::classify,
    collection::Collection,
    document::{self, Fields},
    error::{AppError, AppResult, BackendError, codes},
    query::{FieldFilter, Predicate},
    transaction::{Scope, TransactionContext, TransactionOptions},
};

/// Store-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Maximum writes per standalone batch commit (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Conflict retry policy used by [`DocumentStore::run_transaction`].
    #[serde(default)]
    pub transaction: TransactionOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            transaction: TransactionOptions::default(),
        }
    }
}

impl StoreOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_transaction(mut self, transaction: TransactionOptions) -> Self {
        self.transaction = transaction;
        self
    }
}

fn default_batch_size() -> usize {
    500
}

/// A document store bound to a specific backend implementation.
///
/// Construct one per backend and share it (by reference or inside an `Arc`) with every
/// component that needs persistence.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    options: StoreOptions,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend and default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Gets a handle bound to the given collection name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), self)
    }

    /// Creates a document and returns its id.
    ///
    /// With `id`, the document at that id is created or overwritten. Without it, the
    /// backend generates a fresh id.
    ///
    /// # Errors
    ///
    /// Fails with a classified repository error if the data is not a flat field map of
    /// supported values or the backend rejects the write.
    pub async fn create<D>(
        &self,
        collection: &str,
        data: &D,
        id: Option<&str>,
        scope: Scope<'_>,
    ) -> AppResult<String>
    where
        D: Serialize + ?Sized,
    {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.backend.generate_id(),
        };
        document::validate_id(&id)?;
        let fields = document::to_fields(data)?;

        tracing::debug!(collection, id = %id, "creating document");

        self.write(
            Write::Set { collection: collection.to_string(), id: id.clone(), fields },
            scope,
        )
        .await?;

        Ok(id)
    }

    /// Returns every document in the collection, each with its id merged in.
    ///
    /// Ordering is unspecified.
    pub async fn get_all<D>(&self, collection: &str, scope: Scope<'_>) -> AppResult<Vec<D>>
    where
        D: DeserializeOwned,
    {
        self.find(collection, &[], scope).await
    }

    /// Returns every document matching all filters, each with its id merged in.
    pub async fn find<D>(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        scope: Scope<'_>,
    ) -> AppResult<Vec<D>>
    where
        D: DeserializeOwned,
    {
        let documents = self.query(collection, filters, scope).await?;

        documents
            .into_iter()
            .map(|(id, fields)| -> AppResult<D> { Ok(document::from_fields(&id, fields)?) })
            .collect()
    }

    /// Returns one document with its id merged in.
    ///
    /// # Errors
    ///
    /// Fails with `RepositoryError(DOCUMENT_NOT_FOUND, 404)` when the document is absent.
    pub async fn get_by_id<D>(&self, collection: &str, id: &str, scope: Scope<'_>) -> AppResult<D>
    where
        D: DeserializeOwned,
    {
        document::validate_id(id)?;

        let fields = match scope {
            Scope::Auto => self.backend.get_document(collection, id).await,
            Scope::Transaction(tx) => tx.get_document(collection, id).await,
        }
        .map_err(|e| classify(&e))?
        .ok_or_else(|| AppError::not_found(collection, id))?;

        Ok(document::from_fields(id, fields)?)
    }

    /// Merges the supplied fields into an existing document.
    ///
    /// Fields not present in `partial` keep their values. [`Sentinel::Delete`](crate::document::Sentinel::Delete)
    /// removes a field.
    ///
    /// # Errors
    ///
    /// Fails with a classified repository error (`not-found`, 404) if the document does
    /// not exist, or if the backend rejects the write.
    pub async fn update<P>(
        &self,
        collection: &str,
        id: &str,
        partial: &P,
        scope: Scope<'_>,
    ) -> AppResult<()>
    where
        P: Serialize + ?Sized,
    {
        document::validate_id(id)?;
        let fields = document::to_fields(partial)?;

        tracing::debug!(collection, id, fields = fields.len(), "updating document");

        self.write(
            Write::Update { collection: collection.to_string(), id: id.to_string(), fields },
            scope,
        )
        .await
    }

    /// Deletes a document. Deleting an absent document succeeds.
    pub async fn delete(&self, collection: &str, id: &str, scope: Scope<'_>) -> AppResult<()> {
        document::validate_id(id)?;

        tracing::debug!(collection, id, "deleting document");

        self.write(
            Write::Delete { collection: collection.to_string(), id: id.to_string() },
            scope,
        )
        .await
    }

    /// Deletes every document whose fields equal all the given filters and returns how
    /// many were deleted.
    ///
    /// Under [`Scope::Transaction`] the matching set is read and deleted inside the
    /// transaction. Under [`Scope::Auto`] the set is read once and deleted in atomic
    /// batches of at most [`StoreOptions::batch_size`] writes; documents that start
    /// matching after the read are not deleted, and atomicity does not span batches.
    ///
    /// # Errors
    ///
    /// An empty filter list fails with `ServiceError(INVALID_FILTER, 400)`. Any other
    /// failure is a repository error whose message names the rendered predicate.
    pub async fn delete_by_filters(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        scope: Scope<'_>,
    ) -> AppResult<usize> {
        if filters.is_empty() {
            return Err(AppError::service(
                format!("Refusing to delete from {collection} without filters"),
                codes::INVALID_FILTER,
            )
            .with_status(400));
        }

        self.delete_matching(collection, filters, scope)
            .await
            .map_err(|e| {
                let cause = classify(&e);

                AppError::repository(
                    format!(
                        "Failed to delete documents from {collection} where {}: {}",
                        Predicate::new(filters),
                        cause.message,
                    ),
                    cause.code.clone(),
                )
                .with_status(cause.status_code)
                .with_cause(cause)
            })
    }

    async fn delete_matching(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        scope: Scope<'_>,
    ) -> Result<usize, BackendError> {
        let deletes = self
            .query(collection, filters, scope)
            .await?
            .into_iter()
            .map(|(id, _)| Write::Delete { collection: collection.to_string(), id })
            .collect::<Vec<_>>();
        let count = deletes.len();

        match scope {
            Scope::Transaction(tx) => {
                for write in deletes {
                    tx.stage(write).await?;
                }
            }
            Scope::Auto => {
                let batch_size = self.options.batch_size.max(1);
                if count > batch_size {
                    tracing::warn!(
                        collection,
                        count,
                        batch_size,
                        "multi-delete exceeds one batch, committing in independent chunks"
                    );
                }

                let mut deletes = deletes.into_iter().peekable();
                while deletes.peek().is_some() {
                    let chunk = deletes.by_ref().take(batch_size).collect::<Vec<_>>();
                    self.backend.commit_writes(chunk).await?;
                }
            }
        }

        tracing::debug!(collection, count, predicate = %Predicate::new(filters), "deleted documents");

        Ok(count)
    }

    /// Runs a unit of work atomically with the default retry policy.
    ///
    /// The unit of work may run more than once: when the backend reports a write conflict
    /// the transaction is rolled back and the closure is invoked again with a fresh
    /// context. It must not perform externally visible side effects other than through
    /// the given [`TransactionContext`].
    ///
    /// # Errors
    ///
    /// Any failure, including conflicts that outlast the retry budget, is reported as
    /// `RepositoryError("Transaction failed: ...")` carrying the cause's code and status.
    pub async fn run_transaction<T, F>(&self, unit_of_work: F) -> AppResult<T>
    where
        F: AsyncFnMut(&TransactionContext) -> AppResult<T>,
    {
        let options = self.options.transaction.clone();

        self.run_transaction_with(&options, unit_of_work).await
    }

    /// Runs a unit of work atomically with an explicit retry policy.
    pub async fn run_transaction_with<T, F>(
        &self,
        options: &TransactionOptions,
        mut unit_of_work: F,
    ) -> AppResult<T>
    where
        F: AsyncFnMut(&TransactionContext) -> AppResult<T>,
    {
        let transaction_id = document::generate_id();
        let max_attempts = options.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let inner = self
                .backend
                .begin_transaction()
                .await
                .map_err(|e| transaction_failed(classify(&e)))?;
            let tx = TransactionContext::new(transaction_id.clone(), attempt, inner);

            let err = match unit_of_work(&tx).await {
                Ok(value) => match tx.commit().await {
                    Ok(()) => {
                        tracing::debug!(transaction = %transaction_id, attempt, "transaction committed");
                        return Ok(value);
                    }
                    Err(e) => classify(&e),
                },
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(
                            transaction = %transaction_id,
                            error = %rollback,
                            "transaction rollback failed"
                        );
                    }
                    e
                }
            };

            if !err.is_conflict() || attempt >= max_attempts {
                return Err(transaction_failed(err));
            }

            let delay = options.backoff(attempt);
            tracing::warn!(
                transaction = %transaction_id,
                attempt,
                ?delay,
                "transaction conflict, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> AppResult<()> {
        self.backend
            .shutdown()
            .await
            .map_err(|e| classify(&e))
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        scope: Scope<'_>,
    ) -> Result<Vec<(String, Fields)>, BackendError> {
        match scope {
            Scope::Auto => self.backend.query_documents(collection, filters).await,
            Scope::Transaction(tx) => tx.query_documents(collection, filters).await,
        }
    }

    async fn write(&self, write: Write, scope: Scope<'_>) -> AppResult<()> {
        match scope {
            Scope::Auto => self.backend.commit_writes(vec![write]).await,
            Scope::Transaction(tx) => tx.stage(write).await,
        }
        .map_err(|e| classify(&e))
    }
}

fn transaction_failed(cause: AppError) -> AppError {
    AppError::repository(format!("Transaction failed: {}", cause.message), cause.code.clone())
        .with_status(cause.status_code)
        .with_cause(cause)
}
