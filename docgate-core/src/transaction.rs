//! Execution scopes, transaction contexts and the conflict retry policy.
//!
//! Every [`DocumentStore`](crate::store::DocumentStore) operation runs in a [`Scope`]:
//!
//! - [`Scope::Auto`] reads straight from the backend and commits each write on its own.
//! - [`Scope::Transaction`] routes reads and writes through an open
//!   [`TransactionContext`]; writes are staged and become visible together at commit.
//!
//! Transaction contexts are only handed out by
//! [`DocumentStore::run_transaction`](crate::store::DocumentStore::run_transaction),
//! which retries the whole unit of work when the backend reports a write conflict.

use mea::mutex::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::{
    backend::{BackendTransaction, Write},
    document::Fields,
    error::{BackendError, BackendResult},
    query::FieldFilter,
};

/// Where a store operation executes.
#[derive(Debug, Clone, Copy, Default)]
pub enum Scope<'t> {
    /// Implicit auto-commit: no isolation beyond a single backend call.
    #[default]
    Auto,
    /// Staged in an open transaction.
    Transaction(&'t TransactionContext),
}

impl<'t> From<&'t TransactionContext> for Scope<'t> {
    fn from(tx: &'t TransactionContext) -> Self {
        Scope::Transaction(tx)
    }
}

/// Handle threaded through a unit of work.
///
/// Operations performed with it are staged and committed atomically together, or not at
/// all. A context is valid only for the attempt it was created for.
pub struct TransactionContext {
    id: String,
    attempt: u32,
    inner: Mutex<Option<Box<dyn BackendTransaction>>>,
}

impl TransactionContext {
    pub(crate) fn new(id: String, attempt: u32, inner: Box<dyn BackendTransaction>) -> Self {
        Self { id, attempt, inner: Mutex::new(Some(inner)) }
    }

    /// Identifier shared by every attempt of one `run_transaction` call.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based attempt number; greater than 1 when the unit of work is being retried.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn closed(&self) -> BackendError {
        BackendError::FailedPrecondition(format!("transaction {} is already closed", self.id))
    }

    pub(crate) async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> BackendResult<Option<Fields>> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(|| self.closed())?;

        tx.get_document(collection, id).await
    }

    pub(crate) async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(|| self.closed())?;

        tx.query_documents(collection, filters).await
    }

    pub(crate) async fn stage(&self, write: Write) -> BackendResult<()> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(|| self.closed())?;

        tx.stage(write).await
    }

    pub(crate) async fn commit(&self) -> BackendResult<()> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or_else(|| self.closed())?;

        tx.commit().await
    }

    /// Rolls back if still open. Rolling back a closed context is a no-op.
    pub(crate) async fn rollback(&self) -> BackendResult<()> {
        let tx = self.inner.lock().await.take();

        match tx {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Retry policy for [`run_transaction`](crate::store::DocumentStore::run_transaction).
///
/// Only write conflicts are retried. The delay before attempt `n + 1` is
/// `initial_backoff_ms * 2^(n - 1)`, capped at `max_backoff_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Total attempts, including the first (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds (default: 20).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay, in milliseconds (default: 1000).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl TransactionOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(failed_attempt.saturating_sub(1));
        let delay = self.initial_backoff_ms.saturating_mul(multiplier);

        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    20
}

fn default_max_backoff() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let options = TransactionOptions::default().with_backoff(10, 50);

        assert_eq!(options.backoff(1), Duration::from_millis(10));
        assert_eq!(options.backoff(2), Duration::from_millis(20));
        assert_eq!(options.backoff(3), Duration::from_millis(40));
        assert_eq!(options.backoff(4), Duration::from_millis(50));
        assert_eq!(options.backoff(64), Duration::from_millis(50));
    }

    #[test]
    fn deserializes_with_defaults() {
        let options: TransactionOptions =
            serde_json::from_str(r#"{ "max_attempts": 2 }"#).unwrap();

        assert_eq!(options.max_attempts, 2);
        assert_eq!(options.initial_backoff_ms, 20);
        assert_eq!(options.max_backoff_ms, 1000);
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(TransactionOptions::default().with_max_attempts(0).max_attempts, 1);
    }
}
