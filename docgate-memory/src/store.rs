//! In-memory storage implementation for the document store.
//!
//! Documents are kept as field maps in HashMaps behind an async-safe read-write lock.
//! Every stored document carries the logical commit version that last wrote it, which
//! is what [`InMemoryTransaction`](crate::transaction::InMemoryTransaction) validates
//! its reads against.

use async_trait::async_trait;
use bson::DateTime;
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use docgate_core::{
    backend::{BackendTransaction, StoreBackend, StoreBackendBuilder, Write},
    document::{self, Fields, Patch},
    error::{BackendError, BackendResult},
    query::FieldFilter,
};

use crate::{evaluator::DocumentEvaluator, transaction::InMemoryTransaction};

/// Default cap on writes per atomic commit.
pub const DEFAULT_MAX_BATCH_WRITES: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stored {
    pub fields: Fields,
    pub version: u64,
}

type CollectionMap = HashMap<String, Stored>;

/// Collections plus the logical clock that versions every commit.
#[derive(Debug, Default)]
pub(crate) struct State {
    collections: HashMap<String, CollectionMap>,
    clock: u64,
}

impl State {
    pub fn get(&self, collection: &str, id: &str) -> Option<&Stored> {
        self.collections.get(collection)?.get(id)
    }

    pub fn version(&self, collection: &str, id: &str) -> Option<u64> {
        self.get(collection, id).map(|stored| stored.version)
    }

    /// Matching documents keyed by id, with their versions.
    pub fn query(&self, collection: &str, filters: &[FieldFilter]) -> BTreeMap<String, &Stored> {
        match self.collections.get(collection) {
            Some(collection_map) => collection_map
                .iter()
                .filter(|(_, stored)| DocumentEvaluator::matches(&stored.fields, filters))
                .map(|(id, stored)| (id.clone(), stored))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    /// Applies all writes under one new version, or none of them.
    pub fn apply(&mut self, writes: Vec<Write>, now: DateTime) -> BackendResult<()> {
        let mut staged: Vec<((String, String), Option<Fields>)> = Vec::with_capacity(writes.len());

        for write in writes {
            let key = (write.collection().to_string(), write.id().to_string());
            let current = staged
                .iter()
                .rev()
                .find(|(staged_key, _)| *staged_key == key)
                .map(|(_, fields)| fields.clone())
                .unwrap_or_else(|| self.get(&key.0, &key.1).map(|stored| stored.fields.clone()));

            let next = apply_write(current, write, now)?;
            staged.push((key, next));
        }

        self.clock += 1;
        let version = self.clock;

        for ((collection, id), fields) in staged {
            match fields {
                Some(fields) => {
                    self.collections
                        .entry(collection)
                        .or_default()
                        .insert(id, Stored { fields, version });
                }
                None => {
                    if let Some(collection_map) = self.collections.get_mut(&collection) {
                        collection_map.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Computes the document that results from applying one write on top of `current`.
pub(crate) fn apply_write(
    current: Option<Fields>,
    write: Write,
    now: DateTime,
) -> BackendResult<Option<Fields>> {
    match write {
        Write::Set { fields, .. } => Ok(Some(document::resolve_for_set(fields, now)?)),
        Write::Update { collection, id, fields } => match current {
            Some(mut existing) => {
                Patch::resolve(fields, now).apply_to(&mut existing);
                Ok(Some(existing))
            }
            None => Err(BackendError::DocumentNotFound(id, collection)),
        },
        Write::Delete { .. } => Ok(None),
    }
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same data. Transactions are optimistic: reads are recorded with the version they
/// observed and a commit fails with [`BackendError::Conflict`] if any of them changed.
///
/// Queries scan the whole collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackendBuilder;
///
/// let backend = InMemoryStore::builder().max_batch_writes(100).build().await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    max_batch_writes: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            max_batch_writes: DEFAULT_MAX_BATCH_WRITES,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn max_batch_writes(&self) -> usize {
        self.max_batch_writes
    }

    /// Number of documents currently stored in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

pub(crate) fn check_batch(writes: &[Write], max_batch_writes: usize) -> BackendResult<()> {
    if writes.len() > max_batch_writes {
        return Err(BackendError::InvalidArgument(format!(
            "batch of {} writes exceeds the limit of {max_batch_writes}",
            writes.len()
        )));
    }

    Ok(())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        Ok(self
            .state
            .read()
            .await
            .get(collection, id)
            .map(|stored| stored.fields.clone()))
    }

    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        Ok(self
            .state
            .read()
            .await
            .query(collection, filters)
            .into_iter()
            .map(|(id, stored)| (id, stored.fields.clone()))
            .collect())
    }

    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()> {
        check_batch(&writes, self.max_batch_writes)?;

        if writes.is_empty() {
            return Ok(());
        }

        self.state.write().await.apply(writes, DateTime::now())
    }

    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>> {
        Ok(Box::new(InMemoryTransaction::new(
            self.state.clone(),
            self.max_batch_writes,
        )))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Debug)]
pub struct InMemoryStoreBuilder {
    max_batch_writes: usize,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self { max_batch_writes: DEFAULT_MAX_BATCH_WRITES }
    }
}

impl InMemoryStoreBuilder {
    /// Caps the writes accepted by one atomic commit (default: 500).
    pub fn max_batch_writes(mut self, max_batch_writes: usize) -> Self {
        self.max_batch_writes = max_batch_writes.max(1);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> BackendResult<Self::Backend> {
        Ok(InMemoryStore {
            max_batch_writes: self.max_batch_writes,
            ..InMemoryStore::new()
        })
    }
}
