//! Optimistic transactions over the in-memory store.

use async_trait::async_trait;
use bson::DateTime;
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use docgate_core::{
    backend::{BackendTransaction, Write},
    document::Fields,
    error::{BackendError, BackendResult},
    query::{FieldFilter, Predicate},
};

use crate::{
    evaluator::DocumentEvaluator,
    store::{State, apply_write, check_batch},
};

type DocumentKey = (String, String);

/// A query this transaction ran, with the versions of everything it matched.
#[derive(Debug)]
struct QueryRead {
    collection: String,
    filters: Vec<FieldFilter>,
    matched: BTreeMap<String, u64>,
}

/// An open transaction against an [`InMemoryStore`](crate::InMemoryStore).
///
/// Reads go straight to the shared state and record the version they saw; writes are
/// buffered. At commit the write lock is taken, every recorded read is re-validated and
/// the buffered writes are applied as one batch.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<State>>,
    max_batch_writes: usize,
    reads: HashMap<DocumentKey, Option<u64>>,
    queries: Vec<QueryRead>,
    writes: Vec<Write>,
}

impl InMemoryTransaction {
    pub(crate) fn new(state: Arc<RwLock<State>>, max_batch_writes: usize) -> Self {
        Self {
            state,
            max_batch_writes,
            reads: HashMap::new(),
            queries: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Replays buffered writes for one document on top of `base`.
    ///
    /// A buffered update of a missing document reads as absent; the commit reports it.
    fn overlay(&self, collection: &str, id: &str, base: Option<Fields>) -> Option<Fields> {
        let now = DateTime::now();

        self.writes
            .iter()
            .filter(|write| write.collection() == collection && write.id() == id)
            .fold(base, |current, write| {
                apply_write(current, write.clone(), now).ok().flatten()
            })
    }

    fn validate(&self, state: &State) -> BackendResult<()> {
        for ((collection, id), version) in &self.reads {
            if state.version(collection, id) != *version {
                return Err(BackendError::Conflict(format!(
                    "document {id} in collection {collection} changed since it was read"
                )));
            }
        }

        for query in &self.queries {
            let current = state
                .query(&query.collection, &query.filters)
                .into_iter()
                .map(|(id, stored)| (id, stored.version))
                .collect::<BTreeMap<_, _>>();

            if current != query.matched {
                return Err(BackendError::Conflict(format!(
                    "results of {} in collection {} changed since they were read",
                    Predicate::new(&query.filters),
                    query.collection
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BackendTransaction for InMemoryTransaction {
    async fn get_document(&mut self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        let base = {
            let state = self.state.read().await;
            let stored = state.get(collection, id);

            self.reads
                .entry((collection.to_string(), id.to_string()))
                .or_insert_with(|| stored.map(|stored| stored.version));

            stored.map(|stored| stored.fields.clone())
        };

        Ok(self.overlay(collection, id, base))
    }

    async fn query_documents(
        &mut self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        let mut results = BTreeMap::new();
        let state = self.state.read().await;

        let matched = state.query(collection, filters);
        self.queries.push(QueryRead {
            collection: collection.to_string(),
            filters: filters.to_vec(),
            matched: matched
                .iter()
                .map(|(id, stored)| (id.clone(), stored.version))
                .collect(),
        });

        for (id, stored) in matched {
            results.insert(id, stored.fields.clone());
        }

        let touched = self
            .writes
            .iter()
            .filter(|write| write.collection() == collection)
            .map(|write| write.id().to_string())
            .collect::<Vec<_>>();

        for id in touched {
            let base = state.get(collection, &id).map(|stored| stored.fields.clone());

            match self.overlay(collection, &id, base) {
                Some(fields) if DocumentEvaluator::matches(&fields, filters) => {
                    results.insert(id, fields);
                }
                _ => {
                    results.remove(&id);
                }
            }
        }

        Ok(results.into_iter().collect())
    }

    async fn stage(&mut self, write: Write) -> BackendResult<()> {
        self.writes.push(write);

        Ok(())
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        check_batch(&self.writes, self.max_batch_writes)?;

        let mut state = self.state.write().await;
        self.validate(&state)?;

        if self.writes.is_empty() {
            return Ok(());
        }

        let writes = self.writes.clone();
        state.apply(writes, DateTime::now())
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        tracing::debug!(discarded = self.writes.len(), "rolling back in-memory transaction");

        Ok(())
    }
}
