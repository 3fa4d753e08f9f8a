//! MongoDB storage backend.
//!
//! Documents are stored with their id as `_id`. Batches of more than one write run in a
//! session transaction.

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, ClientSession, Collection as MongoCollection,
    options::ClientOptions,
};

use docgate_core::{
    backend::{BackendTransaction, StoreBackend, StoreBackendBuilder, Write},
    document::{self, Fields, Patch},
    error::{BackendError, BackendResult},
    query::{FieldFilter, FilterVisitor},
};

use crate::{error::map_error, query::MongoQueryTranslator, transaction::MongoTransaction};

const ID_KEY: &str = "_id";

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, name: &str) -> BackendResult<MongoCollection<Document>> {
        open_collection(&self.client, &self.database, name)
    }
}

pub(crate) fn open_collection(
    client: &Client,
    database: &str,
    name: &str,
) -> BackendResult<MongoCollection<Document>> {
    if name.is_empty() || name.contains('$') || name.starts_with("system.") {
        return Err(BackendError::InvalidArgument(format!("invalid collection name {name:?}")));
    }

    Ok(client.database(database).collection(name))
}

pub(crate) fn id_filter(id: &str) -> Document {
    doc! { ID_KEY: id }
}

pub(crate) fn filter_document(filters: &[FieldFilter]) -> BackendResult<Document> {
    MongoQueryTranslator.visit_and(filters)
}

/// Stores the id as `_id` ahead of the fields.
fn prepare_document(id: &str, fields: Fields) -> Document {
    let mut stored = id_filter(id);
    for (name, value) in fields {
        stored.insert(name, value);
    }

    stored
}

/// Splits a stored document back into its id and fields.
pub(crate) fn restore_document(mut stored: Document) -> BackendResult<(String, Fields)> {
    match stored.remove(ID_KEY) {
        Some(Bson::String(id)) => Ok((id, stored)),
        other => Err(BackendError::Deserialization(format!(
            "expected a string {ID_KEY}, found {other:?}"
        ))),
    }
}

fn update_document(patch: &Patch) -> Document {
    let mut update = Document::new();

    if !patch.set.is_empty() {
        update.insert("$set", patch.set.clone());
    }
    if !patch.unset.is_empty() {
        update.insert(
            "$unset",
            patch
                .unset
                .iter()
                .map(|field| (field.clone(), Bson::String(String::new())))
                .collect::<Document>(),
        );
    }

    update
}

/// Executes one write inside `session`.
///
/// Sentinels are resolved with the client clock.
pub(crate) async fn execute_write(
    client: &Client,
    database: &str,
    write: Write,
    session: &mut ClientSession,
) -> BackendResult<()> {
    let now = DateTime::now();
    let collection = open_collection(client, database, write.collection())?;

    match write {
        Write::Set { id, fields, .. } => {
            let fields = document::resolve_for_set(fields, now)?;

            collection
                .replace_one(id_filter(&id), prepare_document(&id, fields))
                .upsert(true)
                .session(&mut *session)
                .await
                .map_err(map_error)?;
        }
        Write::Update { collection: name, id, fields } => {
            let patch = Patch::resolve(fields, now);

            let found = if patch.is_empty() {
                collection
                    .find_one(id_filter(&id))
                    .session(&mut *session)
                    .await
                    .map_err(map_error)?
                    .is_some()
            } else {
                collection
                    .update_one(id_filter(&id), update_document(&patch))
                    .session(&mut *session)
                    .await
                    .map_err(map_error)?
                    .matched_count
                    > 0
            };

            if !found {
                return Err(BackendError::DocumentNotFound(id, name));
            }
        }
        Write::Delete { id, .. } => {
            collection
                .delete_one(id_filter(&id))
                .session(&mut *session)
                .await
                .map_err(map_error)?;
        }
    }

    Ok(())
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        self.get_collection(collection)?
            .find_one(id_filter(id))
            .await
            .map_err(map_error)?
            .map(|stored| restore_document(stored).map(|(_, fields)| fields))
            .transpose()
    }

    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        self.get_collection(collection)?
            .find(filter_document(filters)?)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)?
            .into_iter()
            .map(restore_document)
            .collect()
    }

    /// Runs a single write directly and larger batches in a multi-document transaction,
    /// which requires a replica set or sharded cluster.
    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session().await.map_err(map_error)?;

        if writes.len() == 1 {
            for write in writes {
                execute_write(&self.client, &self.database, write, &mut session).await?;
            }
            return Ok(());
        }

        session.start_transaction().await.map_err(map_error)?;

        for write in writes {
            if let Err(e) = execute_write(&self.client, &self.database, write, &mut session).await {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(error = %abort, "failed to abort batch transaction");
                }
                return Err(e);
            }
        }

        session.commit_transaction().await.map_err(map_error)
    }

    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>> {
        let mut session = self.client.start_session().await.map_err(map_error)?;
        session.start_transaction().await.map_err(map_error)?;

        Ok(Box::new(MongoTransaction::new(
            self.client.clone(),
            self.database.clone(),
            session,
        )))
    }

    async fn shutdown(self) -> BackendResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[derive(Debug)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> BackendResult<Self::Backend> {
        tracing::debug!(database = %self.database, "connecting to mongodb");

        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| BackendError::Initialization(e.to_string()))?,
            )
            .map_err(|e| BackendError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
