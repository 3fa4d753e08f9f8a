//! Multi-document transactions on a MongoDB session.

use async_trait::async_trait;
use bson::Document;
use mongodb::{Client, ClientSession};

use docgate_core::{
    backend::{BackendTransaction, Write},
    document::Fields,
    error::BackendResult,
    query::FieldFilter,
};

use crate::{
    error::map_error,
    store::{execute_write, filter_document, id_filter, open_collection, restore_document},
};

/// A server-side transaction bound to one session.
///
/// Writes run immediately inside the session and stay invisible to other clients until
/// commit. The server reports concurrent modification as a `TransientTransactionError`,
/// which surfaces as a conflict.
pub struct MongoTransaction {
    client: Client,
    database: String,
    session: ClientSession,
}

impl MongoTransaction {
    pub(crate) fn new(client: Client, database: String, session: ClientSession) -> Self {
        Self { client, database, session }
    }
}

#[async_trait]
impl BackendTransaction for MongoTransaction {
    async fn get_document(&mut self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        open_collection(&self.client, &self.database, collection)?
            .find_one(id_filter(id))
            .session(&mut self.session)
            .await
            .map_err(map_error)?
            .map(|stored| restore_document(stored).map(|(_, fields)| fields))
            .transpose()
    }

    async fn query_documents(
        &mut self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        let mut cursor = open_collection(&self.client, &self.database, collection)?
            .find(filter_document(filters)?)
            .session(&mut self.session)
            .await
            .map_err(map_error)?;

        let mut documents = Vec::new();
        while let Some(stored) = cursor.next(&mut self.session).await {
            let stored: Document = stored.map_err(map_error)?;
            documents.push(restore_document(stored)?);
        }

        Ok(documents)
    }

    async fn stage(&mut self, write: Write) -> BackendResult<()> {
        execute_write(&self.client, &self.database, write, &mut self.session).await
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        let mut this = self;

        this.session
            .commit_transaction()
            .await
            .map_err(map_error)
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        let mut this = self;

        this.session
            .abort_transaction()
            .await
            .map_err(map_error)
    }
}
