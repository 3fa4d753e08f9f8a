use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bson::doc;
use docgate::{
    backend::{BackendTransaction, StoreBackendBuilder, Write},
    document::Fields,
    error::{BackendError, BackendResult},
    memory::InMemoryStore,
    prelude::*,
};

/// In-memory backend that lets other writers land in the middle of a standalone delete.
#[derive(Debug, Default)]
struct Interleaved {
    inner: InMemoryStore,
    /// Written right after the next query returns.
    late_insert: Mutex<Option<(String, Fields)>>,
    /// Commits allowed before every further commit fails.
    commits_before_failure: Mutex<Option<usize>>,
}

#[async_trait]
impl StoreBackend for Interleaved {
    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Fields>> {
        self.inner.get_document(collection, id).await
    }

    async fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> BackendResult<Vec<(String, Fields)>> {
        let found = self.inner.query_documents(collection, filters).await?;

        let late = self.late_insert.lock().unwrap().take();
        if let Some((id, fields)) = late {
            self.inner
                .commit_writes(vec![Write::Set { collection: collection.to_string(), id, fields }])
                .await?;
        }

        Ok(found)
    }

    async fn commit_writes(&self, writes: Vec<Write>) -> BackendResult<()> {
        let fail = match self.commits_before_failure.lock().unwrap().as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if fail {
            return Err(BackendError::Unavailable("connection dropped".into()));
        }

        self.inner.commit_writes(writes).await
    }

    async fn begin_transaction(&self) -> BackendResult<Box<dyn BackendTransaction>> {
        self.inner.begin_transaction().await
    }
}

async fn seed<B: StoreBackend>(store: &DocumentStore<B>) {
    let rows = [
        ("a", "inactive", "u1"),
        ("b", "inactive", "u1"),
        ("c", "inactive", "u2"),
        ("d", "active", "u1"),
        ("e", "active", "u2"),
    ];

    for (id, status, owner) in rows {
        store
            .create("items", &doc! { "status": status, "owner": owner }, Some(id), Scope::Auto)
            .await
            .unwrap();
    }
}

async fn remaining_ids<B: StoreBackend>(store: &DocumentStore<B>) -> Vec<String> {
    let mut ids = store
        .get_all::<bson::Document>("items", Scope::Auto)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.get_str("id").unwrap().to_string())
        .collect::<Vec<_>>();
    ids.sort();
    ids
}

#[tokio::test]
async fn removes_exactly_the_matching_documents() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let deleted = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], Scope::Auto)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(remaining_ids(&store).await, ["d", "e"]);
}

#[tokio::test]
async fn filters_combine_with_and() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let deleted = store
        .collection("items")
        .delete_by_filters(
            &[FieldFilter::eq("status", "inactive"), FieldFilter::eq("owner", "u1")],
            Scope::Auto,
        )
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(remaining_ids(&store).await, ["c", "d", "e"]);
}

#[tokio::test]
async fn no_matches_is_not_an_error() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let deleted = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "archived")], Scope::Auto)
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(remaining_ids(&store).await.len(), 5);
}

#[tokio::test]
async fn rejects_empty_filter_list() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let err = store
        .delete_by_filters("items", &[], Scope::Auto)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Service);
    assert_eq!(err.code, codes::INVALID_FILTER);
    assert_eq!(err.status_code, 400);
    assert_eq!(remaining_ids(&store).await.len(), 5);
}

#[tokio::test]
async fn large_sets_are_committed_in_chunks() {
    let backend = InMemoryStore::builder().max_batch_writes(2).build().await.unwrap();
    let store = DocumentStore::with_options(backend, StoreOptions::default().with_batch_size(2));
    seed(&store).await;

    let deleted = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], Scope::Auto)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(remaining_ids(&store).await, ["d", "e"]);
}

#[tokio::test]
async fn failure_message_names_the_predicate() {
    let backend = InMemoryStore::builder().max_batch_writes(2).build().await.unwrap();
    let store = DocumentStore::new(backend);
    seed(&store).await;

    let nothing = store
        .delete_by_filters(
            "items",
            &[FieldFilter::eq("status", "inactive"), FieldFilter::eq("archived", false)],
            Scope::Auto,
        )
        .await
        .unwrap();
    assert_eq!(nothing, 0);

    let err = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], Scope::Auto)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Repository);
    assert_eq!(err.code, "invalid-argument");
    assert_eq!(err.status_code, 400);
    assert!(
        err.message
            .starts_with(r#"Failed to delete documents from items where status == "inactive": "#),
        "{}",
        err.message
    );
    assert_eq!(remaining_ids(&store).await.len(), 5);
}

#[tokio::test]
async fn large_integers_match_exactly() {
    let store = DocumentStore::new(InMemoryStore::new());
    store
        .create("items", &doc! { "seq": 9_007_199_254_740_992_i64 }, Some("keep"), Scope::Auto)
        .await
        .unwrap();
    store
        .create("items", &doc! { "seq": 9_007_199_254_740_993_i64 }, Some("target"), Scope::Auto)
        .await
        .unwrap();

    let deleted = store
        .delete_by_filters("items", &[FieldFilter::eq("seq", 9_007_199_254_740_993_i64)], Scope::Auto)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(remaining_ids(&store).await, ["keep"]);
}

#[tokio::test]
async fn standalone_mode_leaves_late_matches_in_place() {
    let backend = Arc::new(Interleaved::default());
    let store = DocumentStore::new(backend.clone());
    seed(&store).await;

    *backend.late_insert.lock().unwrap() =
        Some(("f".to_string(), doc! { "status": "inactive", "owner": "u3" }));

    let deleted = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], Scope::Auto)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(remaining_ids(&store).await, ["d", "e", "f"]);
}

#[tokio::test]
async fn failed_chunk_keeps_earlier_chunks_committed() {
    let backend = Arc::new(Interleaved::default());
    let store =
        DocumentStore::with_options(backend.clone(), StoreOptions::default().with_batch_size(2));
    seed(&store).await;

    *backend.commits_before_failure.lock().unwrap() = Some(1);

    let err = store
        .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], Scope::Auto)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Repository);
    assert_eq!(err.code, "unavailable");
    assert_eq!(err.status_code, 503);
    assert!(
        err.message
            .starts_with(r#"Failed to delete documents from items where status == "inactive": "#),
        "{}",
        err.message
    );

    *backend.commits_before_failure.lock().unwrap() = None;

    let remaining = remaining_ids(&store).await;
    assert_eq!(remaining.len(), 3);
    assert!(remaining.contains(&"d".to_string()) && remaining.contains(&"e".to_string()));
}

#[tokio::test]
async fn transactional_mode_commits_with_other_writes() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let deleted = store
        .run_transaction(async |tx| {
            let deleted = store
                .delete_by_filters("items", &[FieldFilter::eq("owner", "u2")], tx.into())
                .await?;
            store
                .create("audit", &doc! { "deleted": deleted as i64 }, Some("last"), tx.into())
                .await?;

            Ok(deleted)
        })
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(remaining_ids(&store).await, ["a", "b", "d"]);

    let audit: bson::Document = store.get_by_id("audit", "last", Scope::Auto).await.unwrap();
    assert_eq!(audit.get_i64("deleted").unwrap(), 2);
}

#[tokio::test]
async fn transactional_mode_rolls_back_with_the_unit_of_work() {
    let store = DocumentStore::new(InMemoryStore::new());
    seed(&store).await;

    let err = store
        .run_transaction(async |tx| -> AppResult<()> {
            store
                .delete_by_filters("items", &[FieldFilter::eq("status", "active")], tx.into())
                .await?;

            Err(AppError::service("Abandoned", "ABANDONED"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.code, "ABANDONED");
    assert_eq!(remaining_ids(&store).await.len(), 5);
}

#[tokio::test]
async fn transactional_mode_catches_late_matches() {
    let store = DocumentStore::with_options(
        InMemoryStore::new(),
        StoreOptions::default().with_transaction(TransactionOptions::default().with_backoff(1, 2)),
    );
    seed(&store).await;

    let deleted = store
        .run_transaction(async |tx| {
            let deleted = store
                .delete_by_filters("items", &[FieldFilter::eq("status", "inactive")], tx.into())
                .await?;

            if tx.attempt() == 1 {
                store
                    .create("items", &doc! { "status": "inactive", "owner": "u3" }, Some("f"), Scope::Auto)
                    .await?;
            }

            Ok(deleted)
        })
        .await
        .unwrap();

    assert_eq!(deleted, 4);
    assert_eq!(remaining_ids(&store).await, ["d", "e"]);
}
