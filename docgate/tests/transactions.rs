use bson::doc;
use docgate::{memory::InMemoryStore, prelude::*};

fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::with_options(
        InMemoryStore::new(),
        StoreOptions::default().with_transaction(TransactionOptions::default().with_backoff(1, 4)),
    )
}

#[tokio::test]
async fn commits_staged_writes_together() {
    let store = store();
    store
        .create("accounts", &doc! { "balance": 30_i64 }, Some("a"), Scope::Auto)
        .await
        .unwrap();
    store
        .create("accounts", &doc! { "balance": 0_i64 }, Some("b"), Scope::Auto)
        .await
        .unwrap();

    let moved = store
        .run_transaction(async |tx| {
            let from: bson::Document = store.get_by_id("accounts", "a", tx.into()).await?;
            let balance = from.get_i64("balance").unwrap_or_default();

            store
                .update("accounts", "a", &doc! { "balance": 0_i64 }, tx.into())
                .await?;
            store
                .update("accounts", "b", &doc! { "balance": balance }, tx.into())
                .await?;

            Ok(balance)
        })
        .await
        .unwrap();

    assert_eq!(moved, 30);

    let b: bson::Document = store.get_by_id("accounts", "b", Scope::Auto).await.unwrap();
    assert_eq!(b.get_i64("balance").unwrap(), 30);
}

#[tokio::test]
async fn failed_unit_of_work_leaves_no_partial_writes() {
    let store = store();
    store
        .create("items", &doc! { "name": "Keep" }, Some("keep"), Scope::Auto)
        .await
        .unwrap();

    let err = store
        .run_transaction(async |tx| -> AppResult<()> {
            store
                .create("items", &doc! { "name": "Staged" }, Some("staged"), tx.into())
                .await?;
            store.delete("items", "keep", tx.into()).await?;

            Err(AppError::service("Out of stock", "OUT_OF_STOCK"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Repository);
    assert_eq!(err.message, "Transaction failed: Out of stock");
    assert_eq!(err.code, "OUT_OF_STOCK");
    assert_eq!(err.status_code, 500);
    assert_eq!(err.cause.as_ref().map(|cause| cause.kind), Some(ErrorKind::Service));

    let all: Vec<bson::Document> = store.get_all("items", Scope::Auto).await.unwrap();
    assert_eq!(all, vec![doc! { "id": "keep", "name": "Keep" }]);
}

#[tokio::test]
async fn transactional_reads_see_staged_writes() {
    let store = store();

    store
        .run_transaction(async |tx| {
            store
                .create("items", &doc! { "name": "Fresh" }, Some("f"), tx.into())
                .await?;

            let fresh: bson::Document = store.get_by_id("items", "f", tx.into()).await?;
            assert_eq!(fresh.get_str("name").unwrap(), "Fresh");

            let outside = store.get_by_id::<bson::Document>("items", "f", Scope::Auto).await;
            assert!(outside.unwrap_err().is_not_found());

            Ok(())
        })
        .await
        .unwrap();

    assert!(store.get_by_id::<bson::Document>("items", "f", Scope::Auto).await.is_ok());
}

#[tokio::test]
async fn retries_after_write_conflict() {
    let store = store();
    store
        .create("counters", &doc! { "n": 0_i64 }, Some("c"), Scope::Auto)
        .await
        .unwrap();

    let mut attempts = Vec::new();
    let value = store
        .run_transaction(async |tx| {
            attempts.push(tx.attempt());

            let counter: bson::Document = store.get_by_id("counters", "c", tx.into()).await?;
            let n = counter.get_i64("n").unwrap_or_default();

            if tx.attempt() == 1 {
                // A concurrent writer lands between this read and the commit.
                store
                    .update("counters", "c", &doc! { "n": 100_i64 }, Scope::Auto)
                    .await?;
            }

            store
                .update("counters", "c", &doc! { "n": n + 1 }, tx.into())
                .await?;

            Ok(n + 1)
        })
        .await
        .unwrap();

    assert_eq!(attempts, [1, 2]);
    assert_eq!(value, 101);

    let counter: bson::Document = store.get_by_id("counters", "c", Scope::Auto).await.unwrap();
    assert_eq!(counter.get_i64("n").unwrap(), 101);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let store = store();
    store
        .create("counters", &doc! { "n": 0_i64 }, Some("c"), Scope::Auto)
        .await
        .unwrap();

    let options = TransactionOptions::default().with_max_attempts(3).with_backoff(1, 2);
    let mut attempts = 0;

    let err = store
        .run_transaction_with(&options, async |tx| {
            attempts += 1;

            let _: bson::Document = store.get_by_id("counters", "c", tx.into()).await?;
            store
                .update("counters", "c", &doc! { "n": attempts }, Scope::Auto)
                .await?;
            store
                .update("counters", "c", &doc! { "touched": true }, tx.into())
                .await?;

            Ok(())
        })
        .await
        .unwrap_err();

    assert_eq!(attempts, 3);
    assert_eq!(err.kind, ErrorKind::Repository);
    assert!(err.message.starts_with("Transaction failed: "));
    assert_eq!(err.code, codes::ABORTED);
    assert_eq!(err.status_code, 409);

    let counter: bson::Document = store.get_by_id("counters", "c", Scope::Auto).await.unwrap();
    assert!(!counter.contains_key("touched"));
}

#[tokio::test]
async fn does_not_retry_other_failures() {
    let store = store();
    let mut attempts = 0;

    let err = store
        .run_transaction(async |tx| {
            attempts += 1;
            store
                .update("items", "missing", &doc! { "a": 1 }, tx.into())
                .await
        })
        .await
        .unwrap_err();

    assert_eq!(attempts, 1);
    assert_eq!(err.code, "not-found");
    assert_eq!(err.status_code, 404);
    assert!(err.message.starts_with("Transaction failed: "));
}
