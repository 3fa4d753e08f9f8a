//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is the backend used by
//! tests and local development.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Atomic batches** - Every commit applies all of its writes or none
//! - **Optimistic transactions** - Versioned reads, validated at commit, report conflicts
//! - **Batch limit** - Commits larger than `max_batch_writes` are rejected
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{DocumentStore, memory::InMemoryStore, transaction::Scope};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!
//!     let id = store.create("users", &doc! { "name": "Alice" }, None, Scope::Auto).await?;
//!     let user: bson::Document = store.get_by_id("users", &id, Scope::Auto).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod evaluator;
pub mod store;
pub mod transaction;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
pub use transaction::InMemoryTransaction;
