//! Main docgate crate providing a unified interface for transactional document access.
//!
//! This crate is the primary entry point for users of docgate. It re-exports the core
//! types and functionality from the sub-crates and provides access to the storage
//! backends.
//!
//! # Features
//!
//! - **Generic document access** - Create, read, update, delete and list any serde type
//! - **Transactions** - Units of work committed atomically, retried on write conflicts
//! - **Batched multi-delete** - Delete by conjunctive equality filters
//! - **Error classification** - Backend failures become `{message, code, statusCode}` errors
//! - **Access control** - Role and ownership checks for request handlers
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Item {
//!     #[serde(default)]
//!     pub id: String,
//!     pub name: String,
//!     pub price: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let items = store.collection("items");
//!
//!     let id = items
//!         .create(&Item { id: String::new(), name: "Widget".into(), price: 5 }, None, Scope::Auto)
//!         .await?;
//!
//!     items.update(&id, &bson::doc! { "price": 10 }, Scope::Auto).await?;
//!
//!     let item: Item = items.get_by_id(&id, Scope::Auto).await?;
//!     assert_eq!(item.price, 10);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Transactions
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let moved = store
//!     .run_transaction(async |tx| {
//!         let from: bson::Document = store.get_by_id("accounts", "a", tx.into()).await?;
//!         let balance = from.get_i64("balance").unwrap_or(0);
//!
//!         store.update("accounts", "a", &doc! { "balance": 0_i64 }, tx.into()).await?;
//!         store.update("accounts", "b", &doc! { "balance": balance }, tx.into()).await?;
//!
//!         Ok(balance)
//!     })
//!     .await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docgate_core::{
    access, auth, backend, classify, collection, document, error, query, store, transaction,
};
pub use docgate_core::store::DocumentStore;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder, InMemoryTransaction};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder, MongoTransaction};
}
