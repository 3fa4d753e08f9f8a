//! MongoDB backend implementation for docgate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docgate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Session transactions** - Units of work run as multi-document transactions
//! - **Conflict reporting** - Transient transaction errors map to the `aborted` code
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! Transactions and multi-write batches need a replica set or sharded cluster.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{backend::StoreBackendBuilder, mongodb::MongoDbStore, DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017/?replicaSet=rs0", "my_database")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_mongodb;

mod error;
pub mod query;
pub mod store;
pub mod transaction;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
pub use transaction::MongoTransaction;
