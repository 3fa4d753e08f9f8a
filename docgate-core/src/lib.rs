//! A transactional document access layer with role-based access control.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Error handling** ([`error`]) - Backend errors and the caller-facing error taxonomy
//! - **Error classification** ([`classify`]) - Mapping of backend failures to caller-facing errors
//! - **Field model** ([`document`]) - Field maps, ids and sentinel values
//! - **Equality filters** ([`query`]) - Conjunctive `field == value` filters
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Execution scopes** ([`transaction`]) - Auto-commit and transactional scopes, retry policy
//! - **Document store** ([`store`]) - CRUD, multi-delete and transactions over a backend
//! - **Collections interface** ([`collection`]) - Handles bound to one collection name
//! - **Access control** ([`access`]) - Role/ownership permission decisions
//! - **Authentication** ([`auth`]) - Seam for resolving credentials to a subject
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use bson::doc;
//!
//! async fn rename(
//!     store: &DocumentStore<impl StoreBackend>,
//!     subject: &Subject,
//!     id: &str,
//! ) -> AppResult<()> {
//!     let item: bson::Document = store.get_by_id("items", id, Scope::Auto).await?;
//!     authorize(
//!         subject,
//!         &AccessRequirement::any_of(["admin"]).allow_same_user(),
//!         item.get_str("owner").ok(),
//!     )?;
//!
//!     store.update("items", id, &doc! { "name": "Gadget" }, Scope::Auto).await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod access;
pub mod auth;
pub mod backend;
pub mod classify;
pub mod collection;
pub mod document;
pub mod error;
pub mod query;
pub mod store;
pub mod transaction;
