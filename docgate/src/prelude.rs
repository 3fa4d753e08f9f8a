//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The document store, collection handles and execution scopes
//! - Store backends and builders
//! - Equality filters and sentinels
//! - Access-control and authentication types
//! - Error types

pub use docgate_core::{
    access::{AccessDecision, AccessRequirement, Subject, authorize, evaluate},
    auth::{Authenticator, StaticAuthenticator, bearer_token},
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    document::Sentinel,
    error::{AppError, AppResult, ErrorKind, codes},
    query::FieldFilter,
    store::{DocumentStore, StoreOptions},
    transaction::{Scope, TransactionContext, TransactionOptions},
};
