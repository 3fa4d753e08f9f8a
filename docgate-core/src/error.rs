//! Error types and result types for document store and access-control operations.
//!
//! Errors come in two layers:
//!
//! - [`BackendError`] is what storage backends return. It never leaves the
//!   [`DocumentStore`](crate::store::DocumentStore) boundary.
//! - [`AppError`] is the caller-facing taxonomy. Every failure surfaced by the store, the
//!   transaction coordinator or the access evaluator is an `AppError`.
//!
//! Use [`AppResult<T>`] as the return type for fallible caller-facing operations and
//! [`BackendResult<T>`] inside backend implementations.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Well-known error codes carried by [`AppError`] and [`BackendError`].
pub mod codes {
    /// A document lookup by id found nothing.
    pub const DOCUMENT_NOT_FOUND: &str = "DOCUMENT_NOT_FOUND";
    /// The backend supplied no code of its own.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    /// The access evaluator denied the request.
    pub const FORBIDDEN: &str = "FORBIDDEN";
    /// No usable credentials were presented.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Credentials were presented but not recognized.
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    /// A multi-delete was requested without any filter.
    pub const INVALID_FILTER: &str = "INVALID_FILTER";

    pub const INVALID_ARGUMENT: &str = "invalid-argument";
    pub const FAILED_PRECONDITION: &str = "failed-precondition";
    pub const OUT_OF_RANGE: &str = "out-of-range";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const PERMISSION_DENIED: &str = "permission-denied";
    pub const NOT_FOUND: &str = "not-found";
    pub const ALREADY_EXISTS: &str = "already-exists";
    /// Optimistic-concurrency conflict; the only code the transaction coordinator retries.
    pub const ABORTED: &str = "aborted";
    pub const RESOURCE_EXHAUSTED: &str = "resource-exhausted";
    pub const CANCELLED: &str = "cancelled";
    pub const UNIMPLEMENTED: &str = "unimplemented";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const DEADLINE_EXCEEDED: &str = "deadline-exceeded";
    pub const INTERNAL: &str = "internal";
}

/// Raw failure reported by a storage backend.
///
/// Backends translate their driver-specific errors into one of these variants. The
/// [`classify`](crate::classify::classify) function turns them into [`AppError`]s.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Caller-supplied data could not be serialized into a field map.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A stored document could not be deserialized into the requested shape.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document violates the field model (bad field name, unsupported value, bad id).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The request itself is malformed for this backend.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document targeted by a write was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} not found in collection {1}")]
    DocumentNotFound(String, String),
    /// A concurrent writer invalidated the data this transaction read.
    #[error("Write conflict: {0}")]
    Conflict(String),
    /// The operation is not legal in the current state (e.g. a closed transaction).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),
    /// Failure carrying a backend-native code that has no dedicated variant.
    #[error("{message}")]
    Other {
        code: Option<String>,
        message: String,
    },
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// Returns the backend code for this failure, if it has one.
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Serialization(_)
            | BackendError::InvalidDocument(_)
            | BackendError::InvalidArgument(_) => Some(codes::INVALID_ARGUMENT),
            BackendError::Deserialization(_) => Some(codes::INTERNAL),
            BackendError::Initialization(_) | BackendError::Unavailable(_) => Some(codes::UNAVAILABLE),
            BackendError::DocumentAlreadyExists(..) => Some(codes::ALREADY_EXISTS),
            BackendError::DocumentNotFound(..) => Some(codes::NOT_FOUND),
            BackendError::Conflict(_) => Some(codes::ABORTED),
            BackendError::FailedPrecondition(_) => Some(codes::FAILED_PRECONDITION),
            BackendError::PermissionDenied(_) => Some(codes::PERMISSION_DENIED),
            BackendError::Unauthenticated(_) => Some(codes::UNAUTHENTICATED),
            BackendError::ResourceExhausted(_) => Some(codes::RESOURCE_EXHAUSTED),
            BackendError::DeadlineExceeded(_) => Some(codes::DEADLINE_EXCEEDED),
            BackendError::Other { code, .. } => code.as_deref(),
            BackendError::Unknown(_) => None,
        }
    }

    /// Returns `true` if this is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        self.code() == Some(codes::ABORTED)
    }
}

/// A specialized `Result` type for backend implementations.
pub type BackendResult<T> = Result<T, BackendError>;

/// The four kinds of caller-facing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Persistence-layer failure.
    Repository,
    /// Business-rule violation.
    Service,
    /// The caller could not be identified.
    Authentication,
    /// The caller is identified but not permitted.
    Authorization,
}

impl ErrorKind {
    /// The status used when a constructor is not given one explicitly.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorKind::Repository | ErrorKind::Service => 500,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
        }
    }
}

/// Caller-facing error value: `{kind, message, code, status_code}` plus an optional cause.
///
/// Serializes to the `{message, code, statusCode}` body expected by request handlers.
///
/// # Example
///
/// ```ignore
/// use docgate::error::{AppError, ErrorKind};
///
/// let err = AppError::not_found("items", "abc");
/// assert_eq!(err.kind, ErrorKind::Repository);
/// assert_eq!(err.status_code, 404);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct AppError {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub message: String,
    pub code: String,
    pub status_code: u16,
    #[serde(skip)]
    #[source]
    pub cause: Option<Box<AppError>>,
}

impl AppError {
    /// Creates an error of the given kind with its default status.
    pub fn new(kind: ErrorKind, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: code.into(),
            status_code: kind.default_status(),
            cause: None,
        }
    }

    pub fn repository(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(ErrorKind::Repository, message, code)
    }

    pub fn service(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message, code)
    }

    pub fn authentication(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message, code)
    }

    pub fn authorization(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message, code)
    }

    /// The distinguished "document not found" repository error (404).
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::repository(
            format!("Document {id} not found in collection {collection}"),
            codes::DOCUMENT_NOT_FOUND,
        )
        .with_status(404)
    }

    /// Overrides the status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Attaches the error this one was derived from.
    pub fn with_cause(mut self, cause: AppError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns `true` if this error reports an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Repository && self.code == codes::ABORTED
    }

    /// Returns `true` if this is the distinguished not-found error.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::Repository && self.code == codes::DOCUMENT_NOT_FOUND
    }

    /// Renders the `{message, code, statusCode}` response body.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "code": self.code,
            "statusCode": self.status_code,
        })
    }
}

/// A specialized `Result` type for caller-facing operations.
pub type AppResult<T> = Result<T, AppError>;
