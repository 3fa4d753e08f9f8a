//! Authentication seam: turning request credentials into a [`Subject`].
//!
//! Verifying credentials belongs to an external identity provider. This module defines
//! the [`Authenticator`] trait a request handler calls before [`authorize`](crate::access::authorize),
//! the bearer-token extraction every handler needs, and a fixed-token implementation.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{
    access::Subject,
    error::{AppError, AppResult, codes},
};

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves a token to the subject it identifies.
    ///
    /// # Errors
    ///
    /// Fails with an [`ErrorKind::Authentication`](crate::error::ErrorKind::Authentication) error
    /// when the token is not valid.
    async fn authenticate(&self, token: &str) -> AppResult<Subject>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> AppResult<&str> {
    let unauthorized = || AppError::authentication("Unauthorized", codes::UNAUTHORIZED);

    let (scheme, token) = header
        .ok_or_else(unauthorized)?
        .trim()
        .split_once(' ')
        .ok_or_else(unauthorized)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(unauthorized());
    }

    Ok(token)
}

/// Authenticator backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Subject>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: Subject) -> Self {
        self.tokens.insert(token.into(), subject);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> AppResult<Subject> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::authentication("Invalid token", codes::INVALID_TOKEN))
    }
}
