//! Role and ownership based access decisions.
//!
//! [`authorize`] permits a [`Subject`] when it holds any of the required roles, or, when
//! the requirement allows it, when the subject owns the resource. Everything else is
//! denied with `AuthorizationError(FORBIDDEN, 403)`.
//!
//! ```ignore
//! use docgate::access::{authorize, AccessRequirement, Subject};
//!
//! let subject = Subject::new("u1", ["user"]);
//! let requirement = AccessRequirement::any_of(["admin"]).allow_same_user();
//!
//! authorize(&subject, &requirement, Some("u1"))?;
//! assert!(authorize(&subject, &requirement, Some("u2")).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult, codes};

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Subject {
    pub fn new<I, R>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Roles that grant access, plus the optional same-user exception.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequirement {
    #[serde(default)]
    pub has_role: Vec<String>,
    #[serde(default)]
    pub allow_same_user: bool,
}

impl AccessRequirement {
    /// Requires any one of the given roles.
    pub fn any_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            has_role: roles.into_iter().map(Into::into).collect(),
            allow_same_user: false,
        }
    }

    /// Also permits a subject whose id equals the resource owner id.
    pub fn allow_same_user(mut self) -> Self {
        self.allow_same_user = true;
        self
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The subject holds this required role.
    PermitByRole(String),
    /// The subject owns the resource and the requirement allows owners.
    PermitBySameUser,
    Deny,
}

impl AccessDecision {
    pub fn is_permit(&self) -> bool {
        !matches!(self, AccessDecision::Deny)
    }
}

/// Decides access without raising. Rules apply in order: role, then ownership, then deny.
///
/// An empty `resource_owner_id` counts as absent.
pub fn evaluate(
    subject: &Subject,
    requirement: &AccessRequirement,
    resource_owner_id: Option<&str>,
) -> AccessDecision {
    if let Some(role) = requirement
        .has_role
        .iter()
        .find(|role| subject.has_role(role.as_str()))
    {
        return AccessDecision::PermitByRole(role.clone());
    }

    match resource_owner_id {
        Some(owner) if requirement.allow_same_user && !owner.is_empty() && owner == subject.id => {
            AccessDecision::PermitBySameUser
        }
        _ => AccessDecision::Deny,
    }
}

/// Permits or fails with `AuthorizationError(FORBIDDEN, 403)`.
pub fn authorize(
    subject: &Subject,
    requirement: &AccessRequirement,
    resource_owner_id: Option<&str>,
) -> AppResult<()> {
    match evaluate(subject, requirement, resource_owner_id) {
        AccessDecision::Deny => {
            tracing::warn!(
                subject = %subject.id,
                required = ?requirement.has_role,
                allow_same_user = requirement.allow_same_user,
                "access denied"
            );

            Err(AppError::authorization("Forbidden", codes::FORBIDDEN))
        }
        decision => {
            tracing::debug!(subject = %subject.id, ?decision, "access permitted");

            Ok(())
        }
    }
}
