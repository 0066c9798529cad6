//! Shared primitives for all Rust crates in Crewline.

#![forbid(unsafe_code)]

/// Session identity primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::UserIdentity;

/// Result type used across Crewline crates.
pub type AppResult<T> = Result<T, AppError>;

/// Tenant identifier used as the partition key for every persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Creates a random tenant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tenant identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Stable user identifier keying memberships and permission overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// User is not authenticated or not allowed to access a resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{TenantId, UserId};

    #[test]
    fn tenant_id_formats_as_uuid() {
        let tenant_id = TenantId::new();
        assert_eq!(tenant_id.to_string().len(), 36);
    }

    #[test]
    fn user_id_roundtrips_through_uuid() {
        let user_id = UserId::new();
        assert_eq!(UserId::from_uuid(user_id.as_uuid()), user_id);
    }
}
