use serde::{Deserialize, Serialize};

use crate::{TenantId, UserId};

/// Administrator information persisted in the authenticated session.
///
/// Created when a session is bootstrapped and discarded on sign-out; passed
/// explicitly to every service call so no component reads ambient user state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    user_id: UserId,
    display_name: String,
    email: Option<String>,
    tenant_id: TenantId,
}

impl UserIdentity {
    /// Creates a user identity from authentication and tenancy data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        user_id: UserId,
        display_name: impl Into<String>,
        email: Option<String>,
        tenant_id: TenantId,
    ) -> Self {
        Self {
            subject: subject.into(),
            user_id,
            display_name: display_name.into(),
            email,
            tenant_id,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the directory user id backing this identity.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the tenant linked to the identity.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
