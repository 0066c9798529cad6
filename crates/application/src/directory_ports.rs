use async_trait::async_trait;
use crewline_core::{AppResult, TenantId, UserId};
use crewline_domain::{PermissionOverride, Role};

/// Tenant projection for the tenant selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSummary {
    /// Stable tenant id.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
}

/// Query parameters for tenant user listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantUserQuery {
    /// Optional case-insensitive match over email and display name.
    pub search: Option<String>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for TenantUserQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Tenant membership row returned by user listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantUserRow {
    /// Stable user id.
    pub user_id: UserId,
    /// Identity-provider subject claim.
    pub subject: String,
    /// Login email.
    pub email: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// Membership role within the tenant.
    pub role: Role,
    /// Whether the membership is active.
    pub is_active: bool,
}

/// One page of tenant users plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantUserPage {
    /// Rows for the requested page.
    pub users: Vec<TenantUserRow>,
    /// Total matching rows across all pages.
    pub total: usize,
}

/// Full user detail for the side panel: membership plus overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDetail {
    /// Membership row.
    pub user: TenantUserRow,
    /// Explicit permission overrides for this user in this tenant.
    pub overrides: Vec<PermissionOverride>,
}

/// Port for tenant and membership directory reads.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Lists active tenants.
    async fn list_tenants(&self) -> AppResult<Vec<TenantSummary>>;

    /// Lists tenant users with optional search and offset pagination.
    async fn list_tenant_users(
        &self,
        tenant_id: TenantId,
        query: TenantUserQuery,
    ) -> AppResult<TenantUserPage>;

    /// Finds the membership row for a subject, if one exists.
    async fn find_membership_by_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<TenantUserRow>>;

    /// Returns membership and overrides for one user. Fails with
    /// `AppError::NotFound` when the user is not a member of the tenant.
    async fn get_user_detail(&self, tenant_id: TenantId, user_id: UserId)
    -> AppResult<UserDetail>;

    /// Lists the explicit permission overrides for one user.
    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionOverride>>;
}
