//! Wire types shared with the TypeScript frontend via ts-rs.

use std::collections::BTreeMap;

use crewline_application::{
    AuditLogEntry, PermissionMatrix, TenantSummary, TenantUserPage, TenantUserRow,
    UserPermissionDetail,
};
use crewline_core::UserIdentity;
use crewline_domain::{
    CellOrigin, DraftChange, EffectivePermission, PermissionDraft, PermissionKey,
    PermissionOverride,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Liveness payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// API representation of a tenant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/tenant-response.ts"
)]
pub struct TenantResponse {
    pub tenant_id: String,
    pub name: String,
}

impl From<TenantSummary> for TenantResponse {
    fn from(tenant: TenantSummary) -> Self {
        Self {
            tenant_id: tenant.tenant_id.to_string(),
            name: tenant.name,
        }
    }
}

/// API representation of a tenant membership row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/tenant-user-response.ts"
)]
pub struct TenantUserResponse {
    pub user_id: String,
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub is_active: bool,
}

impl From<TenantUserRow> for TenantUserResponse {
    fn from(user: TenantUserRow) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            subject: user.subject,
            email: user.email,
            display_name: user.display_name,
            role: user.role.as_str().to_owned(),
            is_active: user.is_active,
        }
    }
}

/// One page of tenant users plus the unpaged total.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/tenant-user-page-response.ts"
)]
pub struct TenantUserPageResponse {
    pub users: Vec<TenantUserResponse>,
    pub total: u64,
}

impl From<TenantUserPage> for TenantUserPageResponse {
    fn from(page: TenantUserPage) -> Self {
        Self {
            users: page.users.into_iter().map(Into::into).collect(),
            total: page.total as u64,
        }
    }
}

/// One catalog entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/catalog-entry-response.ts"
)]
pub struct CatalogEntryResponse {
    pub permission_id: String,
    pub resource: String,
    pub action: String,
}

impl From<PermissionKey> for CatalogEntryResponse {
    fn from(key: PermissionKey) -> Self {
        Self {
            permission_id: key.id(),
            resource: key.resource.as_str().to_owned(),
            action: key.action.as_str().to_owned(),
        }
    }
}

/// One resolved matrix cell.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/effective-permission-response.ts"
)]
pub struct EffectivePermissionResponse {
    pub permission_id: String,
    pub resource: String,
    pub action: String,
    pub state: String,
    pub origin: String,
    pub role_names: Vec<String>,
}

impl From<EffectivePermission> for EffectivePermissionResponse {
    fn from(cell: EffectivePermission) -> Self {
        Self {
            permission_id: cell.permission.id(),
            resource: cell.permission.resource.as_str().to_owned(),
            action: cell.permission.action.as_str().to_owned(),
            state: cell.state.as_str().to_owned(),
            origin: origin_label(cell.origin).to_owned(),
            role_names: cell.role_names,
        }
    }
}

fn origin_label(origin: CellOrigin) -> &'static str {
    match origin {
        CellOrigin::Override => "override",
        CellOrigin::Role => "role",
        CellOrigin::None => "none",
    }
}

/// One explicit override row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/override-response.ts"
)]
pub struct OverrideResponse {
    pub permission_id: String,
    pub effect: String,
}

impl From<PermissionOverride> for OverrideResponse {
    fn from(row: PermissionOverride) -> Self {
        Self {
            permission_id: row.permission.id(),
            effect: row.effect.as_str().to_owned(),
        }
    }
}

/// User detail panel payload: membership, overrides, resolved catalog.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/user-permission-detail-response.ts"
)]
pub struct UserPermissionDetailResponse {
    pub user: TenantUserResponse,
    pub overrides: Vec<OverrideResponse>,
    pub cells: Vec<EffectivePermissionResponse>,
}

impl From<UserPermissionDetail> for UserPermissionDetailResponse {
    fn from(detail: UserPermissionDetail) -> Self {
        Self {
            user: detail.detail.user.into(),
            overrides: detail.detail.overrides.into_iter().map(Into::into).collect(),
            cells: detail.cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Matrix read payload: catalog, user page, per-user resolved cells.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/matrix-response.ts"
)]
pub struct MatrixResponse {
    pub catalog: Vec<CatalogEntryResponse>,
    pub users: TenantUserPageResponse,
    /// Keyed by user id. A user without cells failed override resolution.
    pub cells: BTreeMap<String, Vec<EffectivePermissionResponse>>,
}

impl From<PermissionMatrix> for MatrixResponse {
    fn from(matrix: PermissionMatrix) -> Self {
        Self {
            catalog: matrix.catalog.into_iter().map(Into::into).collect(),
            users: matrix.users.into(),
            cells: matrix
                .cells
                .into_iter()
                .map(|(user_id, cells)| {
                    (
                        user_id.to_string(),
                        cells.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// One staged change in toggle order.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/draft-change-response.ts"
)]
pub struct DraftChangeResponse {
    pub user_id: String,
    pub permission_id: String,
    pub old_state: String,
    pub new_state: String,
    pub staged_at: String,
}

impl From<&DraftChange> for DraftChangeResponse {
    fn from(change: &DraftChange) -> Self {
        Self {
            user_id: change.user_id.to_string(),
            permission_id: change.permission.id(),
            old_state: change.old_state.as_str().to_owned(),
            new_state: change.new_state.as_str().to_owned(),
            staged_at: change.staged_at.to_rfc3339(),
        }
    }
}

/// Current draft contents for the session.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/draft-state-response.ts"
)]
pub struct DraftStateResponse {
    pub changes: Vec<DraftChangeResponse>,
    /// Latest staged value per cell, keyed by `user_id:resource:action`.
    pub staged_values: BTreeMap<String, String>,
    pub change_count: u64,
}

impl From<&PermissionDraft> for DraftStateResponse {
    fn from(draft: &PermissionDraft) -> Self {
        Self {
            changes: draft.changes().iter().map(Into::into).collect(),
            staged_values: draft
                .staged_values()
                .iter()
                .map(|(key, state)| (key.clone(), state.as_str().to_owned()))
                .collect(),
            change_count: draft.len() as u64,
        }
    }
}

/// Incoming payload for a cell toggle.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/toggle-cell-request.ts"
)]
pub struct ToggleCellRequest {
    pub user_id: String,
    pub permission_id: String,
}

/// Result of a cell toggle.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/toggle-cell-response.ts"
)]
pub struct ToggleCellResponse {
    pub new_state: String,
    pub change_count: u64,
}

/// Incoming payload for staging a cell to an explicit state.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/stage-cell-request.ts"
)]
pub struct StageCellRequest {
    pub user_id: String,
    pub permission_id: String,
    pub state: String,
}

/// Incoming payload for per-user bulk draft actions.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/bulk-draft-request.ts"
)]
pub struct BulkDraftRequest {
    pub user_id: String,
    /// One of `grant_all`, `deny_all`, `clear_overrides`.
    pub action: String,
}

/// Result of a bulk draft action.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/bulk-draft-response.ts"
)]
pub struct BulkDraftResponse {
    pub staged: u64,
    pub change_count: u64,
}

/// Result of applying the staged draft.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/apply-result-response.ts"
)]
pub struct ApplyResultResponse {
    pub applied: u64,
}

/// One audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub event_id: String,
    pub subject: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            event_id: entry.event_id,
            subject: entry.subject,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            detail: entry.detail,
            created_at: entry.created_at,
        }
    }
}

/// Session identity returned by `/auth/me`.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/user-identity-response.ts"
)]
pub struct UserIdentityResponse {
    pub subject: String,
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub tenant_id: String,
}

impl From<&UserIdentity> for UserIdentityResponse {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            subject: identity.subject().to_owned(),
            user_id: identity.user_id().to_string(),
            display_name: identity.display_name().to_owned(),
            email: identity.email().map(ToOwned::to_owned),
            tenant_id: identity.tenant_id().to_string(),
        }
    }
}

/// Incoming payload for session bootstrap.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/start-session-request.ts"
)]
pub struct StartSessionRequest {
    pub token: String,
    pub subject: String,
    pub tenant_id: Option<String>,
}

/// Query parameters for tenant user listings.
#[derive(Debug, Deserialize, Default)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Query parameters for the audit log listing.
#[derive(Debug, Deserialize, Default)]
pub struct AuditLogParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
    pub subject: Option<String>,
}
