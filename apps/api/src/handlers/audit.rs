use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use crewline_application::AuditLogQuery;
use crewline_core::{TenantId, UserIdentity};
use uuid::Uuid;

use crate::dto::{AuditLogEntryResponse, AuditLogParams};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn audit_log_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<AuditLogParams>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let query = AuditLogQuery {
        limit: params.limit.unwrap_or(50),
        offset: params.offset.unwrap_or(0),
        action: params.action,
        subject: params.subject,
    };

    let entries = state
        .permission_service
        .list_audit_log(&identity, TenantId::from_uuid(tenant_id), query)
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
