//! Draft staging endpoints.
//!
//! The staged draft lives in the server-side session, one draft per tenant,
//! so closing the browser or signing out abandons it. Nothing here writes to
//! the override store; only `apply` does, through the application service.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use crewline_core::{AppError, TenantId, UserId, UserIdentity};
use crewline_domain::{PermissionDraft, PermissionKey, PermissionState};
use tower_sessions::Session;
use uuid::Uuid;

use crate::dto::{
    ApplyResultResponse, BulkDraftRequest, BulkDraftResponse, DraftStateResponse,
    StageCellRequest, ToggleCellRequest, ToggleCellResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

fn draft_key(tenant_id: TenantId) -> String {
    format!("permission_draft:{tenant_id}")
}

async fn load_draft(session: &Session, tenant_id: TenantId) -> Result<PermissionDraft, AppError> {
    session
        .get::<PermissionDraft>(&draft_key(tenant_id))
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session draft: {error}")))
        .map(Option::unwrap_or_default)
}

async fn save_draft(
    session: &Session,
    tenant_id: TenantId,
    draft: &PermissionDraft,
) -> Result<(), AppError> {
    session
        .insert(&draft_key(tenant_id), draft)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist session draft: {error}")))
}

async fn remove_draft(session: &Session, tenant_id: TenantId) -> Result<(), AppError> {
    session
        .remove::<PermissionDraft>(&draft_key(tenant_id))
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear session draft: {error}")))?;
    Ok(())
}

fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    Uuid::parse_str(raw)
        .map(UserId::from_uuid)
        .map_err(|error| AppError::Validation(format!("invalid user id '{raw}': {error}")))
}

pub async fn draft_state_handler(
    session: Session,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<DraftStateResponse>> {
    let draft = load_draft(&session, TenantId::from_uuid(tenant_id)).await?;
    Ok(Json(DraftStateResponse::from(&draft)))
}

pub async fn toggle_cell_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    session: Session,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<ToggleCellRequest>,
) -> ApiResult<Json<ToggleCellResponse>> {
    let tenant_id = TenantId::from_uuid(tenant_id);
    let user_id = parse_user_id(&payload.user_id)?;
    let permission = PermissionKey::from_str(&payload.permission_id)?;

    let base = state
        .permission_service
        .resolve_cell(&identity, tenant_id, user_id, permission)
        .await?;

    let mut draft = load_draft(&session, tenant_id).await?;
    let new_state = draft.toggle(user_id, permission, base.state)?;
    save_draft(&session, tenant_id, &draft).await?;

    Ok(Json(ToggleCellResponse {
        new_state: new_state.as_str().to_owned(),
        change_count: draft.len() as u64,
    }))
}

pub async fn stage_cell_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    session: Session,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<StageCellRequest>,
) -> ApiResult<Json<ToggleCellResponse>> {
    let tenant_id = TenantId::from_uuid(tenant_id);
    let user_id = parse_user_id(&payload.user_id)?;
    let permission = PermissionKey::from_str(&payload.permission_id)?;
    let target = PermissionState::from_str(&payload.state)?;

    let base = state
        .permission_service
        .resolve_cell(&identity, tenant_id, user_id, permission)
        .await?;

    let mut draft = load_draft(&session, tenant_id).await?;
    let new_state = draft.stage(user_id, permission, base.state, target)?;
    save_draft(&session, tenant_id, &draft).await?;

    Ok(Json(ToggleCellResponse {
        new_state: new_state.as_str().to_owned(),
        change_count: draft.len() as u64,
    }))
}

pub async fn bulk_draft_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    session: Session,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<BulkDraftRequest>,
) -> ApiResult<Json<BulkDraftResponse>> {
    let tenant_id = TenantId::from_uuid(tenant_id);
    let user_id = parse_user_id(&payload.user_id)?;

    let detail = state
        .permission_service
        .user_detail(&identity, tenant_id, user_id)
        .await?;

    let mut draft = load_draft(&session, tenant_id).await?;
    let staged = match payload.action.as_str() {
        "grant_all" => draft.grant_all(user_id, &detail.cells)?,
        "deny_all" => draft.deny_all(user_id, &detail.cells)?,
        "clear_overrides" => draft.clear_overrides(user_id, &detail.cells)?,
        other => {
            return Err(
                AppError::Validation(format!("unknown bulk action '{other}'")).into(),
            );
        }
    };
    save_draft(&session, tenant_id, &draft).await?;

    Ok(Json(BulkDraftResponse {
        staged: staged as u64,
        change_count: draft.len() as u64,
    }))
}

pub async fn discard_draft_handler(
    session: Session,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    remove_draft(&session, TenantId::from_uuid(tenant_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_draft_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    session: Session,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<ApplyResultResponse>> {
    let tenant_id = TenantId::from_uuid(tenant_id);
    let mut draft = load_draft(&session, tenant_id).await?;

    // On failure the error propagates before the session is touched, so the
    // staged draft survives for retry.
    let applied = state
        .permission_service
        .apply_changes(&identity, tenant_id, &mut draft)
        .await?;
    remove_draft(&session, tenant_id).await?;

    Ok(Json(ApplyResultResponse {
        applied: applied as u64,
    }))
}
