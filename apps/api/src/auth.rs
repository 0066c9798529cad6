//! Session bootstrap and teardown.
//!
//! There is no password store here. A trusted frontend exchanges the shared
//! bootstrap token plus a directory subject for a server-side session; the
//! subject must resolve to an active membership before a cookie is issued.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use crewline_application::AuditEvent;
use crewline_core::{AppError, TenantId, UserIdentity};
use crewline_domain::AuditAction;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::{StartSessionRequest, UserIdentityResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Session key under which the authenticated identity is stored.
pub const SESSION_USER_KEY: &str = "user_identity";

pub async fn start_session_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<StartSessionRequest>,
) -> ApiResult<Json<UserIdentityResponse>> {
    if payload.token != state.bootstrap_token {
        warn!(subject = %payload.subject, "session bootstrap rejected: bad token");
        return Err(AppError::Unauthorized("invalid bootstrap token".to_owned()).into());
    }

    let tenant_id = resolve_tenant(payload.tenant_id.as_deref(), state.bootstrap_tenant_id)?;

    let membership = state
        .directory_repository
        .find_membership_by_subject(tenant_id, &payload.subject)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(format!(
                "subject '{}' has no membership in tenant '{tenant_id}'",
                payload.subject
            ))
        })?;

    if !membership.is_active {
        return Err(AppError::Unauthorized(format!(
            "membership for subject '{}' is inactive",
            payload.subject
        ))
        .into());
    }

    let display_name = membership
        .display_name
        .clone()
        .unwrap_or_else(|| membership.subject.clone());
    let identity = UserIdentity::new(
        membership.subject.clone(),
        membership.user_id,
        display_name,
        Some(membership.email.clone()),
        tenant_id,
    );

    // Rotate the session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;
    session
        .insert(SESSION_USER_KEY, identity.clone())
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist session: {error}")))?;

    state
        .audit_repository
        .append_event(AuditEvent {
            tenant_id,
            subject: identity.subject().to_owned(),
            action: AuditAction::SessionStarted,
            resource_type: "session".to_owned(),
            resource_id: identity.user_id().to_string(),
            detail: None,
        })
        .await?;

    info!(subject = %identity.subject(), %tenant_id, "session started");
    Ok(Json(UserIdentityResponse::from(&identity)))
}

pub async fn me_handler(
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Json<UserIdentityResponse>> {
    Ok(Json(UserIdentityResponse::from(&identity)))
}

pub async fn logout_handler(State(state): State<AppState>, session: Session) -> ApiResult<StatusCode> {
    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?;

    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    if let Some(identity) = identity {
        state
            .audit_repository
            .append_event(AuditEvent {
                tenant_id: identity.tenant_id(),
                subject: identity.subject().to_owned(),
                action: AuditAction::SessionEnded,
                resource_type: "session".to_owned(),
                resource_id: identity.user_id().to_string(),
                detail: None,
            })
            .await?;
        info!(subject = %identity.subject(), "session ended");
    }

    Ok(StatusCode::NO_CONTENT)
}

fn resolve_tenant(
    requested: Option<&str>,
    default: Option<TenantId>,
) -> Result<TenantId, AppError> {
    match requested.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map(TenantId::from_uuid)
            .map_err(|error| AppError::Validation(format!("invalid tenant id: {error}"))),
        None => default.ok_or_else(|| {
            AppError::Validation("tenant_id is required when no default tenant is set".to_owned())
        }),
    }
}
