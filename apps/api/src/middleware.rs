use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use crewline_core::{AppError, UserIdentity};
use tower_sessions::Session;

use crate::auth::SESSION_USER_KEY;
use crate::error::ApiResult;
use crate::state::AppState;

/// Loads the session identity and stashes it in request extensions.
pub async fn require_auth(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("sign in required".to_owned()))?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// CSRF guard: mutating requests must come from the configured frontend.
pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let mutating = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );

    if mutating {
        check_request_origin(request.headers(), &state.frontend_url)?;
    }

    Ok(next.run(request).await)
}

fn check_request_origin(headers: &HeaderMap, frontend_url: &str) -> Result<(), AppError> {
    if header_str(headers, "sec-fetch-site") == Some("cross-site") {
        return Err(AppError::Unauthorized("cross-site request blocked".to_owned()));
    }

    let origin_matches = header_str(headers, header::ORIGIN.as_str()) == Some(frontend_url);
    let referer_matches = header_str(headers, header::REFERER.as_str())
        .is_some_and(|referer| referer.starts_with(frontend_url));

    if origin_matches || referer_matches {
        Ok(())
    } else {
        Err(AppError::Unauthorized("origin validation failed".to_owned()))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
