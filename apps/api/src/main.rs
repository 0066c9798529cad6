//! Crewline API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod auth;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use crewline_application::{AuditRepository, DirectoryRepository, PermissionAdminService};
use crewline_core::AppError;
use crewline_infrastructure::{
    PostgresAuditLogRepository, PostgresAuditRepository, PostgresDirectoryRepository,
    PostgresOverrideRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let session_store = PostgresStore::new(pool.clone())
        .with_table_name("tower_sessions")
        .map_err(|error| {
            AppError::Validation(format!("invalid session table name configuration: {error}"))
        })?;
    session_store.migrate().await.map_err(|error| {
        AppError::Internal(format!("failed to initialize session store: {error}"))
    })?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(30)));

    let directory_repository: Arc<dyn DirectoryRepository> =
        Arc::new(PostgresDirectoryRepository::new(pool.clone()));
    let override_repository = Arc::new(PostgresOverrideRepository::new(pool.clone()));
    let audit_repository: Arc<dyn AuditRepository> =
        Arc::new(PostgresAuditRepository::new(pool.clone()));
    let audit_log_repository = Arc::new(PostgresAuditLogRepository::new(pool.clone()));

    let permission_service = PermissionAdminService::new(
        directory_repository.clone(),
        override_repository,
        audit_repository.clone(),
        audit_log_repository,
    );

    let app_state = AppState {
        permission_service,
        directory_repository,
        audit_repository,
        frontend_url: config.frontend_url.clone(),
        bootstrap_token: config.bootstrap_token.clone(),
        bootstrap_tenant_id: config.bootstrap_tenant_id,
    };

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/api/permissions/catalog",
            get(handlers::directory::catalog_handler),
        )
        .route("/api/tenants", get(handlers::directory::list_tenants_handler))
        .route(
            "/api/tenants/{tenant_id}/users",
            get(handlers::directory::list_tenant_users_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/users/{user_id}",
            get(handlers::directory::user_detail_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/matrix",
            get(handlers::matrix::matrix_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/draft",
            get(handlers::draft::draft_state_handler)
                .delete(handlers::draft::discard_draft_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/draft/toggle",
            post(handlers::draft::toggle_cell_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/draft/stage",
            post(handlers::draft::stage_cell_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/draft/bulk",
            post(handlers::draft::bulk_draft_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/draft/apply",
            post(handlers::draft::apply_draft_handler),
        )
        .route(
            "/api/tenants/{tenant_id}/audit-log",
            get(handlers::audit::audit_log_handler),
        )
        .route_layer(from_fn(middleware::require_auth));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&config.frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/session", post(auth::start_session_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(session_layer)
        .with_state(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "crewline-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
