use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use crewline_application::TenantUserQuery;
use crewline_core::{TenantId, UserIdentity};
use uuid::Uuid;

use crate::dto::{ListUsersQuery, MatrixResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn matrix_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<ListUsersQuery>,
) -> ApiResult<Json<MatrixResponse>> {
    let defaults = TenantUserQuery::default();
    let query = TenantUserQuery {
        search: params.search,
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
    };

    let matrix = state
        .permission_service
        .matrix(&identity, TenantId::from_uuid(tenant_id), query)
        .await?;
    Ok(Json(matrix.into()))
}
