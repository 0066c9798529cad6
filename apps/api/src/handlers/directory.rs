use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use crewline_application::TenantUserQuery;
use crewline_core::{TenantId, UserId, UserIdentity};
use uuid::Uuid;

use crate::dto::{
    CatalogEntryResponse, ListUsersQuery, TenantResponse, TenantUserPageResponse,
    UserPermissionDetailResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn catalog_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CatalogEntryResponse>>> {
    let catalog = state.permission_service.catalog();
    Ok(Json(catalog.into_iter().map(Into::into).collect()))
}

pub async fn list_tenants_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<TenantResponse>>> {
    let tenants = state.permission_service.list_tenants(&identity).await?;
    Ok(Json(tenants.into_iter().map(Into::into).collect()))
}

pub async fn list_tenant_users_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(tenant_id): Path<Uuid>,
    Query(params): Query<ListUsersQuery>,
) -> ApiResult<Json<TenantUserPageResponse>> {
    let defaults = TenantUserQuery::default();
    let query = TenantUserQuery {
        search: params.search,
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
    };

    let page = state
        .permission_service
        .list_tenant_users(&identity, TenantId::from_uuid(tenant_id), query)
        .await?;
    Ok(Json(page.into()))
}

pub async fn user_detail_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((tenant_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<UserPermissionDetailResponse>> {
    let detail = state
        .permission_service
        .user_detail(
            &identity,
            TenantId::from_uuid(tenant_id),
            UserId::from_uuid(user_id),
        )
        .await?;
    Ok(Json(detail.into()))
}
