use std::str::FromStr;

use async_trait::async_trait;
use crewline_application::{
    DirectoryRepository, TenantSummary, TenantUserPage, TenantUserQuery, TenantUserRow, UserDetail,
};
use crewline_core::{AppError, AppResult, TenantId, UserId};
use crewline_domain::{OverrideEffect, PermissionKey, PermissionOverride, Role};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// PostgreSQL-backed tenant and membership directory.
#[derive(Clone)]
pub struct PostgresDirectoryRepository {
    pool: PgPool,
}

impl PostgresDirectoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TenantUserRecord {
    user_id: Uuid,
    subject: String,
    email: String,
    display_name: Option<String>,
    role: String,
    is_active: bool,
}

impl From<TenantUserRecord> for TenantUserRow {
    fn from(record: TenantUserRecord) -> Self {
        Self {
            user_id: UserId::from_uuid(record.user_id),
            subject: record.subject,
            email: record.email,
            display_name: record.display_name,
            role: Role::parse(record.role.as_str()),
            is_active: record.is_active,
        }
    }
}

#[async_trait]
impl DirectoryRepository for PostgresDirectoryRepository {
    async fn list_tenants(&self) -> AppResult<Vec<TenantSummary>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, name
            FROM tenants
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenants: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| TenantSummary {
                tenant_id: TenantId::from_uuid(id),
                name,
            })
            .collect())
    }

    async fn list_tenant_users(
        &self,
        tenant_id: TenantId,
        query: TenantUserQuery,
    ) -> AppResult<TenantUserPage> {
        let pattern = query.search.as_deref().map(|value| format!("%{value}%"));

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tenant_users
            WHERE tenant_id = $1
                AND ($2::TEXT IS NULL
                    OR email ILIKE $2
                    OR COALESCE(display_name, '') ILIKE $2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count tenant users: {error}")))?;

        let records = sqlx::query_as::<_, TenantUserRecord>(
            r#"
            SELECT user_id, subject, email, display_name, role, is_active
            FROM tenant_users
            WHERE tenant_id = $1
                AND ($2::TEXT IS NULL
                    OR email ILIKE $2
                    OR COALESCE(display_name, '') ILIKE $2)
            ORDER BY email
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(pattern.as_deref())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenant users: {error}")))?;

        Ok(TenantUserPage {
            users: records.into_iter().map(TenantUserRow::from).collect(),
            total: usize::try_from(total).unwrap_or(0),
        })
    }

    async fn find_membership_by_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<TenantUserRow>> {
        let record = sqlx::query_as::<_, TenantUserRecord>(
            r#"
            SELECT user_id, subject, email, display_name, role, is_active
            FROM tenant_users
            WHERE tenant_id = $1 AND subject = $2
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve membership: {error}")))?;

        Ok(record.map(TenantUserRow::from))
    }

    async fn get_user_detail(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<UserDetail> {
        let record = sqlx::query_as::<_, TenantUserRecord>(
            r#"
            SELECT user_id, subject, email, display_name, role, is_active
            FROM tenant_users
            WHERE tenant_id = $1 AND user_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user detail: {error}")))?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "user '{user_id}' is not a member of tenant '{tenant_id}'"
            ))
        })?;

        let overrides = self.list_overrides(tenant_id, user_id).await?;

        Ok(UserDetail {
            user: TenantUserRow::from(record),
            overrides,
        })
    }

    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionOverride>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT permission_id, effect
            FROM permission_overrides
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY permission_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list overrides: {error}")))?;

        // Rows that predate a catalog change are skipped; the next
        // clear-all-overrides apply removes them.
        let mut overrides = Vec::with_capacity(rows.len());
        for (permission_id, effect) in rows {
            match (
                PermissionKey::from_str(permission_id.as_str()),
                OverrideEffect::from_str(effect.as_str()),
            ) {
                (Ok(permission), Ok(effect)) => {
                    overrides.push(PermissionOverride { permission, effect });
                }
                _ => {
                    warn!(
                        %tenant_id,
                        %user_id,
                        permission_id,
                        "skipping override row that no longer matches the catalog"
                    );
                }
            }
        }

        Ok(overrides)
    }
}
