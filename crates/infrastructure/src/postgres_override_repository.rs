use async_trait::async_trait;
use crewline_application::PermissionOverrideRepository;
use crewline_core::{AppError, AppResult, TenantId};
use crewline_domain::{DraftChange, PermissionState};
use sqlx::PgPool;

/// PostgreSQL-backed writer for the permission override table.
///
/// A staged batch is applied inside one transaction so the backend keeps
/// the all-or-nothing guarantee the admin UI relies on.
#[derive(Clone)]
pub struct PostgresOverrideRepository {
    pool: PgPool,
}

impl PostgresOverrideRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionOverrideRepository for PostgresOverrideRepository {
    async fn apply_changes(
        &self,
        tenant_id: TenantId,
        actor_subject: &str,
        changes: &[DraftChange],
    ) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        for change in changes {
            match change.new_state {
                PermissionState::Allow | PermissionState::Deny => {
                    sqlx::query(
                        r#"
                        INSERT INTO permission_overrides
                            (tenant_id, user_id, permission_id, effect, updated_by)
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (tenant_id, user_id, permission_id)
                        DO UPDATE SET
                            effect = EXCLUDED.effect,
                            updated_by = EXCLUDED.updated_by,
                            updated_at = now()
                        "#,
                    )
                    .bind(tenant_id.as_uuid())
                    .bind(change.user_id.as_uuid())
                    .bind(change.permission.id())
                    .bind(change.new_state.as_str())
                    .bind(actor_subject)
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        AppError::Internal(format!("failed to upsert override: {error}"))
                    })?;
                }
                PermissionState::None => {
                    sqlx::query(
                        r#"
                        DELETE FROM permission_overrides
                        WHERE tenant_id = $1 AND user_id = $2 AND permission_id = $3
                        "#,
                    )
                    .bind(tenant_id.as_uuid())
                    .bind(change.user_id.as_uuid())
                    .bind(change.permission.id())
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        AppError::Internal(format!("failed to delete override: {error}"))
                    })?;
                }
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }
}
