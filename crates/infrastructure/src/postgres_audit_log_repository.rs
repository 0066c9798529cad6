use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crewline_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use crewline_core::{AppError, AppResult, TenantId};
use sqlx::PgPool;

/// PostgreSQL-backed reader for the administrative audit log view.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AuditLogRecord {
    id: i64,
    subject: String,
    action: String,
    resource_type: String,
    resource_id: String,
    detail: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRecord> for AuditLogEntry {
    fn from(record: AuditLogRecord) -> Self {
        Self {
            event_id: record.id.to_string(),
            subject: record.subject,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            detail: record.detail,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_recent_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let records = sqlx::query_as::<_, AuditLogRecord>(
            r#"
            SELECT id, subject, action, resource_type, resource_id, detail, created_at
            FROM audit_log_entries
            WHERE tenant_id = $1
                AND ($2::TEXT IS NULL OR action = $2)
                AND ($3::TEXT IS NULL OR subject = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.action.as_deref())
        .bind(query.subject.as_deref())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        Ok(records.into_iter().map(AuditLogEntry::from).collect())
    }
}
