use async_trait::async_trait;
use crewline_core::{AppResult, TenantId};
use crewline_domain::AuditAction;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Tenant scope for the event.
    pub tenant_id: TenantId,
    /// Subject that performed the action.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Audit log entry projection for administrative views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Stable event identifier.
    pub event_id: String,
    /// Actor subject.
    pub subject: String,
    /// Stable action identifier.
    pub action: String,
    /// Event resource type.
    pub resource_type: String,
    /// Event resource identifier.
    pub resource_id: String,
    /// Optional event detail.
    pub detail: Option<String>,
    /// Event timestamp in RFC3339.
    pub created_at: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<String>,
    /// Optional subject filter.
    pub subject: Option<String>,
}

/// Port for reading tenant audit logs.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists most recent tenant audit entries.
    async fn list_recent_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>>;
}
