use async_trait::async_trait;
use crewline_core::{AppResult, TenantId};
use crewline_domain::DraftChange;

/// Port for writing staged permission changes to the override table.
#[async_trait]
pub trait PermissionOverrideRepository: Send + Sync {
    /// Applies one staged batch against the override table.
    ///
    /// The whole batch must be applied atomically (all-or-nothing): an
    /// `allow`/`deny` target upserts the override row, a `none` target
    /// deletes it. The write is attributable to `actor_subject` for audit
    /// purposes. Callers provide no compensation for partial failure.
    async fn apply_changes(
        &self,
        tenant_id: TenantId,
        actor_subject: &str,
        changes: &[DraftChange],
    ) -> AppResult<()>;
}
