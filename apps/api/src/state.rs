use std::sync::Arc;

use crewline_application::{AuditRepository, DirectoryRepository, PermissionAdminService};
use crewline_core::TenantId;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub permission_service: PermissionAdminService,
    pub directory_repository: Arc<dyn DirectoryRepository>,
    pub audit_repository: Arc<dyn AuditRepository>,
    pub frontend_url: String,
    pub bootstrap_token: String,
    pub bootstrap_tenant_id: Option<TenantId>,
}
