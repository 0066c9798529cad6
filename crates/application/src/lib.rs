//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod directory_ports;
mod override_ports;
mod permission_service;

pub use audit_ports::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
pub use directory_ports::{
    DirectoryRepository, TenantSummary, TenantUserPage, TenantUserQuery, TenantUserRow, UserDetail,
};
pub use override_ports::PermissionOverrideRepository;
pub use permission_service::{PermissionAdminService, PermissionMatrix, UserPermissionDetail};
