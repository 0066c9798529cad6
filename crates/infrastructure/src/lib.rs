//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_directory_repository;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_directory_repository;
mod postgres_override_repository;

pub use in_memory_directory_repository::InMemoryDirectoryRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_directory_repository::PostgresDirectoryRepository;
pub use postgres_override_repository::PostgresOverrideRepository;
