//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod effective;
mod permission;
mod role;
mod staging;

pub use audit::AuditAction;
pub use effective::{
    CellOrigin, EffectivePermission, OverrideEffect, PermissionOverride, PermissionState,
    overrides_by_key, resolve, resolve_catalog,
};
pub use permission::{Action, PermissionKey, Resource, catalog};
pub use role::Role;
pub use staging::{DraftChange, MAX_STAGED_CHANGES, PermissionDraft, cell_key};
