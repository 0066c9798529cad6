use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a staged permission batch is applied.
    PermissionChangesApplied,
    /// Emitted when an admin session is bootstrapped.
    SessionStarted,
    /// Emitted when an admin session ends.
    SessionEnded,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionChangesApplied => "security.permission_changes.applied",
            Self::SessionStarted => "auth.session.started",
            Self::SessionEnded => "auth.session.ended",
        }
    }
}
