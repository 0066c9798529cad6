use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crewline_core::AppError;
use serde::{Deserialize, Serialize};

/// Protected feature areas recognized by the permission catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    /// Work request intake and tracking.
    WorkRequests,
    /// Candidate records and pipelines.
    Candidates,
    /// Job requisitions and postings.
    Jobs,
    /// Timecard entry and approval.
    Timecards,
    /// Reports and dashboards.
    Reporting,
    /// File upload and ETL import runs.
    FileImports,
    /// Tenant provisioning and membership administration.
    TenantManagement,
    /// System-wide configuration.
    SystemSettings,
}

impl Resource {
    /// Returns a stable storage value for this resource.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkRequests => "work-requests",
            Self::Candidates => "candidates",
            Self::Jobs => "jobs",
            Self::Timecards => "timecards",
            Self::Reporting => "reporting",
            Self::FileImports => "file-imports",
            Self::TenantManagement => "tenant-management",
            Self::SystemSettings => "system-settings",
        }
    }

    /// Returns all known resources in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Resource] = &[
            Resource::WorkRequests,
            Resource::Candidates,
            Resource::Jobs,
            Resource::Timecards,
            Resource::Reporting,
            Resource::FileImports,
            Resource::TenantManagement,
            Resource::SystemSettings,
        ];

        ALL
    }
}

impl FromStr for Resource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "work-requests" => Ok(Self::WorkRequests),
            "candidates" => Ok(Self::Candidates),
            "jobs" => Ok(Self::Jobs),
            "timecards" => Ok(Self::Timecards),
            "reporting" => Ok(Self::Reporting),
            "file-imports" => Ok(Self::FileImports),
            "tenant-management" => Ok(Self::TenantManagement),
            "system-settings" => Ok(Self::SystemSettings),
            _ => Err(AppError::Validation(format!(
                "unknown resource value '{value}'"
            ))),
        }
    }
}

/// Operation classes checkable against a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Read access.
    View,
    /// Create new records.
    Create,
    /// Modify existing records.
    Update,
    /// Remove records.
    Delete,
    /// Administrative control over the resource.
    Manage,
}

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Manage => "manage",
        }
    }

    /// Returns all known actions in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::View,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::Manage,
        ];

        ALL
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "manage" => Ok(Self::Manage),
            _ => Err(AppError::Validation(format!(
                "unknown action value '{value}'"
            ))),
        }
    }
}

/// One checkable permission: a resource paired with an action.
///
/// The composite id `resource:action` is the stable key used in the
/// override table and on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PermissionKey {
    /// Protected feature area.
    pub resource: Resource,
    /// Operation class.
    pub action: Action,
}

impl PermissionKey {
    /// Creates a permission key from its parts.
    #[must_use]
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Returns the composite permission id, `resource:action`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}:{}",
            self.resource.as_str(),
            self.action.as_str()
        )
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (resource, action) = value.split_once(':').ok_or_else(|| {
            AppError::Validation(format!(
                "permission id '{value}' must use the form 'resource:action'"
            ))
        })?;

        Ok(Self {
            resource: Resource::from_str(resource)?,
            action: Action::from_str(action)?,
        })
    }
}

/// Builds the full permission catalog: every resource crossed with every
/// action, resource-major then action order, no duplicate ids.
#[must_use]
pub fn catalog() -> Vec<PermissionKey> {
    let mut entries = Vec::with_capacity(Resource::all().len() * Action::all().len());
    for resource in Resource::all() {
        for action in Action::all() {
            entries.push(PermissionKey::new(*resource, *action));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::str::FromStr;

    use super::{Action, PermissionKey, Resource, catalog};

    #[test]
    fn catalog_is_the_full_cross_product() {
        let entries = catalog();
        assert_eq!(entries.len(), Resource::all().len() * Action::all().len());

        let ids: BTreeSet<String> = entries.iter().map(PermissionKey::id).collect();
        assert_eq!(ids.len(), entries.len());
    }

    #[test]
    fn catalog_order_is_resource_major() {
        let entries = catalog();
        assert_eq!(
            entries[0],
            PermissionKey::new(Resource::WorkRequests, Action::View)
        );
        assert_eq!(
            entries[Action::all().len()],
            PermissionKey::new(Resource::Candidates, Action::View)
        );
    }

    #[test]
    fn permission_id_roundtrips() {
        let key = PermissionKey::new(Resource::Timecards, Action::Manage);
        assert_eq!(key.id(), "timecards:manage");

        let parsed = PermissionKey::from_str("timecards:manage");
        assert!(parsed.is_ok());
        assert_eq!(
            parsed.unwrap_or(PermissionKey::new(Resource::Jobs, Action::View)),
            key
        );
    }

    #[test]
    fn unknown_permission_id_is_rejected() {
        assert!(PermissionKey::from_str("payroll:view").is_err());
        assert!(PermissionKey::from_str("timecards:approve").is_err());
        assert!(PermissionKey::from_str("timecards").is_err());
    }
}
