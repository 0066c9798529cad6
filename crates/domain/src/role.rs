use crate::permission::{Action, Resource};

/// Resources a `program_manager` may work with.
const PROJECT_RESOURCES: &[Resource] = &[
    Resource::WorkRequests,
    Resource::Candidates,
    Resource::Jobs,
    Resource::Timecards,
    Resource::Reporting,
];

/// System-level resources withheld from `client_admin`.
const SYSTEM_RESOURCES: &[Resource] = &[Resource::TenantManagement, Resource::SystemSettings];

/// Tenant membership role. One role per membership.
///
/// Values read back from storage that match no known role become
/// [`Role::Unknown`], which grants nothing instead of silently falling
/// through to another role's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Superuser across every resource and action.
    HostAdmin,
    /// Tenant administrator, denied only system-level resources.
    ClientAdmin,
    /// Project staff limited to non-destructive actions.
    ProgramManager,
    /// End user with a minimal resource set.
    ClientUser,
    /// Unrecognized stored role value. Grants nothing.
    Unknown(String),
}

impl Role {
    /// Parses a stored role value. Total: unrecognized values become
    /// [`Role::Unknown`] rather than an error, since stale rows must still
    /// resolve (to deny-everything) instead of failing the read path.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "host_admin" => Self::HostAdmin,
            "client_admin" => Self::ClientAdmin,
            "program_manager" => Self::ProgramManager,
            "client_user" => Self::ClientUser,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::HostAdmin => "host_admin",
            Self::ClientAdmin => "client_admin",
            Self::ProgramManager => "program_manager",
            Self::ClientUser => "client_user",
            Self::Unknown(value) => value.as_str(),
        }
    }

    /// Returns whether this role implies allow for the given permission.
    ///
    /// This is the static role-permission table; override precedence is
    /// applied on top of it by [`crate::resolve`].
    #[must_use]
    pub fn grants(&self, resource: Resource, action: Action) -> bool {
        match self {
            Self::HostAdmin => true,
            Self::ClientAdmin => !SYSTEM_RESOURCES.contains(&resource),
            Self::ProgramManager => {
                PROJECT_RESOURCES.contains(&resource)
                    && matches!(action, Action::View | Action::Create | Action::Update)
            }
            Self::ClientUser => {
                matches!(resource, Resource::WorkRequests | Resource::Reporting)
                    && matches!(action, Action::View | Action::Create)
            }
            Self::Unknown(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::permission::{Action, Resource, catalog};

    use super::Role;

    #[test]
    fn host_admin_is_granted_everything() {
        let role = Role::HostAdmin;
        assert!(
            catalog()
                .iter()
                .all(|key| role.grants(key.resource, key.action))
        );
    }

    #[test]
    fn client_admin_is_denied_system_resources_only() {
        let role = Role::ClientAdmin;
        for key in catalog() {
            let expected = !matches!(
                key.resource,
                Resource::TenantManagement | Resource::SystemSettings
            );
            assert_eq!(role.grants(key.resource, key.action), expected, "{key}");
        }
    }

    #[test]
    fn program_manager_cannot_delete_or_manage() {
        let role = Role::ProgramManager;
        assert!(role.grants(Resource::Jobs, Action::Update));
        assert!(!role.grants(Resource::Jobs, Action::Delete));
        assert!(!role.grants(Resource::Jobs, Action::Manage));
        assert!(!role.grants(Resource::SystemSettings, Action::View));
    }

    #[test]
    fn client_user_is_limited_to_work_requests_and_reporting() {
        let role = Role::ClientUser;
        for key in catalog() {
            let expected = matches!(
                key.resource,
                Resource::WorkRequests | Resource::Reporting
            ) && matches!(key.action, Action::View | Action::Create);
            assert_eq!(role.grants(key.resource, key.action), expected, "{key}");
        }
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let role = Role::parse("payroll_supervisor");
        assert_eq!(role, Role::Unknown("payroll_supervisor".to_owned()));
        assert!(
            catalog()
                .iter()
                .all(|key| !role.grants(key.resource, key.action))
        );
    }

    #[test]
    fn role_roundtrips_storage_value() {
        for value in ["host_admin", "client_admin", "program_manager", "client_user"] {
            assert_eq!(Role::parse(value).as_str(), value);
        }
    }
}
