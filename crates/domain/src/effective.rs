use std::collections::BTreeMap;
use std::str::FromStr;

use crewline_core::AppError;
use serde::{Deserialize, Serialize};

use crate::permission::{PermissionKey, catalog};
use crate::role::Role;

/// Resolved state of one permission cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Explicitly or role-derived allowed.
    Allow,
    /// Explicitly denied.
    Deny,
    /// No grant applies; rendered as the default deny.
    None,
}

impl PermissionState {
    /// Returns a stable transport value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::None => "none",
        }
    }

    /// Returns the next state in the fixed click cycle:
    /// `allow -> deny -> none -> allow`.
    #[must_use]
    pub fn next(&self) -> Self {
        match self {
            Self::Allow => Self::Deny,
            Self::Deny => Self::None,
            Self::None => Self::Allow,
        }
    }
}

impl FromStr for PermissionState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "none" => Ok(Self::None),
            _ => Err(AppError::Validation(format!(
                "unknown permission state '{value}'"
            ))),
        }
    }
}

/// Effect of a persisted per-user override row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideEffect {
    /// Grants the permission regardless of role.
    Allow,
    /// Denies the permission regardless of role.
    Deny,
}

impl OverrideEffect {
    /// Returns a stable storage value for this effect.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    /// Returns the resolved cell state this effect produces.
    #[must_use]
    pub fn as_state(&self) -> PermissionState {
        match self {
            Self::Allow => PermissionState::Allow,
            Self::Deny => PermissionState::Deny,
        }
    }
}

impl FromStr for OverrideEffect {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(AppError::Validation(format!(
                "unknown override effect '{value}'"
            ))),
        }
    }
}

/// Persisted per-user exception to role-derived permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverride {
    /// Permission the override applies to.
    pub permission: PermissionKey,
    /// Explicit allow/deny effect.
    pub effect: OverrideEffect,
}

/// Where a resolved cell value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrigin {
    /// An explicit user override decided the state.
    Override,
    /// The role-permission table decided the state.
    Role,
    /// Nothing applied; default deny.
    None,
}

impl CellOrigin {
    /// Returns a stable transport value for this origin.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Role => "role",
            Self::None => "none",
        }
    }
}

/// Resolved allow/deny/none state of one permission for one user.
///
/// Derived per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermission {
    /// Permission this cell describes.
    pub permission: PermissionKey,
    /// Resolved state after precedence.
    pub state: PermissionState,
    /// Which rule decided the state.
    pub origin: CellOrigin,
    /// Names of roles contributing a grant (at most one in the current
    /// single-role model).
    pub role_names: Vec<String>,
}

/// Indexes overrides by permission for resolution lookups. A later entry
/// for the same permission wins, matching last-write semantics of the
/// override table's primary key.
#[must_use]
pub fn overrides_by_key(
    overrides: &[PermissionOverride],
) -> BTreeMap<PermissionKey, OverrideEffect> {
    overrides
        .iter()
        .map(|entry| (entry.permission, entry.effect))
        .collect()
}

/// Resolves one catalog entry for one user.
///
/// Precedence is fixed: an explicit override is terminal and the role table
/// is not consulted; otherwise a role grant yields `allow`; otherwise the
/// cell is `none`. Pure: identical inputs always yield an identical cell.
#[must_use]
pub fn resolve(
    role: &Role,
    overrides: &BTreeMap<PermissionKey, OverrideEffect>,
    key: PermissionKey,
) -> EffectivePermission {
    if let Some(effect) = overrides.get(&key) {
        return EffectivePermission {
            permission: key,
            state: effect.as_state(),
            origin: CellOrigin::Override,
            role_names: Vec::new(),
        };
    }

    if role.grants(key.resource, key.action) {
        return EffectivePermission {
            permission: key,
            state: PermissionState::Allow,
            origin: CellOrigin::Role,
            role_names: vec![role.as_str().to_owned()],
        };
    }

    EffectivePermission {
        permission: key,
        state: PermissionState::None,
        origin: CellOrigin::None,
        role_names: Vec::new(),
    }
}

/// Resolves the whole catalog for one user in catalog order.
#[must_use]
pub fn resolve_catalog(role: &Role, overrides: &[PermissionOverride]) -> Vec<EffectivePermission> {
    let indexed = overrides_by_key(overrides);
    catalog()
        .into_iter()
        .map(|key| resolve(role, &indexed, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use crate::permission::{Action, PermissionKey, Resource, catalog};
    use crate::role::Role;

    use super::{
        CellOrigin, OverrideEffect, PermissionOverride, PermissionState, resolve, resolve_catalog,
    };

    #[test]
    fn override_beats_role_grant() {
        let key = PermissionKey::new(Resource::WorkRequests, Action::View);
        let overrides = BTreeMap::from([(key, OverrideEffect::Deny)]);

        // host_admin would allow; the override is terminal.
        let cell = resolve(&Role::HostAdmin, &overrides, key);
        assert_eq!(cell.state, PermissionState::Deny);
        assert_eq!(cell.origin, CellOrigin::Override);
        assert!(cell.role_names.is_empty());
    }

    #[test]
    fn role_grant_applies_without_override() {
        let key = PermissionKey::new(Resource::Reporting, Action::View);
        let cell = resolve(&Role::ClientUser, &BTreeMap::new(), key);
        assert_eq!(cell.state, PermissionState::Allow);
        assert_eq!(cell.origin, CellOrigin::Role);
        assert_eq!(cell.role_names, vec!["client_user".to_owned()]);
    }

    #[test]
    fn unmatched_cell_falls_back_to_none() {
        let key = PermissionKey::new(Resource::SystemSettings, Action::Manage);
        let cell = resolve(&Role::ClientUser, &BTreeMap::new(), key);
        assert_eq!(cell.state, PermissionState::None);
        assert_eq!(cell.origin, CellOrigin::None);
    }

    #[test]
    fn client_user_scenario_with_late_override() {
        let role = Role::ClientUser;
        let keys = [
            PermissionKey::new(Resource::WorkRequests, Action::View),
            PermissionKey::new(Resource::WorkRequests, Action::Create),
            PermissionKey::new(Resource::TenantManagement, Action::Manage),
        ];

        let baseline: Vec<_> = keys
            .iter()
            .map(|key| resolve(&role, &BTreeMap::new(), *key))
            .collect();
        assert_eq!(baseline[0].state, PermissionState::Allow);
        assert_eq!(baseline[0].origin, CellOrigin::Role);
        assert_eq!(baseline[1].state, PermissionState::Allow);
        assert_eq!(baseline[1].origin, CellOrigin::Role);
        assert_eq!(baseline[2].state, PermissionState::None);
        assert_eq!(baseline[2].origin, CellOrigin::None);

        let overrides = BTreeMap::from([(keys[2], OverrideEffect::Allow)]);
        let cell = resolve(&role, &overrides, keys[2]);
        assert_eq!(cell.state, PermissionState::Allow);
        assert_eq!(cell.origin, CellOrigin::Override);
    }

    #[test]
    fn resolve_catalog_covers_every_entry_in_order() {
        let cells = resolve_catalog(&Role::ProgramManager, &[]);
        let entries = catalog();
        assert_eq!(cells.len(), entries.len());
        for (cell, key) in cells.iter().zip(entries) {
            assert_eq!(cell.permission, key);
        }
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::HostAdmin),
            Just(Role::ClientAdmin),
            Just(Role::ProgramManager),
            Just(Role::ClientUser),
            "[a-z_]{1,12}".prop_map(Role::Unknown),
        ]
    }

    fn any_key() -> impl Strategy<Value = PermissionKey> {
        proptest::sample::select(catalog())
    }

    fn any_effect() -> impl Strategy<Value = OverrideEffect> {
        prop_oneof![Just(OverrideEffect::Allow), Just(OverrideEffect::Deny)]
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            role in any_role(),
            key in any_key(),
            override_key in any_key(),
            effect in any_effect(),
        ) {
            let overrides = vec![PermissionOverride { permission: override_key, effect }];
            let indexed = super::overrides_by_key(&overrides);
            prop_assert_eq!(
                resolve(&role, &indexed, key),
                resolve(&role, &indexed, key)
            );
        }

        #[test]
        fn override_is_always_terminal(
            role in any_role(),
            key in any_key(),
            effect in any_effect(),
        ) {
            let overrides = vec![PermissionOverride { permission: key, effect }];
            let cell = resolve(&role, &super::overrides_by_key(&overrides), key);
            prop_assert_eq!(cell.state, effect.as_state());
            prop_assert_eq!(cell.origin, CellOrigin::Override);
        }
    }
}
