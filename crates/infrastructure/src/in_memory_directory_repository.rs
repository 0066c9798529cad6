use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use crewline_application::{
    DirectoryRepository, PermissionOverrideRepository, TenantSummary, TenantUserPage,
    TenantUserQuery, TenantUserRow, UserDetail,
};
use crewline_core::{AppError, AppResult, TenantId, UserId};
use crewline_domain::{
    DraftChange, OverrideEffect, PermissionKey, PermissionOverride, PermissionState,
};
use tokio::sync::RwLock;

/// In-memory directory and override store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryRepository {
    tenants: RwLock<Vec<TenantSummary>>,
    users: RwLock<HashMap<TenantId, Vec<TenantUserRow>>>,
    overrides: RwLock<HashMap<(TenantId, UserId), BTreeMap<PermissionKey, OverrideEffect>>>,
}

impl InMemoryDirectoryRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active tenant.
    pub async fn add_tenant(&self, tenant_id: TenantId, name: impl Into<String>) {
        self.tenants.write().await.push(TenantSummary {
            tenant_id,
            name: name.into(),
        });
    }

    /// Registers a tenant membership row.
    pub async fn add_user(&self, tenant_id: TenantId, row: TenantUserRow) {
        self.users.write().await.entry(tenant_id).or_default().push(row);
    }

    /// Seeds one override row directly, bypassing the staged-apply path.
    pub async fn set_override(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        permission: PermissionKey,
        effect: OverrideEffect,
    ) {
        self.overrides
            .write()
            .await
            .entry((tenant_id, user_id))
            .or_default()
            .insert(permission, effect);
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn list_tenants(&self) -> AppResult<Vec<TenantSummary>> {
        Ok(self.tenants.read().await.clone())
    }

    async fn list_tenant_users(
        &self,
        tenant_id: TenantId,
        query: TenantUserQuery,
    ) -> AppResult<TenantUserPage> {
        let users = self.users.read().await;
        let needle = query.search.as_deref().map(str::to_lowercase);

        let mut matching: Vec<TenantUserRow> = users
            .get(&tenant_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| match needle.as_deref() {
                        None => true,
                        Some(needle) => {
                            row.email.to_lowercase().contains(needle)
                                || row
                                    .display_name
                                    .as_deref()
                                    .is_some_and(|name| name.to_lowercase().contains(needle))
                        }
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|left, right| left.email.cmp(&right.email));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(TenantUserPage { users: page, total })
    }

    async fn find_membership_by_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<TenantUserRow>> {
        Ok(self
            .users
            .read()
            .await
            .get(&tenant_id)
            .and_then(|rows| rows.iter().find(|row| row.subject == subject))
            .cloned())
    }

    async fn get_user_detail(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<UserDetail> {
        let user = self
            .users
            .read()
            .await
            .get(&tenant_id)
            .and_then(|rows| rows.iter().find(|row| row.user_id == user_id))
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of tenant '{tenant_id}'"
                ))
            })?;

        let overrides = self.list_overrides(tenant_id, user_id).await?;
        Ok(UserDetail { user, overrides })
    }

    async fn list_overrides(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionOverride>> {
        Ok(self
            .overrides
            .read()
            .await
            .get(&(tenant_id, user_id))
            .map(|entries| {
                entries
                    .iter()
                    .map(|(permission, effect)| PermissionOverride {
                        permission: *permission,
                        effect: *effect,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl PermissionOverrideRepository for InMemoryDirectoryRepository {
    async fn apply_changes(
        &self,
        tenant_id: TenantId,
        _actor_subject: &str,
        changes: &[DraftChange],
    ) -> AppResult<()> {
        // One write guard for the whole batch keeps it all-or-nothing.
        let mut overrides = self.overrides.write().await;

        for change in changes {
            let entry = overrides.entry((tenant_id, change.user_id)).or_default();
            match change.new_state {
                PermissionState::Allow => {
                    entry.insert(change.permission, OverrideEffect::Allow);
                }
                PermissionState::Deny => {
                    entry.insert(change.permission, OverrideEffect::Deny);
                }
                PermissionState::None => {
                    entry.remove(&change.permission);
                }
            }
        }

        Ok(())
    }
}
