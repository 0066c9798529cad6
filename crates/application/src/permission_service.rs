use std::collections::BTreeMap;
use std::sync::Arc;

use crewline_core::{AppError, AppResult, TenantId, UserId, UserIdentity};
use crewline_domain::{
    Action, AuditAction, EffectivePermission, PermissionDraft, PermissionKey, PermissionState,
    Resource, catalog, overrides_by_key, resolve, resolve_catalog,
};
use tracing::warn;

use crate::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
    DirectoryRepository, PermissionOverrideRepository, TenantSummary, TenantUserPage,
    TenantUserQuery, UserDetail,
};

/// Largest page a user listing will return.
const MAX_PAGE_SIZE: usize = 200;

/// User detail joined with the user's resolved catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPermissionDetail {
    /// Membership and overrides.
    pub detail: UserDetail,
    /// Effective permission cells in catalog order.
    pub cells: Vec<EffectivePermission>,
}

/// Read-path payload for the admin matrix: catalog, one page of users, and
/// each listed user's resolved cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    /// Full permission catalog in stable order.
    pub catalog: Vec<PermissionKey>,
    /// Requested user page.
    pub users: TenantUserPage,
    /// Resolved cells per listed user. A user whose overrides could not be
    /// read maps to an empty list.
    pub cells: BTreeMap<UserId, Vec<EffectivePermission>>,
}

/// Application service for the permission administration matrix.
#[derive(Clone)]
pub struct PermissionAdminService {
    directory: Arc<dyn DirectoryRepository>,
    overrides: Arc<dyn PermissionOverrideRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
}

impl PermissionAdminService {
    /// Creates a new service from required port implementations.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        overrides: Arc<dyn PermissionOverrideRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            directory,
            overrides,
            audit_repository,
            audit_log_repository,
        }
    }

    /// Returns the full permission catalog.
    #[must_use]
    pub fn catalog(&self) -> Vec<PermissionKey> {
        catalog()
    }

    /// Lists active tenants for administrative users.
    pub async fn list_tenants(&self, actor: &UserIdentity) -> AppResult<Vec<TenantSummary>> {
        self.require_matrix_admin(actor).await?;
        self.directory.list_tenants().await
    }

    /// Lists tenant users with search and pagination.
    pub async fn list_tenant_users(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        query: TenantUserQuery,
    ) -> AppResult<TenantUserPage> {
        self.require_matrix_admin(actor).await?;
        self.directory
            .list_tenant_users(tenant_id, normalize_query(query))
            .await
    }

    /// Returns one user's membership, overrides, and resolved catalog.
    ///
    /// A missing membership surfaces as `AppError::NotFound`; the page
    /// layer degrades that section instead of crashing.
    pub async fn user_detail(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> AppResult<UserPermissionDetail> {
        self.require_matrix_admin(actor).await?;

        let detail = self.directory.get_user_detail(tenant_id, user_id).await?;
        let cells = resolve_catalog(&detail.user.role, &detail.overrides);

        Ok(UserPermissionDetail { detail, cells })
    }

    /// Resolves a single cell for one user, used as the base state when a
    /// matrix cell is toggled.
    pub async fn resolve_cell(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        user_id: UserId,
        permission: PermissionKey,
    ) -> AppResult<EffectivePermission> {
        self.require_matrix_admin(actor).await?;

        let detail = self.directory.get_user_detail(tenant_id, user_id).await?;
        let indexed = overrides_by_key(&detail.overrides);

        Ok(resolve(&detail.user.role, &indexed, permission))
    }

    /// Builds the matrix read payload: catalog, one page of users, and the
    /// resolved catalog per listed user.
    ///
    /// Resolution is sequential and isolated per user: a failed overrides
    /// read is logged and replaced with an empty cell list so one broken
    /// row never hides the rest of the tenant.
    pub async fn matrix(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        query: TenantUserQuery,
    ) -> AppResult<PermissionMatrix> {
        self.require_matrix_admin(actor).await?;

        let users = self
            .directory
            .list_tenant_users(tenant_id, normalize_query(query))
            .await?;

        let mut cells = BTreeMap::new();
        for user in &users.users {
            match self.directory.list_overrides(tenant_id, user.user_id).await {
                Ok(overrides) => {
                    cells.insert(user.user_id, resolve_catalog(&user.role, &overrides));
                }
                Err(error) => {
                    warn!(
                        user_id = %user.user_id,
                        tenant_id = %tenant_id,
                        %error,
                        "failed to resolve permissions for user; substituting empty set"
                    );
                    cells.insert(user.user_id, Vec::new());
                }
            }
        }

        Ok(PermissionMatrix {
            catalog: catalog(),
            users,
            cells,
        })
    }

    /// Applies a staged draft as one atomic batch.
    ///
    /// On success the draft is cleared and one audit event is emitted; the
    /// caller re-fetches resolved permissions rather than replaying the
    /// batch locally. On failure the draft is left untouched for retry.
    pub async fn apply_changes(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        draft: &mut PermissionDraft,
    ) -> AppResult<usize> {
        self.require_matrix_admin(actor).await?;

        if draft.is_empty() {
            return Ok(0);
        }

        let change_count = draft.len();
        self.overrides
            .apply_changes(tenant_id, actor.subject(), draft.changes())
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                tenant_id,
                subject: actor.subject().to_owned(),
                action: AuditAction::PermissionChangesApplied,
                resource_type: "permission_override_batch".to_owned(),
                resource_id: tenant_id.to_string(),
                detail: Some(format!("applied {change_count} staged permission changes")),
            })
            .await?;

        draft.discard();
        Ok(change_count)
    }

    /// Returns recent audit entries.
    pub async fn list_audit_log(
        &self,
        actor: &UserIdentity,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.require_matrix_admin(actor).await?;
        self.audit_log_repository
            .list_recent_entries(tenant_id, query)
            .await
    }

    /// Ensures the actor's own effective permissions include
    /// `tenant-management:manage` in the actor's home tenant.
    async fn require_matrix_admin(&self, actor: &UserIdentity) -> AppResult<()> {
        let membership = self
            .directory
            .find_membership_by_subject(actor.tenant_id(), actor.subject())
            .await?
            .ok_or_else(|| {
                AppError::Forbidden(format!(
                    "subject '{}' is not a member of tenant '{}'",
                    actor.subject(),
                    actor.tenant_id()
                ))
            })?;

        if !membership.is_active {
            return Err(AppError::Forbidden(format!(
                "membership for subject '{}' is inactive",
                actor.subject()
            )));
        }

        let overrides = self
            .directory
            .list_overrides(actor.tenant_id(), membership.user_id)
            .await?;
        let gate = PermissionKey::new(Resource::TenantManagement, Action::Manage);
        let cell = resolve(&membership.role, &overrides_by_key(&overrides), gate);

        if cell.state != PermissionState::Allow {
            return Err(AppError::Forbidden(format!(
                "subject '{}' is missing permission '{}'",
                actor.subject(),
                gate
            )));
        }

        Ok(())
    }
}

fn normalize_query(query: TenantUserQuery) -> TenantUserQuery {
    let limit = match query.limit {
        0 => TenantUserQuery::default().limit,
        value => value.min(MAX_PAGE_SIZE),
    };

    TenantUserQuery {
        search: query
            .search
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty()),
        limit,
        offset: query.offset,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use async_trait::async_trait;
    use crewline_core::{AppError, AppResult, TenantId, UserId, UserIdentity};
    use crewline_domain::{
        Action, CellOrigin, DraftChange, OverrideEffect, PermissionDraft, PermissionKey,
        PermissionOverride, PermissionState, Resource, Role, catalog,
    };
    use tokio::sync::Mutex;

    use crate::{
        AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
        DirectoryRepository, PermissionOverrideRepository, TenantSummary, TenantUserPage,
        TenantUserQuery, TenantUserRow, UserDetail,
    };

    use super::PermissionAdminService;

    #[derive(Default)]
    struct FakeDirectoryRepository {
        tenants: Vec<TenantSummary>,
        users: HashMap<TenantId, Vec<TenantUserRow>>,
        overrides: HashMap<(TenantId, UserId), Vec<PermissionOverride>>,
        failing_users: HashSet<UserId>,
    }

    #[async_trait]
    impl DirectoryRepository for FakeDirectoryRepository {
        async fn list_tenants(&self) -> AppResult<Vec<TenantSummary>> {
            Ok(self.tenants.clone())
        }

        async fn list_tenant_users(
            &self,
            tenant_id: TenantId,
            query: TenantUserQuery,
        ) -> AppResult<TenantUserPage> {
            let users = self.users.get(&tenant_id).cloned().unwrap_or_default();
            let total = users.len();
            let users = users
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .collect();
            Ok(TenantUserPage { users, total })
        }

        async fn find_membership_by_subject(
            &self,
            tenant_id: TenantId,
            subject: &str,
        ) -> AppResult<Option<TenantUserRow>> {
            Ok(self
                .users
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
            if self.failing_users.contains(&user_id) {
                return Err(AppError::Internal("override read failed".to_owned()));
            }
            Ok(self
                .overrides
                .get(&(tenant_id, user_id))
                .cloned()
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeOverrideRepository {
        applied: Mutex<Vec<DraftChange>>,
        fail: bool,
    }

    #[async_trait]
    impl PermissionOverrideRepository for FakeOverrideRepository {
        async fn apply_changes(
            &self,
            _tenant_id: TenantId,
            _actor_subject: &str,
            changes: &[DraftChange],
        ) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Internal("batch apply failed".to_owned()));
            }
            self.applied.lock().await.extend_from_slice(changes);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAuditRepository {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditRepository for FakeAuditRepository {
        async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAuditLogRepository;

    #[async_trait]
    impl AuditLogRepository for FakeAuditLogRepository {
        async fn list_recent_entries(
            &self,
            _tenant_id: TenantId,
            _query: AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(Vec::new())
        }
    }

    fn row(subject: &str, role: Role) -> TenantUserRow {
        TenantUserRow {
            user_id: UserId::new(),
            subject: subject.to_owned(),
            email: format!("{subject}@example.com"),
            display_name: None,
            role,
            is_active: true,
        }
    }

    fn actor(tenant_id: TenantId, subject: &str) -> UserIdentity {
        UserIdentity::new(subject, UserId::new(), subject, None, tenant_id)
    }

    struct Fixture {
        tenant_id: TenantId,
        directory: FakeDirectoryRepository,
    }

    impl Fixture {
        fn with_admin(subject: &str) -> Self {
            let tenant_id = TenantId::new();
            let mut directory = FakeDirectoryRepository::default();
            directory
                .users
                .insert(tenant_id, vec![row(subject, Role::HostAdmin)]);
            Self {
                tenant_id,
                directory,
            }
        }

        fn service(
            self,
            overrides: Arc<FakeOverrideRepository>,
            audit: Arc<FakeAuditRepository>,
        ) -> PermissionAdminService {
            PermissionAdminService::new(
                Arc::new(self.directory),
                overrides,
                audit,
                Arc::new(FakeAuditLogRepository),
            )
        }
    }

    #[tokio::test]
    async fn non_admin_actor_is_forbidden() {
        let fixture = {
            let tenant_id = TenantId::new();
            let mut directory = FakeDirectoryRepository::default();
            directory
                .users
                .insert(tenant_id, vec![row("carol", Role::ClientUser)]);
            Fixture {
                tenant_id,
                directory,
            }
        };
        let tenant_id = fixture.tenant_id;
        let service = fixture.service(
            Arc::new(FakeOverrideRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let result = service.list_tenants(&actor(tenant_id, "carol")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn unknown_actor_is_forbidden() {
        let fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let service = fixture.service(
            Arc::new(FakeOverrideRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let result = service.list_tenants(&actor(tenant_id, "mallory")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn matrix_isolates_per_user_resolution_failures() {
        let mut fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let user_one = row("u1", Role::ClientUser);
        let mut user_two = row("u2", Role::ClientUser);
        let user_three = row("u3", Role::HostAdmin);
        user_two.user_id = UserId::new();
        fixture.directory.failing_users.insert(user_two.user_id);
        if let Some(rows) = fixture.directory.users.get_mut(&tenant_id) {
            rows.extend([user_one.clone(), user_two.clone(), user_three.clone()]);
        }

        let service = fixture.service(
            Arc::new(FakeOverrideRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let matrix = service
            .matrix(
                &actor(tenant_id, "alice"),
                tenant_id,
                TenantUserQuery::default(),
            )
            .await;
        assert!(matrix.is_ok());
        let matrix = match matrix {
            Ok(value) => value,
            Err(_) => return,
        };

        assert_eq!(matrix.catalog.len(), catalog().len());
        assert_eq!(
            matrix.cells.get(&user_one.user_id).map(Vec::len),
            Some(catalog().len())
        );
        assert_eq!(matrix.cells.get(&user_two.user_id).map(Vec::len), Some(0));
        assert_eq!(
            matrix.cells.get(&user_three.user_id).map(Vec::len),
            Some(catalog().len())
        );
    }

    #[tokio::test]
    async fn successful_apply_clears_draft_and_audits() {
        let fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let overrides = Arc::new(FakeOverrideRepository::default());
        let audit = Arc::new(FakeAuditRepository::default());
        let service = fixture.service(overrides.clone(), audit.clone());

        let mut draft = PermissionDraft::new();
        let staged = draft.toggle(
            UserId::new(),
            PermissionKey::new(Resource::Jobs, Action::View),
            PermissionState::None,
        );
        assert!(staged.is_ok());

        let applied = service
            .apply_changes(&actor(tenant_id, "alice"), tenant_id, &mut draft)
            .await;
        assert_eq!(applied.ok(), Some(1));
        assert!(draft.is_empty());
        assert_eq!(overrides.applied.lock().await.len(), 1);

        let events = audit.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].detail.as_deref(),
            Some("applied 1 staged permission changes")
        );
    }

    #[tokio::test]
    async fn failed_apply_preserves_draft() {
        let fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let overrides = Arc::new(FakeOverrideRepository {
            fail: true,
            ..FakeOverrideRepository::default()
        });
        let audit = Arc::new(FakeAuditRepository::default());
        let service = fixture.service(overrides, audit.clone());

        let mut draft = PermissionDraft::new();
        let _ = draft.toggle(
            UserId::new(),
            PermissionKey::new(Resource::Jobs, Action::View),
            PermissionState::None,
        );
        let before = draft.clone();

        let result = service
            .apply_changes(&actor(tenant_id, "alice"), tenant_id, &mut draft)
            .await;
        assert!(result.is_err());
        assert_eq!(draft, before);
        assert!(audit.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_apply_is_a_no_op() {
        let fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let overrides = Arc::new(FakeOverrideRepository::default());
        let service = fixture.service(overrides.clone(), Arc::new(FakeAuditRepository::default()));

        let mut draft = PermissionDraft::new();
        let applied = service
            .apply_changes(&actor(tenant_id, "alice"), tenant_id, &mut draft)
            .await;
        assert_eq!(applied.ok(), Some(0));
        assert!(overrides.applied.lock().await.is_empty());
    }

    #[tokio::test]
    async fn user_detail_surfaces_missing_membership() {
        let fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let service = fixture.service(
            Arc::new(FakeOverrideRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let result = service
            .user_detail(&actor(tenant_id, "alice"), tenant_id, UserId::new())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn override_supremacy_flows_through_user_detail() {
        let mut fixture = Fixture::with_admin("alice");
        let tenant_id = fixture.tenant_id;
        let user = row("bob", Role::ClientUser);
        let denied = PermissionKey::new(Resource::WorkRequests, Action::View);
        fixture.directory.overrides.insert(
            (tenant_id, user.user_id),
            vec![PermissionOverride {
                permission: denied,
                effect: OverrideEffect::Deny,
            }],
        );
        if let Some(rows) = fixture.directory.users.get_mut(&tenant_id) {
            rows.push(user.clone());
        }
        let service = fixture.service(
            Arc::new(FakeOverrideRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let detail = service
            .user_detail(&actor(tenant_id, "alice"), tenant_id, user.user_id)
            .await;
        assert!(detail.is_ok());
        let Ok(detail) = detail else { return };

        let cell = detail
            .cells
            .iter()
            .find(|cell| cell.permission == denied)
            .cloned();
        assert_eq!(
            cell.map(|cell| (cell.state, cell.origin)),
            Some((PermissionState::Deny, CellOrigin::Override))
        );
    }
}
