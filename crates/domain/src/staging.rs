use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crewline_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};

use crate::effective::{CellOrigin, EffectivePermission, PermissionState};
use crate::permission::PermissionKey;

/// Upper bound on the staged change log. Bulk actions on large catalogs go
/// through the same toggle-and-log mechanism as single clicks, so the log
/// is capped instead of accumulating unbounded batches.
pub const MAX_STAGED_CHANGES: usize = 5_000;

/// Returns the draft-map key for one matrix cell.
#[must_use]
pub fn cell_key(user_id: UserId, permission: PermissionKey) -> String {
    format!("{user_id}:{permission}")
}

/// One staged permission-state transition, recorded in toggle order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftChange {
    /// User the change applies to.
    pub user_id: UserId,
    /// Permission being changed.
    pub permission: PermissionKey,
    /// Displayed state before the change.
    pub old_state: PermissionState,
    /// Target state after the change.
    pub new_state: PermissionState,
    /// When the change was staged.
    pub staged_at: DateTime<Utc>,
}

/// Uncommitted permission changes staged by one admin session.
///
/// Two structures cooperate: a draft map holding the latest `allow`/`deny`
/// value per cell for rendering (a `none` target removes the entry, so the
/// cell renders from its resolved base again), and an append-only change
/// log keeping every toggle as an audit trail until the batch is applied
/// or discarded. Nothing here touches the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    values: BTreeMap<String, PermissionState>,
    changes: Vec<DraftChange>,
}

impl PermissionDraft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the staged value for a cell, if any.
    #[must_use]
    pub fn staged_value(&self, user_id: UserId, permission: PermissionKey) -> Option<PermissionState> {
        self.values.get(&cell_key(user_id, permission)).copied()
    }

    /// Returns the state a cell currently displays: the staged draft value
    /// when present, otherwise the resolved base state.
    #[must_use]
    pub fn displayed_state(
        &self,
        user_id: UserId,
        permission: PermissionKey,
        base: PermissionState,
    ) -> PermissionState {
        self.staged_value(user_id, permission).unwrap_or(base)
    }

    /// Cycles one cell through `allow -> deny -> none -> allow`, starting
    /// from its displayed state, and logs the transition.
    pub fn toggle(
        &mut self,
        user_id: UserId,
        permission: PermissionKey,
        base: PermissionState,
    ) -> AppResult<PermissionState> {
        let current = self.displayed_state(user_id, permission, base);
        let target = current.next();
        self.record(user_id, permission, current, target)?;
        Ok(target)
    }

    /// Stages an explicit target state for one cell. A no-op target (cell
    /// already displays it) stages nothing and logs nothing.
    pub fn stage(
        &mut self,
        user_id: UserId,
        permission: PermissionKey,
        base: PermissionState,
        target: PermissionState,
    ) -> AppResult<PermissionState> {
        let current = self.displayed_state(user_id, permission, base);
        if current != target {
            self.record(user_id, permission, current, target)?;
        }
        Ok(target)
    }

    /// Stages `allow` for every given cell. Returns how many changed.
    pub fn grant_all(
        &mut self,
        user_id: UserId,
        cells: &[EffectivePermission],
    ) -> AppResult<usize> {
        self.stage_all(user_id, cells, |_| Some(PermissionState::Allow))
    }

    /// Stages `deny` for every given cell. Returns how many changed.
    pub fn deny_all(&mut self, user_id: UserId, cells: &[EffectivePermission]) -> AppResult<usize> {
        self.stage_all(user_id, cells, |_| Some(PermissionState::Deny))
    }

    /// Stages removal of every override-origin cell, reverting those cells
    /// to their role-derived base. Returns how many changed.
    pub fn clear_overrides(
        &mut self,
        user_id: UserId,
        cells: &[EffectivePermission],
    ) -> AppResult<usize> {
        self.stage_all(user_id, cells, |cell| {
            (cell.origin == CellOrigin::Override).then_some(PermissionState::None)
        })
    }

    /// Stages removal of a single override: the cell falls back to its
    /// role-derived base on apply.
    pub fn revert(
        &mut self,
        user_id: UserId,
        permission: PermissionKey,
        base: PermissionState,
    ) -> AppResult<PermissionState> {
        self.stage(user_id, permission, base, PermissionState::None)
    }

    /// Clears the draft map and the change log. No backend call, idempotent.
    pub fn discard(&mut self) {
        self.values.clear();
        self.changes.clear();
    }

    /// Returns whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of logged changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns the ordered change log.
    #[must_use]
    pub fn changes(&self) -> &[DraftChange] {
        self.changes.as_slice()
    }

    /// Returns the draft map of latest staged values per cell.
    #[must_use]
    pub fn staged_values(&self) -> &BTreeMap<String, PermissionState> {
        &self.values
    }

    fn stage_all(
        &mut self,
        user_id: UserId,
        cells: &[EffectivePermission],
        target_for: impl Fn(&EffectivePermission) -> Option<PermissionState>,
    ) -> AppResult<usize> {
        let mut staged = 0;
        for cell in cells {
            let Some(target) = target_for(cell) else {
                continue;
            };
            let current = self.displayed_state(user_id, cell.permission, cell.state);
            if current != target {
                self.record(user_id, cell.permission, current, target)?;
                staged += 1;
            }
        }

        Ok(staged)
    }

    fn record(
        &mut self,
        user_id: UserId,
        permission: PermissionKey,
        old_state: PermissionState,
        new_state: PermissionState,
    ) -> AppResult<()> {
        if self.changes.len() >= MAX_STAGED_CHANGES {
            return Err(AppError::Validation(format!(
                "draft change limit of {MAX_STAGED_CHANGES} reached; apply or discard the current batch"
            )));
        }

        self.changes.push(DraftChange {
            user_id,
            permission,
            old_state,
            new_state,
            staged_at: Utc::now(),
        });

        let key = cell_key(user_id, permission);
        match new_state {
            PermissionState::None => {
                self.values.remove(&key);
            }
            value => {
                self.values.insert(key, value);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crewline_core::UserId;

    use crate::effective::{CellOrigin, EffectivePermission, PermissionState};
    use crate::permission::{Action, PermissionKey, Resource};

    use super::PermissionDraft;

    fn key() -> PermissionKey {
        PermissionKey::new(Resource::Timecards, Action::View)
    }

    #[test]
    fn toggle_cycles_allow_deny_none() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();

        let first = draft.toggle(user_id, key(), PermissionState::None);
        let second = draft.toggle(user_id, key(), PermissionState::None);
        let third = draft.toggle(user_id, key(), PermissionState::None);
        let fourth = draft.toggle(user_id, key(), PermissionState::None);

        assert_eq!(first.ok(), Some(PermissionState::Allow));
        assert_eq!(second.ok(), Some(PermissionState::Deny));
        assert_eq!(third.ok(), Some(PermissionState::None));
        assert_eq!(fourth.ok(), Some(PermissionState::Allow));
        assert_eq!(draft.len(), 4);
    }

    #[test]
    fn none_target_removes_draft_entry() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();

        let _ = draft.toggle(user_id, key(), PermissionState::None);
        assert_eq!(
            draft.staged_value(user_id, key()),
            Some(PermissionState::Allow)
        );

        let _ = draft.toggle(user_id, key(), PermissionState::None);
        let _ = draft.toggle(user_id, key(), PermissionState::None);
        assert_eq!(draft.staged_value(user_id, key()), None);
        // The log keeps the full trail even after the map entry is gone.
        assert_eq!(draft.len(), 3);
    }

    #[test]
    fn discard_is_idempotent() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();
        let _ = draft.toggle(user_id, key(), PermissionState::None);

        draft.discard();
        draft.discard();

        assert!(draft.is_empty());
        assert!(draft.staged_values().is_empty());
    }

    #[test]
    fn stage_skips_cells_already_at_target() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();

        let staged = draft.stage(
            user_id,
            key(),
            PermissionState::Allow,
            PermissionState::Allow,
        );
        assert_eq!(staged.ok(), Some(PermissionState::Allow));
        assert!(draft.is_empty());
    }

    #[test]
    fn grant_all_stages_only_non_allowed_cells() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();
        let cells = vec![
            EffectivePermission {
                permission: PermissionKey::new(Resource::Jobs, Action::View),
                state: PermissionState::Allow,
                origin: CellOrigin::Role,
                role_names: vec!["program_manager".to_owned()],
            },
            EffectivePermission {
                permission: PermissionKey::new(Resource::Jobs, Action::Manage),
                state: PermissionState::None,
                origin: CellOrigin::None,
                role_names: Vec::new(),
            },
        ];

        let staged = draft.grant_all(user_id, &cells);
        assert_eq!(staged.ok(), Some(1));
        assert_eq!(
            draft.staged_value(user_id, PermissionKey::new(Resource::Jobs, Action::Manage)),
            Some(PermissionState::Allow)
        );
    }

    #[test]
    fn clear_overrides_targets_override_cells_only() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();
        let cells = vec![
            EffectivePermission {
                permission: PermissionKey::new(Resource::Reporting, Action::View),
                state: PermissionState::Deny,
                origin: CellOrigin::Override,
                role_names: Vec::new(),
            },
            EffectivePermission {
                permission: PermissionKey::new(Resource::Reporting, Action::Create),
                state: PermissionState::Allow,
                origin: CellOrigin::Role,
                role_names: vec!["client_user".to_owned()],
            },
        ];

        let staged = draft.clear_overrides(user_id, &cells);
        assert_eq!(staged.ok(), Some(1));
        assert_eq!(draft.len(), 1);
        assert_eq!(
            draft.changes()[0].permission,
            PermissionKey::new(Resource::Reporting, Action::View)
        );
        assert_eq!(draft.changes()[0].new_state, PermissionState::None);
    }

    #[test]
    fn revert_stages_none_for_an_overridden_cell() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();

        let staged = draft.revert(user_id, key(), PermissionState::Deny);
        assert_eq!(staged.ok(), Some(PermissionState::None));
        assert_eq!(draft.len(), 1);
        assert_eq!(draft.changes()[0].old_state, PermissionState::Deny);
        assert_eq!(draft.staged_value(user_id, key()), None);
    }

    #[test]
    fn change_log_is_capped() {
        let mut draft = PermissionDraft::new();
        let user_id = UserId::new();

        for _ in 0..super::MAX_STAGED_CHANGES {
            assert!(draft.toggle(user_id, key(), PermissionState::None).is_ok());
        }

        assert!(draft.toggle(user_id, key(), PermissionState::None).is_err());
        assert_eq!(draft.len(), super::MAX_STAGED_CHANGES);
    }
}
