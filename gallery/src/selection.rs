//! Browse / multi-select state machine for the gallery grid.

use photo_store::{DeleteReport, PhotoStore};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Browse,
    /// Ids currently selected. May be empty; the mode only ends on an
    /// explicit exit.
    MultiSelect(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    OpenDetail(String),
    Toggled { id: String, selected: bool },
}

impl SelectionState {
    pub fn is_selecting(&self) -> bool {
        matches!(self, SelectionState::MultiSelect(_))
    }

    pub fn is_selected(&self, id: &str) -> bool {
        match self {
            SelectionState::Browse => false,
            SelectionState::MultiSelect(ids) => ids.contains(id),
        }
    }

    pub fn selected_count(&self) -> usize {
        match self {
            SelectionState::Browse => 0,
            SelectionState::MultiSelect(ids) => ids.len(),
        }
    }

    pub fn selected_ids(&self) -> Vec<String> {
        match self {
            SelectionState::Browse => Vec::new(),
            SelectionState::MultiSelect(ids) => ids.iter().cloned().collect(),
        }
    }

    /// Long press: enters multi-select with `id` selected. Ignored while
    /// already selecting.
    pub fn long_press(&mut self, id: &str) {
        if let SelectionState::Browse = self {
            *self = SelectionState::MultiSelect(BTreeSet::from([id.to_string()]));
            tracing::debug!(id, "entered multi-select");
        }
    }

    pub fn tap(&mut self, id: &str) -> TapOutcome {
        match self {
            SelectionState::Browse => TapOutcome::OpenDetail(id.to_string()),
            SelectionState::MultiSelect(ids) => TapOutcome::Toggled {
                id: id.to_string(),
                selected: toggle(ids, id),
            },
        }
    }

    /// Cancel: discards the selection.
    pub fn exit(&mut self) {
        *self = SelectionState::Browse;
    }

    /// Leaving the screen behaves like cancel.
    pub fn navigate_away(&mut self) {
        self.exit();
    }

    /// Whether a delete confirmation should be offered at all.
    pub fn can_confirm_delete(&self) -> bool {
        self.selected_count() > 0
    }

    /// Deletes every selected id from `store` and returns to browse.
    /// With nothing selected the store is left alone.
    pub fn confirm_delete(&mut self, store: &mut PhotoStore) -> DeleteReport {
        let state = std::mem::take(self);
        match state {
            SelectionState::MultiSelect(ids) if !ids.is_empty() => store.delete_many(ids),
            _ => DeleteReport::default(),
        }
    }

    /// Drops selected ids that no longer exist in `store`.
    pub fn prune(&mut self, store: &PhotoStore) {
        if let SelectionState::MultiSelect(ids) = self {
            ids.retain(|id| store.contains(id));
        }
    }
}

fn toggle(ids: &mut BTreeSet<String>, id: &str) -> bool {
    if ids.remove(id) {
        false
    } else {
        ids.insert(id.to_string());
        true
    }
}
