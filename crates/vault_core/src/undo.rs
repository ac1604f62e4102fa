//! Undo/redo on top of snapshots.

use crate::vault::{Snapshot, Vault};
use std::collections::VecDeque;

/// Past and future snapshot stacks.
///
/// Call [`UndoHistory::checkpoint`] before each user-visible mutation.
/// Undo and redo go through [`Vault::restore`], so listeners see them as
/// ordinary changes.
///
/// ```rust
/// use vault_core::{Entity, EntityType, UndoHistory, Vault};
///
/// let mut vault = Vault::default();
/// let mut history = UndoHistory::default();
///
/// history.checkpoint(&vault);
/// vault.add(Entity::new("r1", EntityType::Record), None).unwrap();
///
/// assert!(history.undo(&mut vault));
/// assert!(vault.get("r1").is_none());
/// assert!(history.redo(&mut vault));
/// assert!(vault.get("r1").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct UndoHistory {
    past: VecDeque<Snapshot>,
    future: Vec<Snapshot>,
    limit: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::with_limit(100)
    }
}

impl UndoHistory {
    /// Creates a history keeping at most `limit` undo steps.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit,
        }
    }

    /// Records the vault's current version as an undo point.
    ///
    /// Clears the redo stack.
    pub fn checkpoint(&mut self, vault: &Vault) {
        if self.limit == 0 {
            return;
        }
        if self.past.len() == self.limit {
            self.past.pop_front();
        }
        self.past.push_back(vault.snapshot());
        self.future.clear();
    }

    /// Steps back one checkpoint. Returns `false` when there is none.
    pub fn undo(&mut self, vault: &mut Vault) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        self.future.push(vault.snapshot());
        vault.restore(previous);
        true
    }

    /// Re-applies one undone step. Returns `false` when there is none.
    pub fn redo(&mut self, vault: &mut Vault) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        self.past.push_back(vault.snapshot());
        vault.restore(next);
        true
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undo steps held.
    pub fn depth(&self) -> usize {
        self.past.len()
    }

    /// Drops every undo and redo step.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::registry::EntityType;

    fn record(id: &str) -> Entity {
        Entity::new(id, EntityType::Record)
    }

    #[test]
    fn undo_then_redo() {
        let mut vault = Vault::default();
        let mut history = UndoHistory::default();

        for id in ["r1", "r2", "r3"] {
            history.checkpoint(&vault);
            vault.add(record(id), None).unwrap();
        }
        let finished = vault.snapshot();

        while history.undo(&mut vault) {}
        assert!(vault.state().is_empty());
        assert!(!history.can_undo());

        while history.redo(&mut vault) {}
        assert_eq!(vault.snapshot(), finished);
        assert!(!history.can_redo());
    }

    #[test]
    fn checkpoint_clears_redo() {
        let mut vault = Vault::default();
        let mut history = UndoHistory::default();
        history.checkpoint(&vault);
        vault.add(record("r1"), None).unwrap();
        history.undo(&mut vault);
        assert!(history.can_redo());

        history.checkpoint(&vault);
        assert!(!history.can_redo());
    }

    #[test]
    fn limit_drops_oldest() {
        let mut vault = Vault::default();
        let mut history = UndoHistory::with_limit(2);
        for id in ["r1", "r2", "r3"] {
            history.checkpoint(&vault);
            vault.add(record(id), None).unwrap();
        }
        assert_eq!(history.depth(), 2);
        while history.undo(&mut vault) {}
        assert!(vault.get("r1").is_some());
        assert!(vault.get("r2").is_none());
    }

    #[test]
    fn empty_history_is_noop() {
        let mut vault = Vault::default();
        let mut history = UndoHistory::with_limit(0);
        history.checkpoint(&vault);
        assert!(!history.undo(&mut vault));
        assert!(!history.redo(&mut vault));
        assert_eq!(vault.latest_sequence(), 0);
    }
}
