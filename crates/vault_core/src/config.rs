//! Vault configuration.

/// What to do when a trashed entity's target parent no longer exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanRestorePolicy {
    /// Reinstate the entity unlinked and report it as detached.
    #[default]
    Detach,
    /// Fail the restore and leave the entry in the trash.
    Reject,
}

/// Configuration for a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Whether `update` repairs a drifted type index instead of failing.
    pub heal_index_drift: bool,

    /// Behaviour of restore when the target parent is gone.
    pub orphan_restore: OrphanRestorePolicy,

    /// Whether `move_entity` refuses to place an entity beneath itself.
    pub reject_move_cycles: bool,

    /// Number of change records kept for polling.
    pub max_history: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            heal_index_drift: true,
            orphan_restore: OrphanRestorePolicy::Detach,
            reject_move_cycles: false,
            max_history: 1024,
        }
    }
}

impl VaultConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether index drift is repaired on update.
    #[must_use]
    pub const fn heal_index_drift(mut self, value: bool) -> Self {
        self.heal_index_drift = value;
        self
    }

    /// Sets the orphaned restore policy.
    #[must_use]
    pub const fn orphan_restore(mut self, policy: OrphanRestorePolicy) -> Self {
        self.orphan_restore = policy;
        self
    }

    /// Sets whether moves are checked for ownership cycles.
    #[must_use]
    pub const fn reject_move_cycles(mut self, value: bool) -> Self {
        self.reject_move_cycles = value;
        self
    }

    /// Sets the change history length.
    #[must_use]
    pub const fn max_history(mut self, len: usize) -> Self {
        self.max_history = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = VaultConfig::default();
        assert!(config.heal_index_drift);
        assert!(!config.reject_move_cycles);
        assert_eq!(config.orphan_restore, OrphanRestorePolicy::Detach);
        assert_eq!(config.max_history, 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = VaultConfig::new()
            .heal_index_drift(false)
            .orphan_restore(OrphanRestorePolicy::Reject)
            .reject_move_cycles(true)
            .max_history(8);

        assert!(!config.heal_index_drift);
        assert!(config.reject_move_cycles);
        assert_eq!(config.orphan_restore, OrphanRestorePolicy::Reject);
        assert_eq!(config.max_history, 8);
    }
}
