//! Change feed for observing applied mutations.
//!
//! The feed serves two kinds of observers:
//! - listeners, called synchronously after every successful mutation with
//!   the new state (undo stacks, re-rendering, autosave);
//! - pollers, reading the bounded change history from a sequence cursor.
//!
//! # Usage
//!
//! ```rust
//! use vault_core::{Change, Vault};
//!
//! let mut vault = Vault::default();
//! let sub = vault.subscribe(|event| {
//!     println!("#{} {:?} ({} entities)", event.sequence, event.change, event.state.len());
//! });
//! vault.reset();
//! vault.unsubscribe(sub);
//!
//! let changes = vault.poll_changes(0, 10);
//! assert_eq!(changes[0].change, Change::Reset);
//! ```

use crate::id::EntityId;
use crate::state::FlatState;
use std::collections::VecDeque;
use std::fmt;

/// What a successful mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// State replaced by a freshly normalized tree.
    Loaded {
        /// Number of entities loaded.
        entities: usize,
        /// Number of skipped nodes.
        skipped: usize,
    },
    /// State re-normalized after external edits.
    Reloaded {
        /// Number of entities loaded.
        entities: usize,
        /// Number of trash entries carried over.
        kept_trash: usize,
    },
    /// State cleared.
    Reset,
    /// An entity was patched.
    Updated {
        /// The patched entity.
        id: EntityId,
    },
    /// An entity (or a whole subtree) was inserted.
    Added {
        /// The inserted entity.
        id: EntityId,
        /// Its owner, if any.
        parent: Option<EntityId>,
    },
    /// An entity and its subtree moved to the trash.
    Trashed {
        /// Every trashed id, the entity's own first.
        ids: Vec<EntityId>,
    },
    /// A trashed subtree was reinstated.
    Restored {
        /// The restored entity.
        id: EntityId,
        /// Its owner after restore, if any.
        parent: Option<EntityId>,
    },
    /// Entities were erased for good.
    Purged {
        /// Every erased id.
        ids: Vec<EntityId>,
    },
    /// The trash was emptied.
    TrashEmptied {
        /// Purged trash entries.
        purged: Vec<EntityId>,
    },
    /// An entity was re-parented.
    Moved {
        /// The moved entity.
        id: EntityId,
        /// Its new owner.
        parent: EntityId,
    },
    /// An owner's child list or a grouping's member list was reordered.
    Reordered {
        /// The parent or grouping.
        parent: EntityId,
    },
    /// A membership edge was added.
    MembershipAdded {
        /// The grouping.
        collection: EntityId,
        /// The member.
        resource: EntityId,
    },
    /// A membership edge was removed.
    MembershipRemoved {
        /// The grouping.
        collection: EntityId,
        /// The former member.
        resource: EntityId,
    },
    /// State replaced by a snapshot.
    SnapshotRestored,
}

/// An entry in the change history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Sequence number of the mutation, starting at 1.
    pub sequence: u64,
    /// What the mutation did.
    pub change: Change,
}

/// What a listener receives after a mutation.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    /// Sequence number of the mutation.
    pub sequence: u64,
    /// What the mutation did.
    pub change: &'a Change,
    /// The state after the mutation.
    pub state: &'a FlatState,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Box<dyn FnMut(&ChangeEvent<'_>)>;

/// Listener registry plus bounded change history.
pub struct ChangeFeed {
    listeners: Vec<(Subscription, Listener)>,
    history: VecDeque<ChangeRecord>,
    max_history: usize,
    sequence: u64,
    next_subscription: u64,
}

impl ChangeFeed {
    /// Creates a feed keeping the last `max_history` records.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            listeners: Vec::new(),
            history: VecDeque::new(),
            max_history,
            sequence: 0,
            next_subscription: 0,
        }
    }

    /// Registers a listener. Listeners are called in subscription order.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent<'_>) + 'static) -> Subscription {
        self.next_subscription += 1;
        let subscription = Subscription(self.next_subscription);
        self.listeners.push((subscription, Box::new(listener)));
        subscription
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(s, _)| *s != subscription);
        self.listeners.len() != before
    }

    /// Records a change and calls every listener with it.
    pub fn emit(&mut self, change: Change, state: &FlatState) -> u64 {
        self.sequence += 1;
        let sequence = self.sequence;
        let event = ChangeEvent {
            sequence,
            change: &change,
            state,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }

        if self.max_history > 0 {
            if self.history.len() == self.max_history {
                self.history.pop_front();
            }
            self.history.push_back(ChangeRecord { sequence, change });
        }
        sequence
    }

    /// Returns records with sequence > `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeRecord> {
        self.history
            .iter()
            .filter(|record| record.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence number of the latest change, 0 before the first.
    pub fn latest_sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of records in history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::with_max_history(1024)
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.listeners.len())
            .field("history", &self.history.len())
            .field("max_history", &self.max_history)
            .field("sequence", &self.sequence)
            .finish()
    }
}
