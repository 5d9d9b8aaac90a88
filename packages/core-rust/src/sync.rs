//! Reconciliation of a locally cached list with incremental remote changes.
//!
//! Clients keep a cached copy of the workshop list and periodically ask for
//! records modified after their cursor. [`reconcile`] merges the two by key:
//!
//! - the copy with the greater `last_modified` wins, ties keep the cached copy;
//! - a tombstone removes the key (and beats older live copies in the same batch);
//! - output is sorted newest first, ties broken by key.

use std::collections::HashMap;

use crate::workshop::{Workshop, WorkshopStatus};

/// A record that can be merged by key and modification time.
pub trait Versioned {
    fn key(&self) -> &str;
    fn last_modified(&self) -> u64;
    /// Deleted records are delivered as tombstones so caches can drop them.
    fn is_tombstone(&self) -> bool {
        false
    }
}

impl Versioned for Workshop {
    fn key(&self) -> &str {
        &self.id
    }

    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    fn is_tombstone(&self) -> bool {
        self.status == WorkshopStatus::Archived
    }
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    /// Live records, newest first.
    pub items: Vec<T>,
    /// Highest `last_modified` seen; the next `since` value.
    pub cursor: u64,
    /// Number of changes that altered the cache.
    pub applied: usize,
}

enum Slot<T> {
    Live(T),
    Removed(u64),
}

impl<T: Versioned> Slot<T> {
    fn stamp(&self) -> u64 {
        match self {
            Slot::Live(item) => item.last_modified(),
            Slot::Removed(at) => *at,
        }
    }
}

/// Merges `changes` into `cached`.
#[must_use]
pub fn reconcile<T: Versioned>(cached: Vec<T>, changes: Vec<T>) -> Reconciled<T> {
    let mut slots: HashMap<String, Slot<T>> = HashMap::with_capacity(cached.len());
    let mut cursor = 0;

    for item in cached {
        cursor = cursor.max(item.last_modified());
        let key = item.key().to_string();
        let superseded = slots
            .get(&key)
            .is_some_and(|existing| existing.stamp() >= item.last_modified());
        if !superseded {
            slots.insert(key, Slot::Live(item));
        }
    }

    let mut applied = 0;
    for change in changes {
        let stamp = change.last_modified();
        cursor = cursor.max(stamp);
        let key = change.key().to_string();

        let known = slots.get(&key);
        if known.is_some_and(|slot| slot.stamp() >= stamp) {
            continue;
        }
        let was_live = matches!(known, Some(Slot::Live(_)));

        if change.is_tombstone() {
            if was_live {
                applied += 1;
            }
            slots.insert(key, Slot::Removed(stamp));
        } else {
            applied += 1;
            slots.insert(key, Slot::Live(change));
        }
    }

    let mut items: Vec<T> = slots
        .into_values()
        .filter_map(|slot| match slot {
            Slot::Live(item) => Some(item),
            Slot::Removed(_) => None,
        })
        .collect();
    items.sort_by(|a, b| {
        b.last_modified()
            .cmp(&a.last_modified())
            .then_with(|| a.key().cmp(b.key()))
    });

    Reconciled {
        items,
        cursor,
        applied,
    }
}
