//! Handler registry
//!
//! Two tables keyed by tag: persistent handlers and one-shot handlers. One
//! `RwLock` guards both. Dispatch never iterates the tables directly; it takes
//! a [`HandlerRegistry::snapshot`] and releases the lock before invoking, so a
//! handler may register or remove handlers while it runs.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use herald_core::EventTag;

use crate::{HandlerEntry, HandlerFn};

type HandlerTable = HashMap<EventTag, Vec<Arc<HandlerEntry>>>;

#[derive(Debug, Default)]
struct HandlerTables {
    persistent: HandlerTable,
    once: HandlerTable,
}

impl HandlerTables {
    fn remove(&mut self, tag: EventTag, entry: &Arc<HandlerEntry>) -> bool {
        // Independent storage: an entry lives in exactly one of the two
        splice(&mut self.persistent, tag, entry) || splice(&mut self.once, tag, entry)
    }
}

fn splice(table: &mut HandlerTable, tag: EventTag, entry: &Arc<HandlerEntry>) -> bool {
    let Some(list) = table.get_mut(&tag) else {
        return false;
    };
    let Some(idx) = list.iter().position(|e| Arc::ptr_eq(e, entry)) else {
        return false;
    };
    list.remove(idx);
    if list.is_empty() {
        table.remove(&tag);
    }
    true
}

/// Registry of handlers by event tag
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    tables: Arc<RwLock<HandlerTables>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    /// Append a handler; insertion order is invocation order
    pub fn register(&self, tag: EventTag, once: bool, callback: Box<HandlerFn>) -> RemoveHandle {
        let entry = HandlerEntry::new(tag, once, callback);
        {
            let mut tables = self.tables.write();
            let table = if once {
                &mut tables.once
            } else {
                &mut tables.persistent
            };
            table.entry(tag).or_default().push(Arc::clone(&entry));
        }
        RemoveHandle {
            target: Some(RemoveTarget {
                tables: Arc::downgrade(&self.tables),
                tag,
                entry: Arc::downgrade(&entry),
            }),
        }
    }

    /// Remove one entry from whichever table holds it. Idempotent.
    pub fn remove(&self, tag: EventTag, entry: &Arc<HandlerEntry>) -> bool {
        self.tables.write().remove(tag, entry)
    }

    /// Entries to invoke for one dispatch of `tag`
    ///
    /// Persistent entries are cloned; one-shot entries are drained in the same
    /// critical section, so each of them is handed out at most once.
    pub fn snapshot(&self, tag: EventTag) -> Vec<Arc<HandlerEntry>> {
        let tables = self.tables.upgradable_read();
        let mut entries = tables.persistent.get(&tag).cloned().unwrap_or_default();

        if tables.once.contains_key(&tag) {
            let mut tables = RwLockUpgradableReadGuard::upgrade(tables);
            if let Some(once) = tables.once.remove(&tag) {
                entries.extend(once);
            }
        }
        entries
    }

    /// Number of handlers waiting on `tag`, persistent and one-shot
    pub fn handler_count(&self, tag: EventTag) -> usize {
        let tables = self.tables.read();
        tables.persistent.get(&tag).map_or(0, Vec::len) + tables.once.get(&tag).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read();
        tables.persistent.is_empty() && tables.once.is_empty()
    }

    /// Drop every handler
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.persistent.clear();
        tables.once.clear();
    }
}

struct RemoveTarget {
    tables: Weak<RwLock<HandlerTables>>,
    tag: EventTag,
    entry: Weak<HandlerEntry>,
}

/// Removes the handler it was returned for
///
/// Removal is not preemptive: an invocation that was already handed out
/// still runs to completion.
#[must_use = "dropping the handle keeps the handler registered"]
pub struct RemoveHandle {
    target: Option<RemoveTarget>,
}

impl RemoveHandle {
    /// A handle that removes nothing, returned for rejected registrations
    pub fn noop() -> Self {
        RemoveHandle { target: None }
    }

    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Remove the handler. Returns whether anything was removed.
    pub fn remove(&self) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        let (Some(tables), Some(entry)) = (target.tables.upgrade(), target.entry.upgrade()) else {
            return false;
        };
        let removed = tables.write().remove(target.tag, &entry);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: EventTag = EventTag::new("MESSAGE_CREATE");
    const OTHER: EventTag = EventTag::new("TYPING_START");

    fn noop() -> Box<HandlerFn> {
        Box::new(|_, _| {})
    }

    #[test]
    fn test_snapshot_persistent_before_once() {
        let registry = HandlerRegistry::new();
        let _a = registry.register(TAG, false, noop());
        let _b = registry.register(TAG, true, noop());
        let _c = registry.register(TAG, false, noop());

        let snapshot = registry.snapshot(TAG);

        assert_eq!(snapshot.len(), 3);
        // Persistent entries first, then one-shot
        assert!(!snapshot[0].is_once());
        assert!(!snapshot[1].is_once());
        assert!(snapshot[2].is_once());
    }

    #[test]
    fn test_once_entries_handed_out_once() {
        let registry = HandlerRegistry::new();
        let _h = registry.register(TAG, true, noop());

        assert_eq!(registry.snapshot(TAG).len(), 1);
        assert!(registry.snapshot(TAG).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_handle_is_idempotent() {
        let registry = HandlerRegistry::new();
        let handle = registry.register(TAG, false, noop());
        let _other = registry.register(TAG, false, noop());

        assert!(handle.remove());
        assert!(!handle.remove());
        assert_eq!(registry.handler_count(TAG), 1);
    }

    #[test]
    fn test_identical_closures_removed_independently() {
        let registry = HandlerRegistry::new();
        let first = registry.register(TAG, false, noop());
        let second = registry.register(TAG, false, noop());

        assert!(second.remove());

        let snapshot = registry.snapshot(TAG);
        assert_eq!(snapshot.len(), 1);
        assert!(first.remove());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_once_entry_leaves_persistent() {
        let registry = HandlerRegistry::new();
        let persistent = registry.register(TAG, false, noop());
        let once = registry.register(TAG, true, noop());

        assert!(once.remove());

        let snapshot = registry.snapshot(TAG);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].is_once());
        assert!(persistent.remove());
    }

    #[test]
    fn test_remove_after_once_fired_is_noop() {
        let registry = HandlerRegistry::new();
        let handle = registry.register(TAG, true, noop());
        drop(registry.snapshot(TAG));
        assert!(!handle.remove());
    }

    #[test]
    fn test_tags_are_isolated() {
        let registry = HandlerRegistry::new();
        let _h = registry.register(TAG, false, noop());
        assert!(registry.snapshot(OTHER).is_empty());
        assert_eq!(registry.handler_count(TAG), 1);
    }

    #[test]
    fn test_handle_outliving_registry() {
        let registry = HandlerRegistry::new();
        let handle = registry.register(TAG, false, noop());
        drop(registry);
        assert!(!handle.remove());
        assert!(RemoveHandle::noop().is_noop());
    }

    #[test]
    fn test_registry_remove_by_entry() {
        let registry = HandlerRegistry::new();
        let _h = registry.register(TAG, false, noop());
        let entry = registry.snapshot(TAG).remove(0);

        assert!(registry.remove(TAG, &entry));
        assert!(!registry.remove(TAG, &entry));
    }

    #[test]
    fn test_concurrent_snapshots_drain_once_exactly_once() {
        let registry = Arc::new(HandlerRegistry::new());
        for _ in 0..32 {
            let _h = registry.register(TAG, true, noop());
        }

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.snapshot(TAG).len())
            })
            .collect();

        let total: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(total, 32);
    }
}
