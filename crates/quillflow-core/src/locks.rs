//! Keyed mutual exclusion.
//!
//! The engine serializes every mutation of one paper on the paper's key and
//! every counter update of one reviewer on the reviewer's key. Locks are
//! taken paper first, reviewer second.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data from a poisoned lock.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One mutex per key, created on first use and kept until pruned.
///
/// ```ignore
/// let slot = locks.slot("paper-1");
/// let _guard = lock(&slot);
/// ```
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `key`.
    pub fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        lock(&self.slots)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the slots of keys `keep` rejects, skipping any slot someone
    /// still holds. Returns how many were dropped.
    pub fn prune(&self, keep: impl Fn(&str) -> bool) -> usize {
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|key, slot| keep(key) || Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                std::thread::spawn(move || {
                    let slot = locks.slot("paper-1");
                    let _g = lock(&slot);
                    let n = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(n, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let a = locks.slot("paper-1");
        let b = locks.slot("paper-2");
        let _ga = lock(&a);
        let _gb = lock(&b);
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_prune_keeps_held_slots() {
        let locks = KeyedLocks::new();
        for key in ["paper-1", "paper-2", "paper-3"] {
            let slot = locks.slot(key);
            let _g = lock(&slot);
        }
        let held = locks.slot("paper-2");
        let guard = lock(&held);

        let dropped = locks.prune(|key| key == "paper-3");
        assert_eq!(dropped, 1);
        assert_eq!(locks.len(), 2);

        drop(guard);
        drop(held);
        assert_eq!(locks.prune(|key| key == "paper-3"), 1);
        assert_eq!(locks.len(), 1);
    }
}
