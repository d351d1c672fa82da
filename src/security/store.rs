//! Storage for executed transaction identities
//!
//! The security model only needs set semantics with an atomic
//! check-then-insert, so the backing structure is swappable.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;

/// Set of transaction identity hashes that have been accepted for execution
pub trait ExecutedTxStore: Send + Sync + fmt::Debug {
    /// Record `tx_id` if absent; true when this call inserted it
    ///
    /// Must be atomic: two racing calls with the same id cannot both
    /// return true.
    fn insert_if_absent(&self, tx_id: &str) -> bool;

    fn contains(&self, tx_id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded in-memory store
#[derive(Debug, Default)]
pub struct InMemoryTxIdStore {
    ids: RwLock<HashSet<String>>,
}

impl InMemoryTxIdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutedTxStore for InMemoryTxIdStore {
    fn insert_if_absent(&self, tx_id: &str) -> bool {
        if self.ids.read().contains(tx_id) {
            return false;
        }
        // Re-checked by `insert` under the write lock
        self.ids.write().insert(tx_id.to_string())
    }

    fn contains(&self, tx_id: &str) -> bool {
        self.ids.read().contains(tx_id)
    }

    fn len(&self) -> usize {
        self.ids.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_once() {
        let store = InMemoryTxIdStore::new();
        assert!(store.is_empty());
        assert!(store.insert_if_absent("abc"));
        assert!(!store.insert_if_absent("abc"));
        assert!(store.contains("abc"));
        assert!(!store.contains("def"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_racing_inserts_admit_one() {
        let store = Arc::new(InMemoryTxIdStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert_if_absent("same-id"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
