//! Transaction pool (mempool) for pending transactions
//!
//! Entries are kept in arrival order and tagged with a sequence number. A
//! mining snapshot remembers the sequence numbers it took, so completing the
//! block removes exactly those entries and leaves anything submitted during
//! the search pending for the next block.

use crate::core::Transaction;
use std::collections::{HashSet, VecDeque};

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// Admission order
    pub sequence: u64,
    /// The transaction
    pub tx: Transaction,
    /// When the transaction was added (Unix timestamp)
    pub added_time: i64,
}

/// Transactions taken for one mining attempt
#[derive(Debug, Clone, Default)]
pub struct MempoolSnapshot {
    pub transactions: Vec<Transaction>,
    sequences: Vec<u64>,
}

impl MempoolSnapshot {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }
}

/// Mempool statistics
#[derive(Debug, Clone, PartialEq)]
pub struct MempoolStats {
    pub tx_count: usize,
    pub oldest_added: Option<i64>,
    pub next_sequence: u64,
}

/// Memory pool for pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    entries: VecDeque<MempoolEntry>,
    next_sequence: u64,
}

impl Mempool {
    /// Create a new mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction, returning its sequence number
    pub fn add_transaction(&mut self, tx: Transaction) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_back(MempoolEntry {
            sequence,
            tx,
            added_time: chrono::Utc::now().timestamp(),
        });
        sequence
    }

    /// Take up to `limit` transactions in arrival order without removing them
    pub fn snapshot(&self, limit: usize) -> MempoolSnapshot {
        let (transactions, sequences) = self
            .entries
            .iter()
            .take(limit)
            .map(|e| (e.tx.clone(), e.sequence))
            .unzip();

        MempoolSnapshot {
            transactions,
            sequences,
        }
    }

    /// Remove exactly the entries a snapshot took
    pub fn remove_snapshot(&mut self, snapshot: &MempoolSnapshot) -> usize {
        let taken: HashSet<u64> = snapshot.sequences.iter().copied().collect();
        let before = self.entries.len();
        self.entries.retain(|e| !taken.contains(&e.sequence));
        before - self.entries.len()
    }

    /// Remove transactions that are now in a block, by identity hash
    pub fn remove_transactions(&mut self, tx_hashes: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !tx_hashes.contains(&e.tx.hash()));
        before - self.entries.len()
    }

    /// Check if a transaction with this hash is pending
    pub fn contains(&self, tx_hash: &str) -> bool {
        self.entries.iter().any(|e| e.tx.hash() == tx_hash)
    }

    /// Pending transactions in arrival order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.entries.iter().map(|e| e.tx.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get mempool statistics
    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            tx_count: self.entries.len(),
            oldest_added: self.entries.front().map(|e| e.added_time),
            next_sequence: self.next_sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::record;
    use serde_json::Value;

    fn create_tx(n: u64) -> Transaction {
        Transaction::new(
            vec![record([("amount", Value::from(n))])],
            vec![record([
                ("address", Value::from("addr1")),
                ("amount", Value::from(n)),
            ])],
            None,
        )
    }

    #[test]
    fn test_add_and_order() {
        let mut mempool = Mempool::new();
        let a = create_tx(1);
        let b = create_tx(2);

        assert_eq!(mempool.add_transaction(a.clone()), 0);
        assert_eq!(mempool.add_transaction(b.clone()), 1);
        assert_eq!(mempool.transactions(), vec![a.clone(), b]);
        assert!(mempool.contains(&a.hash()));
    }

    #[test]
    fn test_snapshot_removes_only_taken_entries() {
        let mut mempool = Mempool::new();
        mempool.add_transaction(create_tx(1));
        mempool.add_transaction(create_tx(2));

        let snapshot = mempool.snapshot(10);
        assert_eq!(snapshot.len(), 2);

        let late = create_tx(3);
        mempool.add_transaction(late.clone());

        assert_eq!(mempool.remove_snapshot(&snapshot), 2);
        assert_eq!(mempool.transactions(), vec![late]);
    }

    #[test]
    fn test_snapshot_respects_limit() {
        let mut mempool = Mempool::new();
        for n in 0..5 {
            mempool.add_transaction(create_tx(n));
        }

        let snapshot = mempool.snapshot(2);
        assert_eq!(snapshot.len(), 2);
        mempool.remove_snapshot(&snapshot);
        assert_eq!(mempool.len(), 3);
    }

    #[test]
    fn test_identical_duplicate_survives_snapshot() {
        let mut mempool = Mempool::new();
        let tx = create_tx(1);
        mempool.add_transaction(tx.clone());
        let snapshot = mempool.snapshot(10);
        mempool.add_transaction(tx.clone());

        mempool.remove_snapshot(&snapshot);
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_remove_by_hash_and_stats() {
        let mut mempool = Mempool::new();
        let tx = create_tx(1);
        mempool.add_transaction(tx.clone());
        mempool.add_transaction(create_tx(2));

        let hashes: HashSet<String> = [tx.hash()].into_iter().collect();
        assert_eq!(mempool.remove_transactions(&hashes), 1);

        let stats = mempool.stats();
        assert_eq!(stats.tx_count, 1);
        assert_eq!(stats.next_sequence, 2);
    }
}
