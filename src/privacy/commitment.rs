//! Hiding commitments to transactions
//!
//! A commitment is `SHA-256(tx_hash || salt)` with a random 32-byte salt.
//! It binds to a transaction without revealing it; the store keeps the
//! salt so the commitment can be opened later.

use crate::core::Transaction;
use crate::crypto::sha256_hex_parts;
use log::debug;
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;

const SALT_LEN: usize = 32;

#[derive(Debug, Default)]
pub struct CommitmentStore {
    salts: RwLock<HashMap<String, [u8; SALT_LEN]>>,
}

impl CommitmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit to a transaction, returning the 64-character hex commitment
    pub fn create_commitment(&self, tx: &Transaction) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let commitment = commit(&tx.hash(), &salt);
        self.salts.write().insert(commitment.clone(), salt);
        debug!("Created commitment {} for transaction {}", commitment, tx.hash());
        commitment
    }

    /// Check that `commitment` was created by this store for `tx`
    pub fn verify_commitment(&self, commitment: &str, tx: &Transaction) -> bool {
        self.salts
            .read()
            .get(commitment)
            .is_some_and(|salt| commit(&tx.hash(), salt) == commitment)
    }

    pub fn len(&self) -> usize {
        self.salts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.salts.read().is_empty()
    }
}

fn commit(tx_hash: &str, salt: &[u8]) -> String {
    sha256_hex_parts(&[tx_hash.as_bytes(), salt])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::tests::sample_tx;
    use crate::crypto::is_hex_digest;

    #[test]
    fn test_commitment_roundtrip() {
        let store = CommitmentStore::new();
        let tx = sample_tx(1);

        let commitment = store.create_commitment(&tx);
        assert!(is_hex_digest(&commitment));
        assert_ne!(commitment, tx.hash());
        assert!(store.verify_commitment(&commitment, &tx));
        assert!(!store.verify_commitment(&commitment, &sample_tx(2)));
    }

    #[test]
    fn test_commitments_are_salted() {
        let store = CommitmentStore::new();
        let tx = sample_tx(1);

        let a = store.create_commitment(&tx);
        let b = store.create_commitment(&tx);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.verify_commitment(&a, &tx));
        assert!(store.verify_commitment(&b, &tx));
    }

    #[test]
    fn test_unknown_commitment() {
        let store = CommitmentStore::new();
        assert!(store.is_empty());
        assert!(!store.verify_commitment(&"0".repeat(64), &sample_tx(1)));
    }
}
