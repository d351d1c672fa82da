//! Block implementation for the ledger
//!
//! A block is built in two phases. [`Block::new`] fixes the transaction set,
//! merkle root and timestamp with a zero nonce; [`Block::seal`] records the
//! nonce found by the puzzle solver exactly once. Only sealed blocks are
//! appended to a chain.

use crate::core::transaction::Transaction;
use crate::crypto::{calculate_merkle_root, meets_difficulty, sha256_hex_parts};
use crate::mining::PuzzleSolution;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Block errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockError {
    #[error("Block {0} is already sealed")]
    AlreadySealed(u64),
    #[error("Block {0} is not sealed")]
    NotSealed(u64),
    #[error("Solution digest does not match block {0}")]
    SolutionMismatch(u64),
}

/// Hashed block header fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height
    pub index: u64,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of all transactions
    pub merkle_root: String,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Nonce used for proof of compute
    pub nonce: u64,
}

impl BlockHeader {
    /// Bytes the puzzle is solved over: everything but the nonce
    pub fn puzzle_bytes(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}",
            self.index,
            self.previous_hash,
            self.merkle_root,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
        .into_bytes()
    }

    /// SHA-256 of the puzzle bytes followed by the decimal nonce
    pub fn hash(&self) -> String {
        let prefix = self.puzzle_bytes();
        let nonce = self.nonce.to_string();
        sha256_hex_parts(&[prefix.as_slice(), nonce.as_bytes()])
    }
}

/// Informational proof-of-compute annotation attached after mining
///
/// Never re-verified; carried for audit only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeProof {
    pub nonce: u64,
    pub proof: String,
    pub entropy_sample: f64,
}

/// A block in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Transactions in the block, in mining order
    pub transactions: Vec<Transaction>,
    /// Difficulty in force when the block was sealed
    difficulty: u32,
    /// Hash recorded at sealing time
    sealed_hash: Option<String>,
    /// Telemetry attached by the miner
    pub proof_of_compute: Option<ComputeProof>,
}

impl Block {
    /// Create a new unsealed block
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(index, transactions, previous_hash, Utc::now())
    }

    fn with_timestamp(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let merkle_root = Self::calculate_merkle_root(&transactions);

        Self {
            header: BlockHeader {
                index,
                previous_hash,
                merkle_root,
                timestamp,
                nonce: 0,
            },
            transactions,
            difficulty: 0,
            sealed_hash: None,
            proof_of_compute: None,
        }
    }

    /// The fixed genesis block, identical for every chain
    pub fn genesis() -> Self {
        let mut block = Self::with_timestamp(
            0,
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
            DateTime::<Utc>::default(),
        );
        block.sealed_hash = Some(block.hash());
        block
    }

    /// Calculate the merkle root from transactions
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let ids: Vec<String> = transactions.iter().map(Transaction::hash).collect();
        calculate_merkle_root(&ids)
    }

    /// Block height
    pub fn index(&self) -> u64 {
        self.header.index
    }

    pub fn previous_hash(&self) -> &str {
        &self.header.previous_hash
    }

    pub fn merkle_root(&self) -> &str {
        &self.header.merkle_root
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    /// Difficulty recorded at sealing (0 while unsealed)
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Hash of the current header state
    pub fn hash(&self) -> String {
        self.header.hash()
    }

    /// Hash recorded when the block was sealed
    pub fn sealed_hash(&self) -> Option<&str> {
        self.sealed_hash.as_deref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed_hash.is_some()
    }

    /// Record the mining result; a block can be sealed only once
    pub fn seal(&mut self, solution: &PuzzleSolution, difficulty: u32) -> Result<(), BlockError> {
        if self.is_sealed() {
            return Err(BlockError::AlreadySealed(self.index()));
        }

        self.header.nonce = solution.nonce;
        let hash = self.header.hash();
        if hash != solution.digest {
            self.header.nonce = 0;
            return Err(BlockError::SolutionMismatch(self.index()));
        }

        self.difficulty = difficulty;
        self.sealed_hash = Some(hash);
        Ok(())
    }

    /// Attach the informational proof annotation
    pub fn annotate(&mut self, proof: ComputeProof) -> Result<(), BlockError> {
        if !self.is_sealed() {
            return Err(BlockError::NotSealed(self.index()));
        }
        self.proof_of_compute = Some(proof);
        Ok(())
    }

    /// Check the proof of compute against the recorded difficulty
    pub fn is_valid_pow(&self) -> bool {
        self.sealed_hash
            .as_deref()
            .is_some_and(|hash| meets_difficulty(hash, self.difficulty))
    }

    /// Verify the block's merkle root against its transactions
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.header.merkle_root
    }

    /// Verify the recorded hash against the header
    pub fn verify_hash(&self) -> bool {
        self.sealed_hash.as_deref() == Some(self.hash().as_str())
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Position of a transaction in this block, by identity hash
    pub fn position_of(&self, tx_hash: &str) -> Option<usize> {
        self.transactions.iter().position(|tx| tx.hash() == tx_hash)
    }

    /// The reward transaction, if the block carries one
    pub fn reward_tx(&self) -> Option<&Transaction> {
        self.transactions.last().filter(|tx| tx.is_reward())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::transaction::TxRecord;
    use crate::crypto::{sha256_hex, HASH_HEX_LEN};
    use crate::mining::{CancelToken, ProofOfCompute};
    use serde_json::json;

    fn rec(value: serde_json::Value) -> TxRecord {
        value.as_object().cloned().unwrap()
    }

    pub(crate) fn sample_tx(n: u64) -> Transaction {
        Transaction::new(
            vec![rec(json!({"tx_id": format!("input{}", n), "amount": 100}))],
            vec![rec(json!({"address": "addr1", "amount": 100}))],
            None,
        )
    }

    fn mined(index: u64, difficulty: u32) -> Block {
        let mut block = Block::new(index, vec![sample_tx(index)], GENESIS_PREVIOUS_HASH.into());
        let pow = ProofOfCompute::new(difficulty);
        let solution = pow
            .solve_puzzle(&block.header.puzzle_bytes(), &CancelToken::new())
            .unwrap();
        block.seal(&solution, difficulty).unwrap();
        block
    }

    #[test]
    fn test_block_creation() {
        let txs = vec![sample_tx(1)];
        let block = Block::new(1, txs.clone(), GENESIS_PREVIOUS_HASH.into());
        assert_eq!(block.index(), 1);
        assert_eq!(block.transactions, txs);
        assert_eq!(block.previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(block.nonce(), 0);
        assert!(!block.is_sealed());
        assert_eq!(block.hash().len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_genesis_is_fixed() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.index(), 0);
        assert_eq!(a.previous_hash(), "0".repeat(64));
        assert!(a.is_sealed());
        assert!(a.verify_hash());
    }

    #[test]
    fn test_single_transaction_merkle_root() {
        let tx = sample_tx(1);
        let h = tx.hash();
        let block = Block::new(1, vec![tx], GENESIS_PREVIOUS_HASH.into());
        assert_eq!(
            block.merkle_root(),
            sha256_hex(format!("{}{}", h, h).as_bytes())
        );
    }

    #[test]
    fn test_empty_merkle_root() {
        let block = Block::new(1, vec![], GENESIS_PREVIOUS_HASH.into());
        assert_eq!(block.merkle_root(), sha256_hex(b""));
    }

    #[test]
    fn test_hash_stable_until_nonce_changes() {
        let mut block = Block::new(1, vec![sample_tx(1)], GENESIS_PREVIOUS_HASH.into());
        let root = block.merkle_root().to_string();
        let first = block.hash();
        assert_eq!(first, block.hash());

        block.header.nonce = 42;
        assert_ne!(first, block.hash());
        assert_eq!(root, block.merkle_root());
    }

    #[test]
    fn test_seal_once() {
        let mut block = mined(1, 1);
        assert!(block.is_valid_pow());
        assert!(block.verify_hash());
        assert!(block.verify_merkle_root());
        assert_eq!(block.difficulty(), 1);

        let solution = PuzzleSolution {
            nonce: block.nonce(),
            digest: block.hash(),
            attempts: 1,
        };
        assert_eq!(block.seal(&solution, 1), Err(BlockError::AlreadySealed(1)));
    }

    #[test]
    fn test_seal_rejects_foreign_solution() {
        let mut block = Block::new(1, vec![sample_tx(1)], GENESIS_PREVIOUS_HASH.into());
        let solution = PuzzleSolution {
            nonce: 3,
            digest: "0".repeat(64),
            attempts: 4,
        };
        assert_eq!(block.seal(&solution, 1), Err(BlockError::SolutionMismatch(1)));
        assert_eq!(block.nonce(), 0);
        assert!(!block.is_sealed());
    }

    #[test]
    fn test_tamper_detection() {
        let mut block = mined(1, 1);

        block.transactions[0].nonce = block.transactions[0].nonce.wrapping_add(1);
        assert!(!block.verify_merkle_root());

        let mut block = mined(1, 1);
        block.header.nonce += 1;
        assert!(!block.verify_hash());
    }

    #[test]
    fn test_annotate_requires_seal() {
        let proof = ComputeProof {
            nonce: 0,
            proof: String::new(),
            entropy_sample: 0.5,
        };
        let mut unsealed = Block::new(1, vec![], GENESIS_PREVIOUS_HASH.into());
        assert_eq!(unsealed.annotate(proof.clone()), Err(BlockError::NotSealed(1)));

        let mut block = mined(1, 0);
        block.annotate(proof.clone()).unwrap();
        assert_eq!(block.proof_of_compute, Some(proof));
    }

    #[test]
    fn test_position_and_reward() {
        let tx = sample_tx(1);
        let reward = Transaction::reward("miner", 50.0);
        let block = Block::new(
            1,
            vec![tx.clone(), reward.clone()],
            GENESIS_PREVIOUS_HASH.into(),
        );
        assert_eq!(block.position_of(&tx.hash()), Some(0));
        assert_eq!(block.reward_tx(), Some(&reward));
        assert_eq!(block.tx_count(), 2);
    }
}
