//! Blockchain implementation
//!
//! Owns the canonical chain and the mempool. The chain and the mempool sit
//! behind independent locks so transactions can be submitted while a block
//! is being mined; a separate guard keeps mining single-writer. Nothing is
//! committed until a nonce search has succeeded.

use crate::config::{ChainConfig, LedgerConfig};
use crate::core::block::{Block, BlockError, ComputeProof, GENESIS_PREVIOUS_HASH};
use crate::core::transaction::Transaction;
use crate::mining::{
    CancelToken, Mempool, MempoolStats, MiningError, MiningStats, ProofOfCompute,
    TARGET_BLOCK_TIME,
};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;

/// Default mining difficulty (leading zero hex characters)
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Amount credited by each block's reward transaction
pub const BLOCK_REWARD: f64 = 50.0;

/// Violations found by the chain validity check
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainIntegrityError {
    #[error("Chain does not start with the genesis block")]
    GenesisMismatch,
    #[error("Block index mismatch: expected {expected}, found {found}")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("Block {index} links to {found}, expected {expected}")]
    PreviousHashMismatch {
        index: u64,
        expected: String,
        found: String,
    },
    #[error("Block {index} is not sealed")]
    Unsealed { index: u64 },
    #[error("Block {index} recorded hash does not match its header")]
    HashMismatch { index: u64 },
    #[error("Block {index} hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },
    #[error("Block {index} merkle root does not match its transactions")]
    MerkleRootMismatch { index: u64 },
    #[error("Block {index} does not end with a single valid reward")]
    InvalidReward { index: u64 },
    #[error("Block {index} carries malformed transaction {tx_hash}")]
    MalformedTransaction { index: u64, tx_hash: String },
}

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Another mining operation is in progress")]
    MiningInProgress,
    #[error("Mining failed: {0}")]
    Mining(#[from] MiningError),
    #[error("Chain integrity error: {0}")]
    Integrity(#[from] ChainIntegrityError),
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
}

/// Chain statistics
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub mempool: MempoolStats,
    pub difficulty: u32,
    pub latest_hash: String,
}

/// The ledger: an append-only chain of sealed blocks plus the mempool
#[derive(Debug)]
pub struct Blockchain {
    chain: RwLock<Vec<Block>>,
    mempool: Mutex<Mempool>,
    pow: RwLock<ProofOfCompute>,
    mining: Mutex<()>,
    config: ChainConfig,
}

impl Blockchain {
    /// Create a new blockchain with genesis block
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    /// Create a blockchain with custom difficulty
    pub fn with_difficulty(difficulty: u32) -> Self {
        let config = ChainConfig {
            difficulty,
            ..ChainConfig::default()
        };
        Self::with_config(config, TARGET_BLOCK_TIME)
    }

    /// Create a blockchain from the loaded configuration
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::with_config(config.chain.clone(), config.mining.target_block_time_secs)
    }

    pub fn with_config(config: ChainConfig, target_block_time: f64) -> Self {
        let window = config.retarget_interval.max(2) as usize;
        let pow = ProofOfCompute::with_target_block_time(config.difficulty, target_block_time)
            .with_window(window);

        Self {
            chain: RwLock::new(vec![Block::genesis()]),
            mempool: Mutex::new(Mempool::new()),
            pow: RwLock::new(pow),
            mining: Mutex::new(()),
            config,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Always false: the genesis block is present from construction
    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    /// Get blockchain height
    pub fn height(&self) -> u64 {
        self.len().saturating_sub(1) as u64
    }

    /// Get the latest block
    pub fn latest_block(&self) -> Block {
        self.chain.read().last().cloned().unwrap_or_else(Block::genesis)
    }

    /// Get a block by index
    pub fn block(&self, index: u64) -> Option<Block> {
        self.chain.read().get(index as usize).cloned()
    }

    /// Copy of the whole chain
    pub fn blocks(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    /// Transactions waiting for the next block, in arrival order
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.lock().transactions()
    }

    pub fn pending_len(&self) -> usize {
        self.mempool.lock().len()
    }

    /// Current mining difficulty
    pub fn difficulty(&self) -> u32 {
        self.pow.read().difficulty()
    }

    /// Override the difficulty used for the next block
    pub fn set_difficulty(&self, difficulty: u32) {
        let mut pow = self.pow.write();
        *pow = ProofOfCompute::with_target_block_time(difficulty, pow.target_block_time())
            .with_window(self.config.retarget_interval.max(2) as usize);
    }

    pub fn block_reward(&self) -> f64 {
        self.config.block_reward
    }

    /// Whether a mining operation currently holds the guard
    pub fn is_mining(&self) -> bool {
        self.mining.is_locked()
    }

    /// Index of the block containing a transaction
    pub fn find_transaction(&self, tx_hash: &str) -> Option<u64> {
        self.chain
            .read()
            .iter()
            .find(|block| block.position_of(tx_hash).is_some())
            .map(Block::index)
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        let mempool = self.mempool.lock().stats();
        let difficulty = self.difficulty();
        let chain = self.chain.read();

        ChainStats {
            height: chain.len().saturating_sub(1) as u64,
            total_blocks: chain.len() as u64,
            total_transactions: chain.iter().map(|b| b.tx_count() as u64).sum(),
            mempool,
            difficulty,
            latest_hash: tip_hash(&chain),
        }
    }

    // =========================================================================
    // Mempool admission and mining
    // =========================================================================

    /// Append a transaction to the mempool
    ///
    /// Returns false, without raising, when the structure is invalid.
    pub fn add_transaction(&self, tx: Transaction) -> bool {
        if let Err(e) = tx.validate_structure() {
            warn!("Rejected transaction {}: {}", tx.hash(), e);
            return false;
        }

        let tx_hash = tx.hash();
        let sequence = self.mempool.lock().add_transaction(tx);
        debug!("Transaction {} admitted to mempool (#{})", tx_hash, sequence);
        true
    }

    /// Mine the pending transactions into a new block
    pub fn mine_pending_transactions(
        &self,
        reward_address: &str,
    ) -> Result<Option<Block>, BlockchainError> {
        self.mine_pending_transactions_with(reward_address, &CancelToken::new())
    }

    /// Mine the pending transactions, stopping early if `cancel` fires
    ///
    /// Returns `Ok(None)` when the mempool is empty. A cancelled or failed
    /// search leaves the chain and the mempool exactly as they were.
    pub fn mine_pending_transactions_with(
        &self,
        reward_address: &str,
        cancel: &CancelToken,
    ) -> Result<Option<Block>, BlockchainError> {
        let _guard = self
            .mining
            .try_lock()
            .ok_or(BlockchainError::MiningInProgress)?;

        let snapshot = self
            .mempool
            .lock()
            .snapshot(self.config.max_block_transactions);
        if snapshot.is_empty() {
            debug!("No pending transactions to mine");
            return Ok(None);
        }

        let start = Instant::now();

        let mut transactions = snapshot.transactions.clone();
        transactions.push(Transaction::reward(reward_address, self.config.block_reward));

        let (index, previous_hash) = {
            let chain = self.chain.read();
            (chain.len() as u64, tip_hash(&chain))
        };

        let mut block = Block::new(index, transactions, previous_hash);
        let pow = self.pow.read().clone();

        info!(
            "Mining block {} with {} transactions at difficulty {}...",
            index,
            block.tx_count(),
            pow.difficulty()
        );

        let solution = pow
            .solve_puzzle(&block.header.puzzle_bytes(), cancel)
            .inspect_err(|e| warn!("Mining of block {} stopped: {}", index, e))?;

        block.seal(&solution, pow.difficulty())?;
        block.annotate(ComputeProof {
            nonce: solution.nonce,
            proof: pow.generate_computational_proof(&block.transactions),
            entropy_sample: pow.sample_thermodynamic_entropy(),
        })?;

        // Appends only happen under the mining guard, so the tip is unchanged.
        self.chain.write().push(block.clone());
        self.mempool.lock().remove_snapshot(&snapshot);

        let stats = MiningStats::new(solution.attempts, start.elapsed());
        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            index, stats.time_ms, stats.hash_attempts, stats.hash_rate
        );

        self.after_append(&block);
        Ok(Some(block))
    }

    /// Append a sealed block received from elsewhere after validating it
    /// against the current tip
    pub fn accept_block(&self, block: Block) -> Result<(), BlockchainError> {
        let _guard = self
            .mining
            .try_lock()
            .ok_or(BlockchainError::MiningInProgress)?;

        let required = self.difficulty();
        {
            let mut chain = self.chain.write();
            let tip = chain.last().cloned().unwrap_or_else(Block::genesis);
            if let Err(e) = self.check_incoming(&tip, &block, required) {
                warn!("Rejected block {}: {}", block.index(), e);
                return Err(e.into());
            }
            chain.push(block.clone());
        }

        let included: HashSet<String> = block.transactions.iter().map(Transaction::hash).collect();
        let removed = self.mempool.lock().remove_transactions(&included);
        info!(
            "Accepted block {} ({} pending transactions confirmed)",
            block.index(),
            removed
        );

        self.after_append(&block);
        Ok(())
    }

    /// A received block must extend the tip, carry at least the current
    /// difficulty and hold only well-formed transactions plus one reward
    fn check_incoming(
        &self,
        tip: &Block,
        block: &Block,
        required: u32,
    ) -> Result<(), ChainIntegrityError> {
        validate_successor(tip, block)?;

        if block.difficulty() < required {
            return Err(ChainIntegrityError::InsufficientWork {
                index: block.index(),
                difficulty: required,
            });
        }

        validate_block_transactions(block, self.config.block_reward)
    }

    /// Feed the retarget window and retarget on interval boundaries
    fn after_append(&self, block: &Block) {
        let mut pow = self.pow.write();
        pow.record_block_time(block.timestamp().timestamp_millis() as f64 / 1000.0);

        let interval = self.config.retarget_interval;
        if interval > 0 && block.index() % interval == 0 {
            pow.retarget();
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check every link and proof in the chain
    pub fn validate_chain(&self) -> Result<(), ChainIntegrityError> {
        let chain = self.chain.read();
        validate_blocks(&chain)?;
        chain
            .iter()
            .skip(1)
            .try_for_each(|block| validate_block_transactions(block, self.config.block_reward))
    }

    /// Validate the entire chain
    pub fn is_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

fn tip_hash(chain: &[Block]) -> String {
    chain
        .last()
        .map(Block::hash)
        .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string())
}

/// Validate a sequence of blocks starting at genesis
pub fn validate_blocks(blocks: &[Block]) -> Result<(), ChainIntegrityError> {
    match blocks.first() {
        Some(first) if first.hash() == Block::genesis().hash() && first.verify_hash() => {}
        _ => return Err(ChainIntegrityError::GenesisMismatch),
    }

    for pair in blocks.windows(2) {
        validate_successor(&pair[0], &pair[1])?;
    }

    Ok(())
}

/// Validate `block` as the direct successor of `previous`
pub fn validate_successor(previous: &Block, block: &Block) -> Result<(), ChainIntegrityError> {
    let index = block.index();

    if index != previous.index() + 1 {
        return Err(ChainIntegrityError::IndexMismatch {
            expected: previous.index() + 1,
            found: index,
        });
    }

    let expected = previous.hash();
    if block.previous_hash() != expected {
        return Err(ChainIntegrityError::PreviousHashMismatch {
            index,
            expected,
            found: block.previous_hash().to_string(),
        });
    }

    if !block.is_sealed() {
        return Err(ChainIntegrityError::Unsealed { index });
    }

    if !block.verify_hash() {
        return Err(ChainIntegrityError::HashMismatch { index });
    }

    if !block.is_valid_pow() {
        return Err(ChainIntegrityError::InsufficientWork {
            index,
            difficulty: block.difficulty(),
        });
    }

    if !block.verify_merkle_root() {
        return Err(ChainIntegrityError::MerkleRootMismatch { index });
    }

    Ok(())
}

/// Check a mined block's transactions
///
/// The last transaction must be the only reward and pay exactly
/// `block_reward`; every other transaction must be well formed.
pub fn validate_block_transactions(
    block: &Block,
    block_reward: f64,
) -> Result<(), ChainIntegrityError> {
    let index = block.index();
    let Some((reward, rest)) = block.transactions.split_last() else {
        return Err(ChainIntegrityError::InvalidReward { index });
    };

    if !reward.is_reward()
        || reward.total_output() != block_reward
        || rest.iter().any(Transaction::is_reward)
    {
        return Err(ChainIntegrityError::InvalidReward { index });
    }

    for tx in rest {
        if tx.validate_structure().is_err() {
            return Err(ChainIntegrityError::MalformedTransaction {
                index,
                tx_hash: tx.hash(),
            });
        }
    }

    Ok(())
}
