//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (free-form records, canonical serialization, ECDSA signing)
//! - Blocks (two-phase construction, merkle root, proof of compute)
//! - Blockchain (chain, mempool, concurrent mining, validity check)

pub mod block;
pub mod blockchain;
pub mod transaction;

pub use block::{Block, BlockError, BlockHeader, ComputeProof, GENESIS_PREVIOUS_HASH};
pub use blockchain::{
    validate_block_transactions, validate_blocks, validate_successor, Blockchain,
    BlockchainError, ChainIntegrityError, ChainStats, BLOCK_REWARD, DEFAULT_DIFFICULTY,
};
pub use transaction::{
    record, SigningError, Transaction, TransactionError, TxRecord, ValidationError,
};
