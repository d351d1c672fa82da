//! Aether ledger: a ledger and proof-of-compute consensus core
//!
//! This crate provides:
//! - Transactions with canonical serialization and ECDSA signatures (secp256k1)
//! - Blocks with Merkle roots and a hex-prefix proof-of-compute puzzle
//! - A blockchain with a concurrent mempool, cancellable mining and
//!   automatic difficulty retargeting
//! - A security model: double-execution gate and Poisson fork-safety estimates
//! - Wallet, commitment, network and node collaborators
//!
//! # Example
//!
//! ```rust
//! use aether_ledger::core::Blockchain;
//! use aether_ledger::wallet::Wallet;
//!
//! // Create a new blockchain
//! let blockchain = Blockchain::with_difficulty(1);
//!
//! // Create a funded wallet and a signed transfer
//! let mut wallet = Wallet::new("alice");
//! wallet.deposit(10.0).unwrap();
//! let tx = wallet.create_transfer("recipient", 5.0, 0.0).unwrap();
//! assert!(blockchain.add_transaction(tx));
//!
//! // Mine a block
//! let block = blockchain
//!     .mine_pending_transactions(&wallet.address())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(block.index(), 1);
//! assert!(blockchain.is_valid());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod node;
pub mod privacy;
pub mod security;
pub mod wallet;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use core::{Block, Blockchain, Transaction, BLOCK_REWARD, DEFAULT_DIFFICULTY};
pub use crypto::KeyPair;
pub use mining::{CancelToken, Mempool, ProofOfCompute};
pub use network::{LoopbackNetwork, NetworkSink, PeerRegistry};
pub use node::{LedgerNode, NodeStatus, SubmissionOutcome};
pub use privacy::CommitmentStore;
pub use security::SecurityModel;
pub use wallet::Wallet;
