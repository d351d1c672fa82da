//! Ledger node
//!
//! Wires the pieces together. A submitted transaction passes the
//! double-execution gate, receives a commitment, enters the mempool through
//! the network and is broadcast. Mining seals the pending batch, credits the
//! node wallet with the reward and broadcasts the block.

use crate::config::LedgerConfig;
use crate::core::transaction::record;
use crate::core::{Block, Blockchain, BlockchainError, Transaction, TxRecord};
use crate::mining::CancelToken;
use crate::network::{LoopbackNetwork, NetworkSink, PeerRegistry};
use crate::privacy::CommitmentStore;
use crate::security::SecurityModel;
use crate::wallet::{ResourceKind, Wallet, WalletError, WalletInfo};
use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Node errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Node is not running")]
    NotRunning,
    #[error("Unsupported command: {0}")]
    UnknownCommand(String),
    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
}

/// Result of submitting a transaction to the node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Accepted {
        transaction_id: String,
        commitment: String,
    },
    DoubleExecution {
        transaction_id: String,
    },
    Rejected {
        transaction_id: String,
    },
}

impl SubmissionOutcome {
    pub fn transaction_id(&self) -> &str {
        match self {
            Self::Accepted { transaction_id, .. }
            | Self::DoubleExecution { transaction_id }
            | Self::Rejected { transaction_id } => transaction_id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Node status summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub is_running: bool,
    pub blockchain_height: usize,
    pub pending_transactions: usize,
    pub difficulty: u32,
    pub wallet: WalletInfo,
    pub network_peers: usize,
    pub executed_transactions: usize,
    pub commitments: usize,
    pub timestamp: DateTime<Utc>,
}

pub struct LedgerNode {
    node_id: String,
    config: LedgerConfig,
    blockchain: Arc<Blockchain>,
    security: SecurityModel,
    commitments: CommitmentStore,
    network: Arc<dyn NetworkSink>,
    wallet: Mutex<Wallet>,
    running: AtomicBool,
}

impl LedgerNode {
    /// Create a node with a fresh chain and a loopback network
    pub fn new(config: LedgerConfig) -> Self {
        let blockchain = Arc::new(Blockchain::from_config(&config));
        let registry = PeerRegistry::new(&config.node.node_id, &config.node.host, config.node.port);
        let network = Arc::new(LoopbackNetwork::new(registry, Arc::clone(&blockchain)));
        Self::with_network(config, blockchain, network)
    }

    /// Create a node over an existing chain and network transport
    pub fn with_network(
        config: LedgerConfig,
        blockchain: Arc<Blockchain>,
        network: Arc<dyn NetworkSink>,
    ) -> Self {
        let node_id = config.node.node_id.clone();
        let security = SecurityModel::new(Arc::clone(&blockchain))
            .with_acceptable_risk(config.security.acceptable_risk);
        let wallet = Wallet::new(&format!("wallet_{}", node_id));

        info!("Initialized node {} (wallet {})", node_id, wallet.address());

        Self {
            node_id,
            config,
            blockchain,
            security,
            commitments: CommitmentStore::new(),
            network,
            wallet: Mutex::new(wallet),
            running: AtomicBool::new(false),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    pub fn security(&self) -> &SecurityModel {
        &self.security
    }

    pub fn commitments(&self) -> &CommitmentStore {
        &self.commitments
    }

    pub fn network(&self) -> &Arc<dyn NetworkSink> {
        &self.network
    }

    pub fn wallet(&self) -> MutexGuard<'_, Wallet> {
        self.wallet.lock()
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.network.start();
        info!("Node {} started", self.node_id);
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.network.stop();
        info!("Node {} stopped", self.node_id);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), NodeError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(NodeError::NotRunning)
        }
    }

    /// Run a transaction through the gate, commitment, mempool and broadcast
    pub fn submit_transaction(&self, tx: Transaction) -> Result<SubmissionOutcome, NodeError> {
        self.ensure_running()?;
        let transaction_id = tx.hash();

        if !self.security.prevent_double_execution(&tx) {
            return Ok(SubmissionOutcome::DoubleExecution { transaction_id });
        }

        let commitment = self.commitments.create_commitment(&tx);

        let broadcast = tx.clone();
        if !self.network.handle_incoming_transaction(tx) {
            warn!("Transaction {} rejected by the mempool", transaction_id);
            return Ok(SubmissionOutcome::Rejected { transaction_id });
        }
        self.network.broadcast_transaction(&broadcast);

        Ok(SubmissionOutcome::Accepted {
            transaction_id,
            commitment,
        })
    }

    /// Build and sign a transaction for a resource command
    ///
    /// Supported commands mention `allocate` (reads `memory` from the
    /// resources) or `exchange` (reads `data_shard` and `node`).
    pub fn create_command_transaction(
        &self,
        command: &str,
        resources: &TxRecord,
    ) -> Result<Transaction, NodeError> {
        let field = |name: &str, fallback: Value| resources.get(name).cloned().unwrap_or(fallback);

        let (input, output) = if command.contains("allocate") {
            let amount = field("memory", Value::from(0));
            (
                record([
                    ("type", Value::from("memory_request")),
                    ("amount", amount.clone()),
                    ("command", Value::from(command)),
                ]),
                record([
                    ("type", Value::from("memory_allocation")),
                    ("amount", amount),
                    ("status", Value::from("pending")),
                ]),
            )
        } else if command.contains("exchange") {
            let shard = field("data_shard", Value::from(""));
            (
                record([
                    ("type", Value::from("data_request")),
                    ("shard", shard.clone()),
                    ("target_node", field("node", Value::from(""))),
                ]),
                record([
                    ("type", Value::from("data_exchange")),
                    ("shard", shard),
                    ("status", Value::from("pending")),
                ]),
            )
        } else {
            return Err(NodeError::UnknownCommand(command.to_string()));
        };

        let wallet = self.wallet.lock();
        let mut tx = Transaction::new(vec![input], vec![output], Some(wallet.public_key_bytes()));
        wallet.sign(&mut tx)?;
        Ok(tx)
    }

    /// Turn a command into a signed transaction and submit it
    pub fn execute_command(
        &self,
        command: &str,
        resources: &TxRecord,
    ) -> Result<SubmissionOutcome, NodeError> {
        self.ensure_running()?;
        info!("Executing command: {}", command);
        let tx = self.create_command_transaction(command, resources)?;
        self.submit_transaction(tx)
    }

    /// Pay a provider from the node wallet and submit the payment
    pub fn facilitate_resource_payment(
        &self,
        kind: ResourceKind,
        quantity: f64,
        provider_address: &str,
    ) -> Result<SubmissionOutcome, NodeError> {
        self.ensure_running()?;
        let tx = self
            .wallet
            .lock()
            .pay_for_resource(kind, quantity, provider_address)?;
        self.submit_transaction(tx)
    }

    /// Mine the pending batch, honouring the configured mining timeout
    pub fn mine_block(&self) -> Result<Option<Block>, NodeError> {
        let cancel = match self.config.mining.timeout() {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };
        self.mine_block_with(&cancel)
    }

    /// Mine the pending batch until done or cancelled
    pub fn mine_block_with(&self, cancel: &CancelToken) -> Result<Option<Block>, NodeError> {
        self.ensure_running()?;

        let reward_address = self.wallet.lock().address();
        let Some(block) = self
            .blockchain
            .mine_pending_transactions_with(&reward_address, cancel)?
        else {
            info!("No transactions to mine");
            return Ok(None);
        };

        if let Some(reward) = block.reward_tx() {
            self.wallet.lock().credit_from(reward);
        }
        self.network.broadcast_block(&block);

        Ok(Some(block))
    }

    pub fn status(&self) -> NodeStatus {
        let wallet = self.wallet.lock().export_public_info();
        NodeStatus {
            node_id: self.node_id.clone(),
            is_running: self.is_running(),
            blockchain_height: self.blockchain.len(),
            pending_transactions: self.blockchain.pending_len(),
            difficulty: self.blockchain.difficulty(),
            wallet,
            network_peers: self.network.status().peer_count,
            executed_transactions: self.security.executed_count(),
            commitments: self.commitments.len(),
            timestamp: Utc::now(),
        }
    }
}
