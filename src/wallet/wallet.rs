//! Wallet implementation for the ledger
//!
//! Provides key management, a single-currency balance and signed
//! transfer creation.

use crate::core::transaction::record;
use crate::core::{Transaction, TransactionError};
use crate::crypto::{KeyError, KeyPair};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Default fee attached to transfers
pub const DEFAULT_TRANSFER_FEE: f64 = 0.0001;

/// Output address that collects transfer fees
pub const FEE_ADDRESS: &str = "network_fee";

/// Fee charged on resource payments, as a fraction of the amount (0.01%)
pub const RESOURCE_FEE_RATE: f64 = 0.0001;

/// Default price of one compute unit
pub const DEFAULT_COMPUTE_UNIT_PRICE: f64 = 0.001;

/// Default price of one GB of storage
pub const DEFAULT_STORAGE_PRICE_PER_GB: f64 = 0.01;

/// Share of a data flow's value paid to its originator
pub const ORIGINATOR_SHARE: f64 = 0.7;

/// Resources a wallet can pay a provider for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compute,
    Storage,
    Data,
}

impl FromStr for ResourceKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compute" => Ok(Self::Compute),
            "storage" => Ok(Self::Storage),
            "data" => Ok(Self::Data),
            other => Err(WalletError::UnsupportedResource(other.to_string())),
        }
    }
}

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: f64, need: f64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

/// Kind of balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Deposit,
    Withdrawal,
    Transfer,
    Receipt,
}

/// One entry in the wallet's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletActivity {
    pub kind: ActivityKind,
    pub amount: f64,
    pub fee: f64,
    pub transaction_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub balance_after: f64,
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    wallet_id: String,
    private_key_hex: String,
    address: String,
    balance: f64,
}

/// A wallet holding one key pair and a local balance
pub struct Wallet {
    wallet_id: String,
    key_pair: KeyPair,
    balance: f64,
    history: Vec<WalletActivity>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new(wallet_id: &str) -> Self {
        Self::with_key_pair(wallet_id, KeyPair::generate())
    }

    fn with_key_pair(wallet_id: &str, key_pair: KeyPair) -> Self {
        Self {
            wallet_id: wallet_id.to_string(),
            key_pair,
            balance: 0.0,
            history: Vec::new(),
        }
    }

    /// Import a wallet from a hex private key
    pub fn from_private_key(wallet_id: &str, private_key_hex: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(private_key_hex).map_err(|_| KeyError::InvalidPrivateKey)?;
        let key_pair = KeyPair::from_private_key_bytes(&bytes)?;
        Ok(Self::with_key_pair(wallet_id, key_pair))
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    /// Get the wallet's address
    pub fn address(&self) -> String {
        self.key_pair.address()
    }

    /// Compressed public key bytes, as carried by transactions
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.key_pair.public_key_bytes()
    }

    /// Get the wallet's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        hex::encode(self.key_pair.private_key_bytes())
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn history(&self) -> &[WalletActivity] {
        &self.history
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(), WalletError> {
        check_amount(amount)?;
        self.balance += amount;
        self.record(ActivityKind::Deposit, amount, 0.0, None);
        info!("Deposited {} to wallet {}", amount, self.wallet_id);
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<(), WalletError> {
        check_amount(amount)?;
        self.ensure_funds(amount)?;
        self.balance -= amount;
        self.record(ActivityKind::Withdrawal, amount, 0.0, None);
        info!("Withdrew {} from wallet {}", amount, self.wallet_id);
        Ok(())
    }

    /// Build and sign a transfer of `amount` plus `fee`, debiting the balance
    ///
    /// The single input spends `amount + fee` from this address; the outputs
    /// pay the recipient and the fee collector.
    pub fn create_transfer(
        &mut self,
        recipient: &str,
        amount: f64,
        fee: f64,
    ) -> Result<Transaction, WalletError> {
        check_amount(amount)?;
        if fee.is_nan() || fee < 0.0 {
            return Err(WalletError::InvalidAmount(fee));
        }

        let total = amount + fee;
        self.ensure_funds(total)?;

        let inputs = vec![record([
            ("address", Value::from(self.address())),
            ("amount", Value::from(total)),
        ])];
        let outputs = vec![
            record([
                ("address", Value::from(recipient)),
                ("amount", Value::from(amount)),
            ]),
            record([
                ("address", Value::from(FEE_ADDRESS)),
                ("amount", Value::from(fee)),
            ]),
        ];

        let mut tx = Transaction::new(inputs, outputs, Some(self.public_key_bytes()));
        tx.sign(&self.key_pair.private_key_bytes())
            .map_err(TransactionError::from)?;

        self.balance -= total;
        self.record(ActivityKind::Transfer, amount, fee, Some(tx.hash()));
        info!(
            "Created transfer of {} to {} (fee {}) from wallet {}",
            amount, recipient, fee, self.wallet_id
        );

        Ok(tx)
    }

    /// Pay a node for `compute_units` of compute at `unit_price` each
    pub fn pay_for_compute(
        &mut self,
        node_address: &str,
        compute_units: f64,
        unit_price: f64,
    ) -> Result<Transaction, WalletError> {
        check_amount(compute_units)?;
        let amount = compute_units * unit_price;
        info!(
            "Paying for {} compute units at {}/unit from wallet {}",
            compute_units, unit_price, self.wallet_id
        );
        self.create_transfer(node_address, amount, amount * RESOURCE_FEE_RATE)
    }

    /// Pay a node for `storage_gb` of storage at `price_per_gb`
    pub fn pay_for_storage(
        &mut self,
        node_address: &str,
        storage_gb: f64,
        price_per_gb: f64,
    ) -> Result<Transaction, WalletError> {
        check_amount(storage_gb)?;
        let amount = storage_gb * price_per_gb;
        info!(
            "Paying for {} GB storage at {}/GB from wallet {}",
            storage_gb, price_per_gb, self.wallet_id
        );
        self.create_transfer(node_address, amount, amount * RESOURCE_FEE_RATE)
    }

    /// Pay the originator's share of a data flow worth `data_value`
    ///
    /// The fee is charged on the full value.
    pub fn monetize_data_flow(
        &mut self,
        data_value: f64,
        originator_address: &str,
    ) -> Result<Transaction, WalletError> {
        check_amount(data_value)?;
        let share = data_value * ORIGINATOR_SHARE;
        info!(
            "Monetizing data flow worth {} ({} to originator) from wallet {}",
            data_value, share, self.wallet_id
        );
        self.create_transfer(originator_address, share, data_value * RESOURCE_FEE_RATE)
    }

    /// Pay a provider for `quantity` of a resource at the default prices
    pub fn pay_for_resource(
        &mut self,
        kind: ResourceKind,
        quantity: f64,
        provider_address: &str,
    ) -> Result<Transaction, WalletError> {
        match kind {
            ResourceKind::Compute => {
                self.pay_for_compute(provider_address, quantity, DEFAULT_COMPUTE_UNIT_PRICE)
            }
            ResourceKind::Storage => {
                self.pay_for_storage(provider_address, quantity, DEFAULT_STORAGE_PRICE_PER_GB)
            }
            ResourceKind::Data => self.monetize_data_flow(quantity, provider_address),
        }
    }

    /// Sign an arbitrary transaction with this wallet's key
    pub fn sign(&self, tx: &mut Transaction) -> Result<(), WalletError> {
        tx.sign(&self.key_pair.private_key_bytes())
            .map_err(TransactionError::from)?;
        Ok(())
    }

    /// Credit outputs addressed to this wallet
    ///
    /// Only block rewards and transactions with a valid signature are
    /// credited. Returns the credited amount.
    pub fn credit_from(&mut self, tx: &Transaction) -> f64 {
        if !tx.is_reward() && !tx.verify_signature() {
            return 0.0;
        }

        let amount = tx.amount_to(&self.address());
        if amount > 0.0 {
            self.balance += amount;
            self.record(ActivityKind::Receipt, amount, 0.0, Some(tx.hash()));
        }
        amount
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            wallet_id: self.wallet_id.clone(),
            private_key_hex: self.private_key(),
            address: self.address(),
            balance: self.balance,
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.wallet_id, &data.private_key_hex)?;
        wallet.balance = data.balance;
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            wallet_id: self.wallet_id.clone(),
            address: self.address(),
            public_key: self.public_key(),
            balance: self.balance,
        }
    }

    fn ensure_funds(&self, need: f64) -> Result<(), WalletError> {
        if self.balance < need {
            return Err(WalletError::InsufficientFunds {
                have: self.balance,
                need,
            });
        }
        Ok(())
    }

    fn record(&mut self, kind: ActivityKind, amount: f64, fee: f64, transaction_id: Option<String>) {
        self.history.push(WalletActivity {
            kind,
            amount,
            fee,
            transaction_id,
            timestamp: Utc::now(),
            balance_after: self.balance,
        });
    }
}

fn check_amount(amount: f64) -> Result<(), WalletError> {
    if amount.is_nan() || amount <= 0.0 || amount.is_infinite() {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(())
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub wallet_id: String,
    pub address: String,
    pub public_key: String,
    pub balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new("test_wallet");
        assert_eq!(wallet.wallet_id(), "test_wallet");
        assert!(!wallet.address().is_empty());
        assert_eq!(wallet.public_key_bytes().len(), 33);
        assert_eq!(wallet.balance(), 0.0);
    }

    #[test]
    fn test_wallet_import() {
        let wallet1 = Wallet::new("a");
        let wallet2 = Wallet::from_private_key("b", &wallet1.private_key()).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());

        assert!(matches!(
            Wallet::from_private_key("c", "not-hex"),
            Err(WalletError::Crypto(KeyError::InvalidPrivateKey))
        ));
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut wallet = Wallet::new("test_wallet");
        wallet.deposit(100.0).unwrap();
        assert_eq!(wallet.balance(), 100.0);

        wallet.withdraw(30.0).unwrap();
        assert_eq!(wallet.balance(), 70.0);

        assert!(matches!(
            wallet.withdraw(100.0),
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert!(matches!(wallet.deposit(-1.0), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(wallet.deposit(f64::NAN), Err(WalletError::InvalidAmount(_))));
        assert_eq!(wallet.balance(), 70.0);

        let kinds: Vec<_> = wallet.history().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::Deposit, ActivityKind::Withdrawal]);
    }

    #[test]
    fn test_create_transfer() {
        let mut wallet = Wallet::new("sender");
        wallet.deposit(100.0).unwrap();

        let tx = wallet
            .create_transfer("recipient_addr", 10.0, DEFAULT_TRANSFER_FEE)
            .unwrap();

        assert!(tx.verify_signature());
        assert!(tx.validate_structure().is_ok());
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.amount_to("recipient_addr"), 10.0);
        assert_eq!(tx.amount_to(FEE_ADDRESS), DEFAULT_TRANSFER_FEE);
        assert_eq!(tx.public_key, Some(wallet.public_key_bytes()));
        assert!((wallet.balance() - (90.0 - DEFAULT_TRANSFER_FEE)).abs() < 1e-9);
        assert_eq!(wallet.history().last().unwrap().transaction_id, Some(tx.hash()));
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut wallet = Wallet::new("sender");
        wallet.deposit(10.0).unwrap();

        assert!(matches!(
            wallet.create_transfer("recipient", 10.0, 0.5),
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(wallet.balance(), 10.0);
    }

    #[test]
    fn test_credit_from() {
        let mut sender = Wallet::new("sender");
        let mut receiver = Wallet::new("receiver");
        sender.deposit(20.0).unwrap();

        let tx = sender.create_transfer(&receiver.address(), 5.0, 0.0).unwrap();
        assert_eq!(receiver.credit_from(&tx), 5.0);
        assert_eq!(receiver.balance(), 5.0);

        let mut forged = tx.clone();
        forged.nonce = forged.nonce.wrapping_add(1);
        assert_eq!(receiver.credit_from(&forged), 0.0);

        let reward = Transaction::reward(&receiver.address(), 50.0);
        assert_eq!(receiver.credit_from(&reward), 50.0);
        assert_eq!(receiver.balance(), 55.0);
    }

    #[test]
    fn test_pay_for_compute() {
        let mut wallet = Wallet::new("payer");
        wallet.deposit(10.0).unwrap();

        let tx = wallet.pay_for_compute("node_addr", 1000.0, 0.002).unwrap();
        assert!(tx.verify_signature());
        assert!((tx.amount_to("node_addr") - 2.0).abs() < 1e-12);
        assert!((tx.amount_to(FEE_ADDRESS) - 2.0 * RESOURCE_FEE_RATE).abs() < 1e-12);
        assert!((wallet.balance() - (8.0 - 2.0 * RESOURCE_FEE_RATE)).abs() < 1e-9);

        assert!(matches!(
            wallet.pay_for_compute("node_addr", 0.0, 0.002),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_pay_for_storage() {
        let mut wallet = Wallet::new("payer");
        wallet.deposit(1.0).unwrap();

        let tx = wallet
            .pay_for_storage("storage_node", 50.0, DEFAULT_STORAGE_PRICE_PER_GB)
            .unwrap();
        assert!((tx.amount_to("storage_node") - 0.5).abs() < 1e-12);
        assert!((tx.amount_to(FEE_ADDRESS) - 0.5 * RESOURCE_FEE_RATE).abs() < 1e-12);

        assert!(matches!(
            wallet.pay_for_storage("storage_node", 100.0, DEFAULT_STORAGE_PRICE_PER_GB),
            Err(WalletError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_monetize_data_flow() {
        let mut wallet = Wallet::new("payer");
        wallet.deposit(200.0).unwrap();

        let tx = wallet.monetize_data_flow(100.0, "originator").unwrap();
        assert!((tx.amount_to("originator") - 70.0).abs() < 1e-9);
        assert!((tx.amount_to(FEE_ADDRESS) - 0.01).abs() < 1e-12);
        assert!((wallet.balance() - (200.0 - 70.0 - 0.01)).abs() < 1e-9);
        assert_eq!(wallet.history().last().unwrap().kind, ActivityKind::Transfer);
    }

    #[test]
    fn test_pay_for_resource() {
        let mut wallet = Wallet::new("payer");
        wallet.deposit(100.0).unwrap();

        let kind: ResourceKind = "compute".parse().unwrap();
        let tx = wallet.pay_for_resource(kind, 500.0, "provider").unwrap();
        assert!((tx.amount_to("provider") - 500.0 * DEFAULT_COMPUTE_UNIT_PRICE).abs() < 1e-12);

        let tx = wallet
            .pay_for_resource(ResourceKind::Storage, 10.0, "provider")
            .unwrap();
        assert!((tx.amount_to("provider") - 0.1).abs() < 1e-12);

        let tx = wallet
            .pay_for_resource(ResourceKind::Data, 10.0, "provider")
            .unwrap();
        assert!((tx.amount_to("provider") - 7.0).abs() < 1e-9);

        assert!(matches!(
            "bandwidth".parse::<ResourceKind>(),
            Err(WalletError::UnsupportedResource(_))
        ));
    }

    #[test]
    fn test_wallet_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_wallet.json");

        let mut wallet1 = Wallet::new("saved");
        wallet1.deposit(12.5).unwrap();
        wallet1.save(&path).unwrap();

        let wallet2 = Wallet::load(&path).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
        assert_eq!(wallet2.wallet_id(), "saved");
        assert_eq!(wallet2.balance(), 12.5);
        assert_eq!(wallet2.export_public_info().public_key, wallet1.public_key());
    }
}
