//! Double-execution gate and fork-safety estimates

use crate::core::{Blockchain, Transaction};
use crate::security::store::{ExecutedTxStore, InMemoryTxIdStore};
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;

/// Highest attack probability still treated as fork-safe
pub const ACCEPTABLE_RISK: f64 = 0.001;

/// Security errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    #[error("Attacker fraction {0} is outside [0, 1]")]
    InvalidAttackerFraction(f64),
    #[error("{confirmations} confirmations exceeds the supported maximum of {max}")]
    TooManyConfirmations { confirmations: u64, max: u64 },
}

/// Guards a chain against replayed transactions and estimates the chance
/// that an attacker overtakes it
#[derive(Debug)]
pub struct SecurityModel {
    blockchain: Arc<Blockchain>,
    executed: Box<dyn ExecutedTxStore>,
    acceptable_risk: f64,
}

impl SecurityModel {
    pub fn new(blockchain: Arc<Blockchain>) -> Self {
        Self::with_store(blockchain, InMemoryTxIdStore::new())
    }

    /// Use a different executed-id store
    pub fn with_store(blockchain: Arc<Blockchain>, store: impl ExecutedTxStore + 'static) -> Self {
        Self {
            blockchain,
            executed: Box::new(store),
            acceptable_risk: ACCEPTABLE_RISK,
        }
    }

    pub fn with_acceptable_risk(mut self, acceptable_risk: f64) -> Self {
        self.acceptable_risk = acceptable_risk;
        self
    }

    pub fn acceptable_risk(&self) -> f64 {
        self.acceptable_risk
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    /// True the first time a transaction identity is seen, false afterwards
    ///
    /// Memory-only: an identity stays blocked even if it was never mined.
    pub fn prevent_double_execution(&self, tx: &Transaction) -> bool {
        let tx_id = tx.hash();
        if self.executed.insert_if_absent(&tx_id) {
            debug!("Transaction {} cleared for execution", tx_id);
            true
        } else {
            warn!("Double execution of transaction {} prevented", tx_id);
            false
        }
    }

    /// Whether a transaction identity has already been accepted
    pub fn has_executed(&self, tx_hash: &str) -> bool {
        self.executed.contains(tx_hash)
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    /// Probability that an attacker with hash share `attacker_fraction`
    /// catches up from `confirmations` blocks behind
    pub fn calculate_attack_probability(
        &self,
        attacker_fraction: f64,
        confirmations: u64,
    ) -> Result<f64, SecurityError> {
        attack_probability(attacker_fraction, confirmations)
    }

    /// True iff the attack probability is below the acceptable risk
    ///
    /// The probability never grows with depth, so depths past
    /// [`MAX_CONFIRMATIONS`] are judged at that depth.
    pub fn is_fork_safe(&self, confirmations: u64, attacker_fraction: f64) -> bool {
        let depth = confirmations.min(MAX_CONFIRMATIONS);
        match attack_probability(attacker_fraction, depth) {
            Ok(probability) => probability < self.acceptable_risk,
            Err(e) => {
                warn!("Fork safety check failed: {}", e);
                false
            }
        }
    }

    /// Blocks from the one containing the transaction up to the tip, inclusive
    pub fn confirmations(&self, tx_hash: &str) -> Option<u64> {
        let index = self.blockchain.find_transaction(tx_hash)?;
        Some(self.blockchain.len() as u64 - index)
    }

    /// Confirmed deep enough to be fork-safe against `attacker_fraction`
    pub fn is_transaction_final(&self, tx_hash: &str, attacker_fraction: f64) -> bool {
        self.confirmations(tx_hash)
            .is_some_and(|depth| self.is_fork_safe(depth, attacker_fraction))
    }
}

/// Largest confirmation depth the race model is evaluated at
pub const MAX_CONFIRMATIONS: u64 = 1_000_000;

/// Poisson race model:
/// `1 - sum_{k=0..=z} Poisson(k; lambda) * (1 - (q/p)^(z-k))`, `lambda = z*q/p`
///
/// Poisson terms are built in log space so large `lambda` does not
/// underflow. The sum stops once the remaining probability is below
/// `f64::EPSILON`; later terms can only lower it further.
pub fn attack_probability(attacker_fraction: f64, confirmations: u64) -> Result<f64, SecurityError> {
    let q = attacker_fraction;
    if q.is_nan() || !(0.0..=1.0).contains(&q) {
        return Err(SecurityError::InvalidAttackerFraction(q));
    }
    if confirmations > MAX_CONFIRMATIONS {
        return Err(SecurityError::TooManyConfirmations {
            confirmations,
            max: MAX_CONFIRMATIONS,
        });
    }
    if q >= 0.5 {
        return Ok(1.0);
    }

    let p = 1.0 - q;
    let ratio = q / p;
    let z = confirmations as f64;
    let lambda = z * ratio;
    let ln_lambda = lambda.ln();

    let mut ln_poisson = -lambda;
    let mut caught_up = 0.0;
    for k in 0..=confirmations {
        if k > 0 {
            ln_poisson += ln_lambda - (k as f64).ln();
        }
        let remaining = (confirmations - k) as f64;
        caught_up += ln_poisson.exp() * (1.0 - ratio.powf(remaining));

        if 1.0 - caught_up < f64::EPSILON {
            break;
        }
    }

    Ok((1.0 - caught_up).clamp(0.0, 1.0))
}
