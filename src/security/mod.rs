//! Security module: replay protection and fork-safety analysis

pub mod model;
pub mod store;

pub use model::{
    attack_probability, SecurityError, SecurityModel, ACCEPTABLE_RISK, MAX_CONFIRMATIONS,
};
pub use store::{ExecutedTxStore, InMemoryTxIdStore};
