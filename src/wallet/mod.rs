//! Wallet module for key and balance management

pub mod wallet;

pub use wallet::{
    ActivityKind, ResourceKind, Wallet, WalletActivity, WalletError, WalletInfo,
    DEFAULT_COMPUTE_UNIT_PRICE, DEFAULT_STORAGE_PRICE_PER_GB, DEFAULT_TRANSFER_FEE, FEE_ADDRESS,
    ORIGINATOR_SHARE, RESOURCE_FEE_RATE,
};
