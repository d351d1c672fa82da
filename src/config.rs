//! Configuration management for the ledger
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use crate::mining::MAX_DIFFICULTY;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub chain: ChainConfig,
    pub mining: MiningConfig,
    pub security: SecurityConfig,
    pub node: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Initial number of leading zero hex characters
    pub difficulty: u32,
    /// Amount credited by the reward transaction
    pub block_reward: f64,
    /// Cap on mempool entries taken per block
    pub max_block_transactions: usize,
    /// Blocks between automatic retargets (0 disables)
    pub retarget_interval: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            block_reward: 50.0,
            max_block_transactions: 1000,
            retarget_interval: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub target_block_time_secs: f64,
    /// Abort a nonce search after this many seconds
    pub timeout_secs: Option<u64>,
}

impl MiningConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            target_block_time_secs: 60.0,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Highest attack probability still considered fork-safe
    pub acceptable_risk: f64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            acceptable_risk: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "aether_node".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl LedgerConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Read a TOML file, falling back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "chain.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if self.chain.block_reward.is_nan() || self.chain.block_reward < 0.0 {
            return Err(ConfigError::Invalid(
                "chain.block_reward must be non-negative".into(),
            ));
        }
        if self.chain.max_block_transactions == 0 {
            return Err(ConfigError::Invalid(
                "chain.max_block_transactions must be positive".into(),
            ));
        }
        let block_time = self.mining.target_block_time_secs;
        if block_time.is_nan() || block_time <= 0.0 {
            return Err(ConfigError::Invalid(
                "mining.target_block_time_secs must be positive".into(),
            ));
        }
        let risk = self.security.acceptable_risk;
        if risk.is_nan() || risk <= 0.0 || risk >= 1.0 {
            return Err(ConfigError::Invalid(
                "security.acceptable_risk must be in (0, 1)".into(),
            ));
        }
        Ok(())
    }
}
