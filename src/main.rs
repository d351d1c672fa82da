//! Aether ledger CLI Application
//!
//! A command-line interface for exercising the ledger core.

use aether_ledger::cli;
use aether_ledger::config::LedgerConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aether")]
#[command(version = "0.1.0")]
#[command(about = "Ledger and proof-of-compute consensus core", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "aether.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transaction end to end through a node
    Demo,

    /// Mine new blocks
    Mine {
        /// Miner's address for receiving rewards
        #[arg(short, long)]
        address: String,

        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Estimate an attacker's chance of overtaking the chain
    Attack {
        /// Attacker share of total hash power, in [0, 1]
        #[arg(short, long)]
        fraction: f64,

        /// Blocks the honest chain is ahead
        #[arg(short = 'z', long, default_value = "6")]
        confirmations: u64,
    },

    /// Mine a short chain and validate it
    Validate {
        /// Number of blocks to mine first
        #[arg(short, long, default_value = "3")]
        blocks: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = LedgerConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Demo => cli::cmd_demo(&config)?,

        Commands::Mine { address, count } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_mine(&config, &address, count))?;
        }

        Commands::Attack {
            fraction,
            confirmations,
        } => cli::cmd_attack(&config, fraction, confirmations)?,

        Commands::Validate { blocks } => cli::cmd_validate(&config, blocks)?,
    }

    Ok(())
}
