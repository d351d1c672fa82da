//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface.

use crate::config::LedgerConfig;
use crate::core::{record, Blockchain, BlockchainError, Transaction};
use crate::mining::{CancelToken, MiningError};
use crate::node::{LedgerNode, SubmissionOutcome};
use crate::security::SecurityModel;
use crate::wallet::{ResourceKind, Wallet, DEFAULT_TRANSFER_FEE};
use serde_json::Value;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Build a funded wallet's signed transfer for demo traffic
fn demo_transfer(wallet: &mut Wallet, recipient: &str, amount: f64) -> CliResult<Transaction> {
    if wallet.balance() < amount + DEFAULT_TRANSFER_FEE {
        wallet.deposit(1000.0)?;
    }
    Ok(wallet.create_transfer(recipient, amount, DEFAULT_TRANSFER_FEE)?)
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(16)]
}

/// Print chain statistics
pub fn print_chain_info(blockchain: &Blockchain) {
    let stats = blockchain.stats();

    println!("⛓️  Blockchain Info");
    println!("   ├─ Height: {}", stats.height);
    println!("   ├─ Total blocks: {}", stats.total_blocks);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Pending transactions: {}", stats.mempool.tx_count);
    println!("   ├─ Difficulty: {}", stats.difficulty);
    println!("   └─ Latest hash: {}...", short(&stats.latest_hash));
}

/// Walk a transaction through a full node: submit, replay, mine, confirm
pub fn cmd_demo(config: &LedgerConfig) -> CliResult<()> {
    let node = LedgerNode::new(config.clone());
    node.start();

    let mut alice = Wallet::new("alice");
    let bob = Wallet::new("bob");

    println!("🚀 Node {} started", node.node_id());

    let tx = demo_transfer(&mut alice, &bob.address(), 25.0)?;
    match node.submit_transaction(tx.clone())? {
        SubmissionOutcome::Accepted {
            transaction_id,
            commitment,
        } => {
            println!("📤 Transfer accepted");
            println!("   ├─ ID: {}", short(&transaction_id));
            println!("   └─ Commitment: {}", short(&commitment));
        }
        other => println!("❌ Transfer not accepted: {:?}", other),
    }

    if let SubmissionOutcome::DoubleExecution { transaction_id } =
        node.submit_transaction(tx.clone())?
    {
        println!("🛡️  Replay of {} blocked", short(&transaction_id));
    }

    let resources = record([("memory", Value::from(1024))]);
    let outcome = node.execute_command("allocate 1GB memory for process P", &resources)?;
    println!("⚙️  Command transaction: {}", short(outcome.transaction_id()));

    println!("\n⛏️  Mining at difficulty {}...", node.blockchain().difficulty());
    if let Some(block) = node.mine_block()? {
        println!("   Block {} mined!", block.index());
        println!("   ├─ Hash: {}", short(&block.hash()));
        println!("   ├─ Nonce: {}", block.nonce());
        println!("   └─ Transactions: {}", block.tx_count());
    }

    let payment =
        node.facilitate_resource_payment(ResourceKind::Compute, 1000.0, &bob.address())?;
    println!(
        "\n💸 Compute payment to bob: {} (accepted: {})",
        short(payment.transaction_id()),
        payment.is_accepted()
    );

    let depth = node.security().confirmations(&tx.hash()).unwrap_or(0);
    println!("\n🔍 Transfer confirmations: {}", depth);
    println!(
        "   Fork safe against 10% attacker: {}",
        node.security().is_fork_safe(depth, 0.1)
    );

    println!();
    print_chain_info(node.blockchain());

    let status = node.status();
    println!("\n💰 Node wallet {}", status.wallet.wallet_id);
    println!("   ├─ Address: {}", status.wallet.address);
    println!("   └─ Balance: {}", status.wallet.balance);
    println!("   Chain valid: {}", node.blockchain().is_valid());

    node.stop();
    Ok(())
}

/// Mine `count` blocks, each carrying one demo transfer
///
/// The nonce search runs on a blocking thread; Ctrl-C cancels it.
pub async fn cmd_mine(config: &LedgerConfig, address: &str, count: u32) -> CliResult<()> {
    let blockchain = Arc::new(Blockchain::from_config(config));
    let mut wallet = Wallet::new("cli_miner_funds");

    println!("⛏️  Mining {} block(s) for address: {}", count, address);
    println!("   Current difficulty: {}", blockchain.difficulty());

    for _ in 0..count {
        let tx = demo_transfer(&mut wallet, address, 1.0)?;
        blockchain.add_transaction(tx);

        let cancel = match config.mining.timeout() {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };

        let worker = {
            let blockchain = Arc::clone(&blockchain);
            let cancel = cancel.clone();
            let address = address.to_string();
            tokio::task::spawn_blocking(move || {
                blockchain.mine_pending_transactions_with(&address, &cancel)
            })
        };
        tokio::pin!(worker);

        let result = tokio::select! {
            joined = &mut worker => joined?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n📴 Cancelling mining...");
                cancel.cancel();
                worker.await?
            }
        };

        match result {
            Ok(Some(block)) => {
                println!("\n   Block {} mined!", block.index());
                println!("   ├─ Hash: {}", short(&block.hash()));
                println!("   ├─ Transactions: {}", block.tx_count());
                println!("   └─ Difficulty: {}", block.difficulty());
            }
            Ok(None) => println!("📭 Nothing to mine"),
            Err(BlockchainError::Mining(MiningError::Cancelled { attempts })) => {
                println!("⚠️  Mining cancelled after {} attempts", attempts);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!();
    print_chain_info(&blockchain);
    Ok(())
}

/// Print the attack probability and fork-safety verdict
pub fn cmd_attack(config: &LedgerConfig, fraction: f64, confirmations: u64) -> CliResult<()> {
    let security = SecurityModel::new(Arc::new(Blockchain::from_config(config)))
        .with_acceptable_risk(config.security.acceptable_risk);

    let probability = security.calculate_attack_probability(fraction, confirmations)?;
    let safe = security.is_fork_safe(confirmations, fraction);

    println!("🎯 Attack analysis");
    println!("   ├─ Attacker hash share: {}", fraction);
    println!("   ├─ Confirmations: {}", confirmations);
    println!("   ├─ Success probability: {:.7}", probability);
    println!("   ├─ Acceptable risk: {}", security.acceptable_risk());
    if safe {
        println!("   └─ ✅ Fork safe");
    } else {
        println!("   └─ ❌ Not fork safe");
    }

    Ok(())
}

/// Mine a short chain and run the validity check over it
pub fn cmd_validate(config: &LedgerConfig, blocks: u32) -> CliResult<()> {
    let blockchain = Blockchain::from_config(config);
    let mut wallet = Wallet::new("validator_funds");
    let recipient = Wallet::new("validator_recipient").address();

    println!("🧱 Mining {} block(s)...", blocks);
    for _ in 0..blocks {
        blockchain.add_transaction(demo_transfer(&mut wallet, &recipient, 1.0)?);
        blockchain.mine_pending_transactions(&recipient)?;
    }

    println!("🔍 Validating blockchain...");
    match blockchain.validate_chain() {
        Ok(()) => {
            println!("✅ Blockchain is valid!");
            println!("   {} blocks verified", blockchain.len());
        }
        Err(e) => {
            println!("❌ Blockchain validation FAILED!");
            println!("   {}", e);
        }
    }

    Ok(())
}
