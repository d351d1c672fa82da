//! Integration tests for concurrent submission, mining and replay checks

use aether_ledger::core::{record, Blockchain, BlockchainError, Transaction};
use aether_ledger::mining::{CancelToken, MiningError, MAX_DIFFICULTY};
use aether_ledger::security::SecurityModel;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn tx(n: u64) -> Transaction {
    Transaction::new(
        vec![record([("amount", Value::from(n))])],
        vec![record([
            ("address", Value::from("addr1")),
            ("amount", Value::from(n)),
        ])],
        None,
    )
}

fn wait_for_miner(blockchain: &Blockchain) {
    let start = Instant::now();
    while !blockchain.is_mining() {
        assert!(start.elapsed() < Duration::from_secs(10), "miner never started");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_submissions_during_mining_are_kept() {
    let blockchain = Arc::new(Blockchain::with_difficulty(MAX_DIFFICULTY));
    let first = tx(1);
    blockchain.add_transaction(first.clone());

    let token = CancelToken::new();
    let miner = {
        let blockchain = Arc::clone(&blockchain);
        let token = token.clone();
        thread::spawn(move || blockchain.mine_pending_transactions_with("miner", &token))
    };

    wait_for_miner(&blockchain);

    let submitters: Vec<_> = (2..10)
        .map(|n| {
            let blockchain = Arc::clone(&blockchain);
            thread::spawn(move || blockchain.add_transaction(tx(n)))
        })
        .collect();
    for handle in submitters {
        assert!(handle.join().unwrap());
    }

    token.cancel();
    assert!(matches!(
        miner.join().unwrap(),
        Err(BlockchainError::Mining(MiningError::Cancelled { .. }))
    ));

    assert_eq!(blockchain.len(), 1);
    assert_eq!(blockchain.pending_len(), 9);
    assert_eq!(blockchain.pending_transactions()[0], first);

    blockchain.set_difficulty(1);
    let block = blockchain.mine_pending_transactions("miner").unwrap().unwrap();
    assert_eq!(block.tx_count(), 10);
    assert_eq!(blockchain.pending_len(), 0);
}

#[test]
fn test_second_miner_is_refused() {
    let blockchain = Arc::new(Blockchain::with_difficulty(MAX_DIFFICULTY));
    blockchain.add_transaction(tx(1));

    let token = CancelToken::new();
    let miner = {
        let blockchain = Arc::clone(&blockchain);
        let token = token.clone();
        thread::spawn(move || blockchain.mine_pending_transactions_with("miner", &token))
    };

    wait_for_miner(&blockchain);
    assert!(matches!(
        blockchain.mine_pending_transactions("other"),
        Err(BlockchainError::MiningInProgress)
    ));

    token.cancel();
    assert!(miner.join().unwrap().is_err());
    assert!(!blockchain.is_mining());
}

#[test]
fn test_mining_deadline() {
    let blockchain = Blockchain::with_difficulty(MAX_DIFFICULTY);
    blockchain.add_transaction(tx(1));

    let token = CancelToken::with_timeout(Duration::from_millis(50));
    let result = blockchain.mine_pending_transactions_with("miner", &token);

    assert!(matches!(
        result,
        Err(BlockchainError::Mining(MiningError::Cancelled { .. }))
    ));
    assert_eq!(blockchain.pending_len(), 1);
}

#[test]
fn test_concurrent_replay_admits_once() {
    let security = Arc::new(SecurityModel::new(Arc::new(Blockchain::with_difficulty(1))));
    let shared = tx(7);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let security = Arc::clone(&security);
            let tx = shared.clone();
            thread::spawn(move || security.prevent_double_execution(&tx))
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(security.executed_count(), 1);
}
