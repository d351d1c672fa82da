//! In-process network: broadcasts are logged and counted, incoming
//! transactions go straight into the local mempool

use crate::core::{Block, Blockchain, Transaction};
use crate::network::peer::{NetworkStatus, PeerRegistry};
use crate::network::sink::NetworkSink;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct LoopbackNetwork {
    registry: PeerRegistry,
    blockchain: Arc<Blockchain>,
    tx_broadcasts: AtomicU64,
    block_broadcasts: AtomicU64,
}

impl LoopbackNetwork {
    pub fn new(registry: PeerRegistry, blockchain: Arc<Blockchain>) -> Self {
        Self {
            registry,
            blockchain,
            tx_broadcasts: AtomicU64::new(0),
            block_broadcasts: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn transactions_broadcast(&self) -> u64 {
        self.tx_broadcasts.load(Ordering::Relaxed)
    }

    pub fn blocks_broadcast(&self) -> u64 {
        self.block_broadcasts.load(Ordering::Relaxed)
    }
}

impl NetworkSink for LoopbackNetwork {
    fn start(&self) {
        self.registry.start();
    }

    fn stop(&self) {
        self.registry.stop();
    }

    fn broadcast_transaction(&self, tx: &Transaction) {
        self.tx_broadcasts.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Broadcast transaction {} to {} peers",
            tx.hash(),
            self.registry.peer_count()
        );
    }

    fn broadcast_block(&self, block: &Block) {
        self.block_broadcasts.fetch_add(1, Ordering::Relaxed);
        let peers = self.registry.peers();
        for peer in &peers {
            debug!("Relaying block {} to {}", block.index(), peer.endpoint());
        }
        info!(
            "Broadcast block {} ({}) to {} peers",
            block.index(),
            block.hash(),
            peers.len()
        );
    }

    fn handle_incoming_transaction(&self, tx: Transaction) -> bool {
        self.blockchain.add_transaction(tx)
    }

    fn status(&self) -> NetworkStatus {
        self.registry.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::tests::sample_tx;

    fn network() -> (LoopbackNetwork, Arc<Blockchain>) {
        let blockchain = Arc::new(Blockchain::with_difficulty(1));
        let registry = PeerRegistry::new("loopback", "127.0.0.1", 8000);
        (LoopbackNetwork::new(registry, Arc::clone(&blockchain)), blockchain)
    }

    #[test]
    fn test_incoming_transactions_reach_mempool() {
        let (network, blockchain) = network();
        assert!(network.handle_incoming_transaction(sample_tx(1)));
        assert_eq!(blockchain.pending_len(), 1);

        let invalid = Transaction::new(vec![], vec![], None);
        assert!(!network.handle_incoming_transaction(invalid));
        assert_eq!(blockchain.pending_len(), 1);
    }

    #[test]
    fn test_broadcasts_are_counted() {
        let (network, _) = network();
        network.registry().add_peer("peer1", "127.0.0.1", 8001).unwrap();

        network.broadcast_transaction(&sample_tx(1));
        network.broadcast_block(&Block::genesis());
        network.broadcast_block(&Block::genesis());

        assert_eq!(network.transactions_broadcast(), 1);
        assert_eq!(network.blocks_broadcast(), 2);
        assert_eq!(network.status().peer_count, 1);
    }

    #[test]
    fn test_lifecycle() {
        let (network, _) = network();
        network.start();
        assert!(network.status().is_running);
        network.stop();
        assert!(!network.status().is_running);
    }
}
