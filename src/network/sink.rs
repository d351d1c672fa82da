//! Outbound and inbound hooks between a node and its network

use crate::core::{Block, Transaction};
use crate::network::peer::NetworkStatus;

/// Transport a node publishes to and receives transactions from
pub trait NetworkSink: Send + Sync {
    fn start(&self);

    fn stop(&self);

    fn broadcast_transaction(&self, tx: &Transaction);

    fn broadcast_block(&self, block: &Block);

    /// Deliver a transaction received from a peer; true if it was admitted
    fn handle_incoming_transaction(&self, tx: Transaction) -> bool;

    fn status(&self) -> NetworkStatus;
}
