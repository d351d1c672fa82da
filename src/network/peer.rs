//! Peer tracking for a ledger node
//!
//! Keeps the set of known peers and the node's own listening identity.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Maximum number of registered peers
pub const MAX_PEERS: usize = 8;

/// Peer registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeerError {
    #[error("Max peers reached")]
    MaxPeersReached,
    #[error("Peer {0} is already registered")]
    AlreadyRegistered(String),
}

/// Information about a known peer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerInfo {
    pub peer_id: String,
    pub host: String,
    pub port: u16,
    pub added_at: DateTime<Utc>,
}

impl PeerInfo {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Snapshot of the registry for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStatus {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub is_running: bool,
    pub peer_count: usize,
    pub peers: Vec<String>,
}

/// Registry of peers keyed by peer id
#[derive(Debug)]
pub struct PeerRegistry {
    node_id: String,
    host: String,
    port: u16,
    running: AtomicBool,
    peers: RwLock<HashMap<String, PeerInfo>>,
}

impl PeerRegistry {
    pub fn new(node_id: &str, host: &str, port: u16) -> Self {
        Self {
            node_id: node_id.to_string(),
            host: host.to_string(),
            port,
            running: AtomicBool::new(false),
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "Network node {} listening on {}:{}",
            self.node_id,
            self.host,
            self.port
        );
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        log::info!("Network node {} stopped", self.node_id);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Add a new peer
    pub fn add_peer(&self, peer_id: &str, host: &str, port: u16) -> Result<(), PeerError> {
        let mut peers = self.peers.write();

        if peers.contains_key(peer_id) {
            return Err(PeerError::AlreadyRegistered(peer_id.to_string()));
        }
        if peers.len() >= MAX_PEERS {
            return Err(PeerError::MaxPeersReached);
        }

        let info = PeerInfo {
            peer_id: peer_id.to_string(),
            host: host.to_string(),
            port,
            added_at: Utc::now(),
        };
        log::info!("Added peer: {} ({})", peer_id, info.endpoint());
        peers.insert(peer_id.to_string(), info);

        Ok(())
    }

    /// Remove a peer, returning whether it was registered
    pub fn remove_peer(&self, peer_id: &str) -> bool {
        let removed = self.peers.write().remove(peer_id).is_some();
        if removed {
            log::info!("Removed peer: {}", peer_id);
        }
        removed
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.read().contains_key(peer_id)
    }

    /// Get peer info
    pub fn peer(&self, peer_id: &str) -> Option<PeerInfo> {
        self.peers.read().get(peer_id).cloned()
    }

    /// All peers, ordered by id
    pub fn peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self.peers.read().values().cloned().collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    /// Get peer count
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn status(&self) -> NetworkStatus {
        NetworkStatus {
            node_id: self.node_id.clone(),
            host: self.host.clone(),
            port: self.port,
            is_running: self.is_running(),
            peer_count: self.peer_count(),
            peers: self.peers().into_iter().map(|p| p.peer_id).collect(),
        }
    }
}
