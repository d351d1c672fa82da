//! Networking module
//!
//! Provides the hooks a node uses to publish transactions and blocks,
//! a registry of known peers and an in-process loopback transport.

pub mod loopback;
pub mod peer;
pub mod sink;

pub use loopback::LoopbackNetwork;
pub use peer::{NetworkStatus, PeerError, PeerInfo, PeerRegistry, MAX_PEERS};
pub use sink::NetworkSink;
