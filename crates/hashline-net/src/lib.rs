//! # Hashline Net
//!
//! Peer-to-peer reconciliation protocol for ledger state fingerprints.
//!
//! ## Overview
//!
//! Independently operating nodes commit a compact fingerprint of their
//! ledger state at each height. This crate is the session and correlation
//! layer that moves those fingerprints between peers: announcements are
//! pushed to everyone as heights are committed, and historical
//! fingerprints are pulled from individual peers on demand, so a node can
//! discover divergence without exchanging full state.
//!
//! ## Key Properties
//!
//! - **One pull per peer**: a second pull to a pending peer supersedes
//!   the first; the stale answer is discarded by token mismatch
//! - **Exactly-once delivery**: a response completes at most one session,
//!   and completed sessions never fire again
//! - **Failure is local**: a peer disconnecting mid-request faults only
//!   its own session; nothing else is disturbed
//! - **Single-threaded consumers**: all listener callbacks are marshaled
//!   onto one dispatch task
//!
//! ## Message Flow
//!
//! ```text
//! Node A                              Node B
//!   |-------- Announcement ----------->|   (new height committed)
//!   |                                  |
//!   |-------- Request{token} --------->|   (pull_from)
//!   |<------- Response{token} ---------|   (listener answers)
//!   |                                  |
//!   | on_pull_result(fingerprints, B)  |
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hashline_net::{MemoryNetwork, NodeAddress, ReconConfig, ReconService, StaticPeerDirectory};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let address = NodeAddress::random();
//!     let transport = Arc::new(network.create_transport(address).await);
//!
//!     let seed = NodeAddress::random();
//!     let directory = Arc::new(StaticPeerDirectory::new([seed]));
//!
//!     let service = ReconService::new(transport, directory, ReconConfig::default());
//!     service.register_for_transport_events();
//!     service.pull_from_all_authoritative_peers(0);
//! }
//! ```

pub mod error;
pub mod messages;
pub mod peers;
pub mod service;
pub mod session;
pub mod transport;

pub use error::{NetError, Result};
pub use messages::{
    limits, Envelope, FingerprintAnnouncement, FingerprintRequest, FingerprintResponse,
    NodeAddress,
};
pub use peers::{PeerDirectory, StaticPeerDirectory};
pub use service::{ReconConfig, ReconListener, ReconService, ResponseObserver};
pub use session::{PullSession, SessionState};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
