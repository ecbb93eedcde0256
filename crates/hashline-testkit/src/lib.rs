//! # Hashline Testkit
//!
//! Testing utilities for Hashline.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: in-memory nodes wired to recording listeners, linked
//!   fingerprint chains, and a responder that serves pulls from a held
//!   history
//! - **Generators**: proptest strategies for fingerprints, chains, and
//!   addresses
//!
//! The crate's `tests/` directory holds the end-to-end reconciliation
//! scenarios that exercise several nodes over the in-memory transport.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hashline_net::MemoryNetwork;
//! use hashline_testkit::fixtures::{fingerprint_chain, TestNode};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let node = TestNode::join_default(&network, 1).await;
//!     let history = fingerprint_chain(1, 0, 10);
//!     node.service.broadcast_fingerprint(history[9].clone());
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    fingerprint_chain, init_test_logging, wait_until, HistoryResponder, RecordingListener,
    RecordingObserver, TestNode,
};
