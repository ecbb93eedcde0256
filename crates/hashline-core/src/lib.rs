//! # Hashline Core
//!
//! Pure primitives for Hashline: state digests, fingerprints, and chain
//! checks.
//!
//! This crate contains no I/O and no networking. It is pure computation
//! over the data the reconciliation protocol moves around.
//!
//! ## Key Types
//!
//! - [`StateDigest`] - 32-byte Blake3 digest of committed ledger state
//! - [`Fingerprint`] - a digest stamped with the height it was computed at
//! - [`Divergence`] - the first height at which two nodes disagree
//!
//! ## Chain Checks
//!
//! Fingerprints carry an optional link to their predecessor, forming a
//! hash chain. The [`chain`] module checks pulled sequences and locates
//! divergence; the network layer itself never interprets the link.

pub mod chain;
pub mod digest;
pub mod error;
pub mod fingerprint;

pub use chain::{first_divergence, verify_chain, Divergence};
pub use digest::StateDigest;
pub use error::ChainError;
pub use fingerprint::Fingerprint;
