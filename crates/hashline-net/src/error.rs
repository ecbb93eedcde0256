//! Error types for the reconciliation network layer.
//!
//! Every failure here is local to one peer interaction; nothing in this
//! taxonomy aborts the service or other in-flight sessions.

use thiserror::Error;

use crate::messages::NodeAddress;

/// Errors that can occur at the transport boundary.
#[derive(Debug, Error)]
pub enum NetError {
    /// Transport-level delivery failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The target peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(NodeAddress),

    /// Envelope could not be encoded for the wire.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Envelope exceeds protocol size limits.
    #[error("envelope exceeds limits: {0}")]
    LimitExceeded(&'static str),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
