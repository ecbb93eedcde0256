//! Reconciliation protocol message types.
//!
//! Three message shapes ride the shared transport: an unsolicited
//! announcement of a newly committed fingerprint, a correlated request for
//! historical fingerprints, and its response.

use serde::{Deserialize, Serialize};
use std::fmt;

use hashline_core::Fingerprint;

/// Unique identifier for a node on the reconciliation network.
///
/// The transport stamps every inbound envelope with the sender's address;
/// outbound sends and the pull session table are keyed by it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress(pub [u8; 32]);

impl NodeAddress {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node address.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress({})", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..16])
    }
}

/// Message size limits.
pub mod limits {
    /// Max fingerprints in a single response envelope.
    pub const MAX_FINGERPRINTS_PER_RESPONSE: usize = 10_000;
}

/// Unsolicited broadcast of one newly committed fingerprint.
///
/// Fire-and-forget: no response is expected and none is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintAnnouncement {
    /// The fingerprint the sender just committed.
    pub fingerprint: Fingerprint,
}

/// Request for a peer's fingerprints at or above a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRequest {
    /// Correlation token, echoed verbatim in the matching response.
    pub token: u64,
    /// Asks for every fingerprint the responder holds at or above this height.
    pub from_height: u64,
}

/// Answer to a [`FingerprintRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintResponse {
    /// The request's token, echoed back.
    pub token: u64,
    /// Fingerprints ordered by non-decreasing height. Empty means the
    /// responder holds nothing at or above the requested height.
    pub fingerprints: Vec<Fingerprint>,
}

impl FingerprintResponse {
    /// Build a response, sorting the fingerprints into height order.
    pub fn new(token: u64, mut fingerprints: Vec<Fingerprint>) -> Self {
        fingerprints.sort_by_key(|fp| fp.height);
        Self {
            token,
            fingerprints,
        }
    }
}

/// Envelope carried by the transport.
///
/// The transport multiplexes unrelated message families over the same
/// connections; `Keepalive` stands in for traffic this layer ignores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Envelope {
    /// A peer committed a new fingerprint.
    Announcement(FingerprintAnnouncement),

    /// A peer wants our fingerprints from a height onward.
    Request(FingerprintRequest),

    /// A peer is answering one of our requests.
    Response(FingerprintResponse),

    /// Connection liveness probe; not reconciliation traffic.
    Keepalive {
        /// Opaque probe identifier.
        nonce: u64,
    },
}

impl Envelope {
    /// Whether this envelope announces a newly committed fingerprint.
    pub fn is_announcement(&self) -> bool {
        matches!(self, Envelope::Announcement(_))
    }

    /// Whether this envelope asks for historical fingerprints.
    pub fn is_request(&self) -> bool {
        matches!(self, Envelope::Request(_))
    }

    /// Check that this envelope respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            Envelope::Response(res) => {
                if res.fingerprints.len() > limits::MAX_FINGERPRINTS_PER_RESPONSE {
                    return Err("too many fingerprints in response");
                }
            }
            Envelope::Announcement(_) | Envelope::Request(_) | Envelope::Keepalive { .. } => {}
        }
        Ok(())
    }
}
