//! Proptest generators for property-based testing.

use proptest::prelude::*;

use hashline_core::{Fingerprint, StateDigest};
use hashline_net::NodeAddress;

/// Generate a random StateDigest.
pub fn state_digest() -> impl Strategy<Value = StateDigest> {
    any::<[u8; 32]>().prop_map(StateDigest::from_bytes)
}

/// Generate a random NodeAddress.
pub fn node_address() -> impl Strategy<Value = NodeAddress> {
    any::<[u8; 32]>().prop_map(NodeAddress::from_bytes)
}

/// Generate a standalone fingerprint with an arbitrary chain link.
pub fn fingerprint() -> impl Strategy<Value = Fingerprint> {
    (
        0u64..1_000_000,
        state_digest(),
        prop::option::of(state_digest()),
    )
        .prop_map(|(height, digest, prev)| Fingerprint::new(height, digest, prev))
}

/// Generate a correctly linked chain of up to `max_len` fingerprints.
pub fn linked_chain(max_len: usize) -> impl Strategy<Value = Vec<Fingerprint>> {
    (
        0u64..1_000_000,
        prop::collection::vec(state_digest(), 0..=max_len),
    )
        .prop_map(|(start, digests)| {
            let mut out: Vec<Fingerprint> = Vec::with_capacity(digests.len());
            for (i, digest) in digests.into_iter().enumerate() {
                let fp = match out.last() {
                    Some(prev) => prev.next(digest),
                    None => Fingerprint::new(start + i as u64, digest, None),
                };
                out.push(fp);
            }
            out
        })
}
