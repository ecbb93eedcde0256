//! Fingerprint: the height-stamped state digest exchanged between peers.

use serde::{Deserialize, Serialize};

use crate::digest::StateDigest;

/// A fingerprint of the committed ledger state at a given height.
///
/// `prev_digest`, when present, links to the fingerprint at `height - 1`,
/// forming a hash chain. The network layer transmits the link unmodified;
/// checking it is a consumer concern (see [`crate::chain`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The ledger height this digest was computed at.
    pub height: u64,

    /// Digest of the full state at `height`.
    pub digest: StateDigest,

    /// Digest of the state at `height - 1`, if known.
    pub prev_digest: Option<StateDigest>,
}

impl Fingerprint {
    /// Create a fingerprint with an explicit chain link.
    pub fn new(height: u64, digest: StateDigest, prev_digest: Option<StateDigest>) -> Self {
        Self {
            height,
            digest,
            prev_digest,
        }
    }

    /// Create the height-zero fingerprint, which has no predecessor.
    pub fn genesis(digest: StateDigest) -> Self {
        Self {
            height: 0,
            digest,
            prev_digest: None,
        }
    }

    /// Create the fingerprint at `height + 1`, linked to this one.
    pub fn next(&self, digest: StateDigest) -> Self {
        Self {
            height: self.height + 1,
            digest,
            prev_digest: Some(self.digest),
        }
    }

    /// Whether this fingerprint directly extends `prev`.
    ///
    /// True only if the heights are adjacent and the chain link matches.
    pub fn is_successor_of(&self, prev: &Fingerprint) -> bool {
        self.height == prev.height + 1 && self.prev_digest == Some(prev.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_has_no_predecessor() {
        let fp = Fingerprint::genesis(StateDigest::of(b"genesis"));
        assert_eq!(fp.height, 0);
        assert!(fp.prev_digest.is_none());
    }

    #[test]
    fn test_next_links_to_parent() {
        let genesis = Fingerprint::genesis(StateDigest::of(b"genesis"));
        let child = genesis.next(StateDigest::of(b"height 1"));

        assert_eq!(child.height, 1);
        assert_eq!(child.prev_digest, Some(genesis.digest));
        assert!(child.is_successor_of(&genesis));
    }

    #[test]
    fn test_successor_rejects_height_gap() {
        let genesis = Fingerprint::genesis(StateDigest::of(b"genesis"));
        let skipped = Fingerprint::new(2, StateDigest::of(b"height 2"), Some(genesis.digest));
        assert!(!skipped.is_successor_of(&genesis));
    }

    #[test]
    fn test_successor_rejects_wrong_link() {
        let genesis = Fingerprint::genesis(StateDigest::of(b"genesis"));
        let forged = Fingerprint::new(1, StateDigest::of(b"height 1"), Some(StateDigest::ZERO));
        assert!(!forged.is_successor_of(&genesis));
    }

    #[test]
    fn test_successor_requires_link() {
        let genesis = Fingerprint::genesis(StateDigest::of(b"genesis"));
        let unlinked = Fingerprint::new(1, StateDigest::of(b"height 1"), None);
        assert!(!unlinked.is_successor_of(&genesis));
    }
}
