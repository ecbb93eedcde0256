//! Chain checks and divergence detection over fingerprint sequences.
//!
//! The network layer moves fingerprints around without interpreting them;
//! these helpers are how a consumer decides whether a pulled sequence is
//! well-formed and whether its own state has drifted from a peer's.

use crate::digest::StateDigest;
use crate::error::ChainError;
use crate::fingerprint::Fingerprint;

/// Check that a fingerprint sequence is internally consistent.
///
/// Heights must be strictly increasing. Where an entry is adjacent to its
/// predecessor in the sequence and carries a chain link, the link must
/// point at that predecessor's digest. Links across height gaps cannot be
/// checked locally and are skipped.
pub fn verify_chain(fingerprints: &[Fingerprint]) -> Result<(), ChainError> {
    for pair in fingerprints.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);

        if next.height <= prev.height {
            return Err(ChainError::HeightOrder {
                prev: prev.height,
                next: next.height,
            });
        }

        if next.height == prev.height + 1 {
            if let Some(link) = next.prev_digest {
                if link != prev.digest {
                    return Err(ChainError::BrokenLink {
                        height: next.height,
                    });
                }
            }
        }
    }
    Ok(())
}

/// The first height at which two fingerprint sequences disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Height of the first mismatching digest.
    pub height: u64,
    /// What the local node holds at that height.
    pub local: StateDigest,
    /// What the peer reported at that height.
    pub remote: StateDigest,
}

/// Find the first height present in both sequences where the digests
/// differ.
///
/// Heights present in only one sequence are not evidence of divergence;
/// the peer may simply hold more or less history. Returns `None` when
/// every shared height agrees.
pub fn first_divergence(local: &[Fingerprint], remote: &[Fingerprint]) -> Option<Divergence> {
    let mut mismatches: Vec<Divergence> = Vec::new();

    for ours in local {
        if let Some(theirs) = remote.iter().find(|fp| fp.height == ours.height) {
            if theirs.digest != ours.digest {
                mismatches.push(Divergence {
                    height: ours.height,
                    local: ours.digest,
                    remote: theirs.digest,
                });
            }
        }
    }

    mismatches.into_iter().min_by_key(|d| d.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(tag: u8, start: u64, count: usize) -> Vec<Fingerprint> {
        let mut out = Vec::with_capacity(count);
        let mut prev: Option<Fingerprint> = None;
        for i in 0..count {
            let height = start + i as u64;
            let digest = StateDigest::of(format!("{tag}:{height}").as_bytes());
            let fp = match &prev {
                Some(p) => p.next(digest),
                None => Fingerprint::new(height, digest, None),
            };
            out.push(fp.clone());
            prev = Some(fp);
        }
        out
    }

    #[test]
    fn test_verify_chain_accepts_well_formed() {
        let fps = chain(1, 100, 10);
        assert!(verify_chain(&fps).is_ok());
    }

    #[test]
    fn test_verify_chain_accepts_empty_and_singleton() {
        assert!(verify_chain(&[]).is_ok());
        assert!(verify_chain(&chain(1, 5, 1)).is_ok());
    }

    #[test]
    fn test_verify_chain_rejects_height_regression() {
        let mut fps = chain(1, 100, 3);
        fps[2].height = 100;
        let err = verify_chain(&fps).unwrap_err();
        assert!(matches!(err, ChainError::HeightOrder { .. }));
    }

    #[test]
    fn test_verify_chain_rejects_broken_link() {
        let mut fps = chain(1, 100, 3);
        fps[1].prev_digest = Some(StateDigest::ZERO);
        let err = verify_chain(&fps).unwrap_err();
        assert!(matches!(err, ChainError::BrokenLink { height: 101 }));
    }

    #[test]
    fn test_verify_chain_skips_gap_links() {
        // A gap between 100 and 105: the link at 105 cannot be checked.
        let a = Fingerprint::new(100, StateDigest::of(b"a"), None);
        let b = Fingerprint::new(105, StateDigest::of(b"b"), Some(StateDigest::ZERO));
        assert!(verify_chain(&[a, b]).is_ok());
    }

    #[test]
    fn test_no_divergence_on_identical_chains() {
        let fps = chain(1, 100, 10);
        assert_eq!(first_divergence(&fps, &fps), None);
    }

    #[test]
    fn test_no_divergence_on_disjoint_heights() {
        let ours = chain(1, 100, 5);
        let theirs = chain(1, 200, 5);
        assert_eq!(first_divergence(&ours, &theirs), None);
    }

    #[test]
    fn test_first_divergence_reports_lowest_height() {
        let ours = chain(1, 100, 10);
        let mut theirs = ours.clone();
        theirs[7].digest = StateDigest::of(b"tampered late");
        theirs[3].digest = StateDigest::of(b"tampered early");

        let divergence = first_divergence(&ours, &theirs).unwrap();
        assert_eq!(divergence.height, 103);
        assert_eq!(divergence.local, ours[3].digest);
        assert_eq!(divergence.remote, theirs[3].digest);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_linked_chain_verifies(
                tag in any::<u8>(),
                start in 0u64..1_000_000,
                count in 0usize..64,
            ) {
                let fps = chain(tag, start, count);
                prop_assert!(verify_chain(&fps).is_ok());
            }

            #[test]
            fn single_tampered_digest_is_found(
                start in 0u64..1_000_000,
                count in 1usize..64,
                victim in any::<prop::sample::Index>(),
            ) {
                let ours = chain(1, start, count);
                let mut theirs = ours.clone();
                let at = victim.index(count);
                theirs[at].digest = StateDigest::of(b"tampered");

                let divergence = first_divergence(&ours, &theirs);
                prop_assert_eq!(divergence.map(|d| d.height), Some(start + at as u64));
            }
        }
    }
}
