//! Strong type for state digests.
//!
//! A digest is a newtype over 32 bytes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte digest of committed ledger state.
///
/// Two nodes that computed their state deterministically hold the same
/// digest at the same height; a mismatch is the signal that one of them
/// has diverged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDigest(pub [u8; 32]);

impl StateDigest {
    /// Create a new StateDigest from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the digest of a canonical state encoding.
    pub fn of(state_bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"hashline-digest-v0:");
        hasher.update(state_bytes);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero digest (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for StateDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for StateDigest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for StateDigest {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = StateDigest::from_bytes([0x42; 32]);
        let hex = digest.to_hex();
        let recovered = StateDigest::from_hex(&hex).unwrap();
        assert_eq!(digest, recovered);
    }

    #[test]
    fn test_digest_of_deterministic() {
        let d1 = StateDigest::of(b"ledger state at height 7");
        let d2 = StateDigest::of(b"ledger state at height 7");
        assert_eq!(d1, d2);

        let d3 = StateDigest::of(b"ledger state at height 8");
        assert_ne!(d1, d3);
    }

    #[test]
    fn test_digest_display() {
        let digest = StateDigest::from_bytes([0xab; 32]);
        let display = format!("{}", digest);
        assert_eq!(display, "abababababababab");
    }

    #[test]
    fn test_digest_debug() {
        let digest = StateDigest::from_bytes([0xcd; 32]);
        let debug = format!("{:?}", digest);
        assert!(debug.starts_with("StateDigest("));
    }

    #[test]
    fn test_digest_from_hex_rejects_short_input() {
        assert!(StateDigest::from_hex("abcd").is_err());
    }
}
