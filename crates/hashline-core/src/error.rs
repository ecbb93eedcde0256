//! Error types for the core crate.

use thiserror::Error;

/// Errors found while checking a fingerprint sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("heights not strictly increasing: {prev} followed by {next}")]
    HeightOrder { prev: u64, next: u64 },

    #[error("chain link at height {height} does not match preceding digest")]
    BrokenLink { height: u64 },
}
