//! Content hashing for linkgraph.
//!
//! Provides domain-separated BLAKE3 hashing for revision addressing and
//! verification of predecessor chains. All hashing wraps `blake3`; there is
//! no custom cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, ChainLink, RevisionChainVerifier};
pub use hasher::ContentHasher;
