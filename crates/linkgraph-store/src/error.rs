use linkgraph_types::Address;

/// Errors from record store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No live entry exists at this address (absent or tombstoned).
    #[error("no entry at this address: {0}")]
    NotFound(Address),

    /// The presented head is not the origin's current head.
    #[error("head mismatch for {origin}: expected {expected}, current {actual}")]
    HeadMismatch {
        origin: Address,
        expected: Address,
        actual: Address,
    },

    /// Attempted to address a revision with the null address.
    #[error("null address is not a valid revision")]
    NullAddress,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored revision does not hash to its address.
    #[error("corrupt revision {address}: {reason}")]
    CorruptRevision { address: Address, reason: String },

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
