//! Error types for record operations.

use thiserror::Error;

use linkgraph_store::StoreError;
use linkgraph_types::{Address, TypeError};

/// A write or query was malformed. Raised before any store or index
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("unknown field {entity}.{field}")]
    UnknownField { entity: String, field: String },

    #[error("{entity}.{field} is not a link field")]
    NotALinkField { entity: String, field: String },

    #[error("invalid value for {entity}.{field}: {reason}")]
    InvalidValue {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("missing required field {entity}.{field}")]
    MissingRequired { entity: String, field: String },

    #[error("{entity}.{field} links to the null address")]
    NullLinkTarget { entity: String, field: String },

    #[error("{entity}.{field} links to {target}, which is not a live {expected}")]
    DanglingLink {
        entity: String,
        field: String,
        target: Address,
        expected: String,
    },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid page cursor: {0}")]
    InvalidCursor(String),
}

impl From<TypeError> for ValidationError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidRecordId { .. } | TypeError::InvalidHex(_) => {
                Self::InvalidRecordId(err.to_string())
            }
            TypeError::InvalidLength { .. } => Self::InvalidRecordId(err.to_string()),
            TypeError::InvalidName { .. } => Self::InvalidName(err.to_string()),
        }
    }
}

/// Errors surfaced by the lifecycle manager and the query service.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The presented revision is not the current head. Re-read and retry.
    #[error("stale revision for {origin}: presented {presented}, current head is {current}")]
    StaleRevision {
        origin: Address,
        presented: Address,
        current: Address,
    },

    /// The origin or revision is absent or tombstoned.
    #[error("no entry at this address: {0}")]
    NotFound(Address),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("revision chain integrity: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("link index lock poisoned")]
    IndexLockPoisoned,
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(address) => Self::NotFound(address),
            StoreError::HeadMismatch {
                origin,
                expected,
                actual,
            } => Self::StaleRevision {
                origin,
                presented: expected,
                current: actual,
            },
            other => Self::Store(other),
        }
    }
}

impl From<TypeError> for RecordError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.into())
    }
}

impl RecordError {
    /// Returns `true` for optimistic-concurrency conflicts.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleRevision { .. })
    }

    /// Returns `true` when the address is absent or tombstoned.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience alias for record results.
pub type RecordResult<T> = Result<T, RecordError>;
