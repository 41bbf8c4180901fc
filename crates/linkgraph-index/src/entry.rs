//! Index keys and mutation types.

use std::fmt;

use serde::{Deserialize, Serialize};
use linkgraph_types::{Address, EntityType, FieldName};

/// Identifies one indexed field: the entity type that owns it and its name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexKey {
    pub entity: EntityType,
    pub field: FieldName,
}

impl IndexKey {
    /// Create a new index key.
    pub fn new(entity: EntityType, field: FieldName) -> Self {
        Self { entity, field }
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({}.{})", self.entity, self.field)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

/// A link field whose targets are indexed.
///
/// When `reciprocal` is set, every membership `(key, target) -> source` is
/// mirrored as `(reciprocal, source) -> target`, so the relationship can be
/// queried from the target's side as well.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedField {
    pub key: IndexKey,
    pub reciprocal: Option<IndexKey>,
}

impl IndexedField {
    /// An indexed field without a reciprocal.
    pub fn new(key: IndexKey) -> Self {
        Self {
            key,
            reciprocal: None,
        }
    }

    /// Attach a reciprocal key.
    pub fn with_reciprocal(mut self, reciprocal: IndexKey) -> Self {
        self.reciprocal = Some(reciprocal);
        self
    }
}

/// One mechanical index mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOp {
    /// Add `source` to the entry for `(key, target)`.
    Insert {
        key: IndexKey,
        target: Address,
        source: Address,
    },
    /// Remove `source` from the entry for `(key, target)`.
    Remove {
        key: IndexKey,
        target: Address,
        source: Address,
    },
}

impl LinkOp {
    /// The key this op touches.
    pub fn key(&self) -> &IndexKey {
        match self {
            Self::Insert { key, .. } | Self::Remove { key, .. } => key,
        }
    }

    /// Returns `true` for inserts.
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. })
    }
}
