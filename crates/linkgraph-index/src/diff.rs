//! Index comparison results.
//!
//! These types represent the outcome of comparing a live index against one
//! rebuilt from the record store.

use serde::{Deserialize, Serialize};
use linkgraph_types::Address;

use crate::entry::IndexKey;

/// One `(key, target) -> source` membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub key: IndexKey,
    pub target: Address,
    pub source: Address,
}

/// Differences between a live index and the expected one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDiff {
    /// Memberships the live index lacks.
    pub missing: Vec<Membership>,
    /// Memberships the live index holds but should not.
    pub stale: Vec<Membership>,
}

impl IndexDiff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the two indexes agree exactly.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }

    /// Total number of discrepancies.
    pub fn total_entries(&self) -> usize {
        self.missing.len() + self.stale.len()
    }
}
