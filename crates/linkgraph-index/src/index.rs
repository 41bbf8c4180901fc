//! The core reverse map.
//!
//! [`LinkIndex`] keeps `IndexKey -> target -> {source}` in nested
//! `BTreeMap`s so lookups and listings come back in a stable order. Entries
//! whose source set empties are dropped, so a target nobody references any
//! more leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use linkgraph_crypto::ContentHasher;
use linkgraph_types::Address;

use crate::diff::{IndexDiff, Membership};
use crate::entry::{IndexKey, LinkOp};

/// Reverse link index: `(field, target) -> set of source origins`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkIndex {
    entries: BTreeMap<IndexKey, BTreeMap<Address, BTreeSet<Address>>>,
}

impl LinkIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(key, target)` entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of source memberships across all entries.
    pub fn memberships(&self) -> usize {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    // ---------------------------------------------------------------
    // Mutators
    // ---------------------------------------------------------------

    /// Add `source` to the entry for `(key, target)`. Idempotent.
    ///
    /// Returns `true` if the membership was new.
    pub fn insert(&mut self, key: &IndexKey, target: Address, source: Address) -> bool {
        self.entries
            .entry(key.clone())
            .or_default()
            .entry(target)
            .or_default()
            .insert(source)
    }

    /// Remove `source` from the entry for `(key, target)`. Idempotent.
    ///
    /// Returns `true` if the membership existed.
    pub fn remove(&mut self, key: &IndexKey, target: Address, source: Address) -> bool {
        let Some(targets) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(sources) = targets.get_mut(&target) else {
            return false;
        };

        let removed = sources.remove(&source);
        if sources.is_empty() {
            targets.remove(&target);
        }
        if targets.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    /// Apply a batch of ops in order.
    pub fn apply(&mut self, ops: &[LinkOp]) {
        let mut changed = 0usize;
        for op in ops {
            let effective = match op {
                LinkOp::Insert {
                    key,
                    target,
                    source,
                } => self.insert(key, *target, *source),
                LinkOp::Remove {
                    key,
                    target,
                    source,
                } => self.remove(key, *target, *source),
            };
            if effective {
                changed += 1;
            }
        }
        if !ops.is_empty() {
            let inserts = ops.iter().filter(|op| op.is_insert()).count();
            debug!(
                inserts,
                removes = ops.len() - inserts,
                changed,
                entries = self.entries.len(),
                "link ops applied"
            );
        }
    }

    // ---------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------

    /// Current sources referencing `target` through `key`, ascending.
    pub fn lookup(&self, key: &IndexKey, target: &Address) -> BTreeSet<Address> {
        self.entries
            .get(key)
            .and_then(|targets| targets.get(target))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if `source` is in the entry for `(key, target)`.
    pub fn contains(&self, key: &IndexKey, target: &Address, source: &Address) -> bool {
        self.entries
            .get(key)
            .and_then(|targets| targets.get(target))
            .is_some_and(|sources| sources.contains(source))
    }

    /// Every membership in key, target, source order.
    pub fn iter(&self) -> impl Iterator<Item = Membership> + '_ {
        self.entries.iter().flat_map(|(key, targets)| {
            targets.iter().flat_map(move |(target, sources)| {
                sources.iter().map(move |source| Membership {
                    key: key.clone(),
                    target: *target,
                    source: *source,
                })
            })
        })
    }

    // ---------------------------------------------------------------
    // Consistency
    // ---------------------------------------------------------------

    /// Compare this index against `expected`.
    ///
    /// `missing` lists memberships only `expected` has; `stale` lists
    /// memberships only this index has.
    pub fn diff(&self, expected: &LinkIndex) -> IndexDiff {
        let mut result = IndexDiff::new();
        for membership in expected.iter() {
            if !self.contains(&membership.key, &membership.target, &membership.source) {
                result.missing.push(membership);
            }
        }
        for membership in self.iter() {
            if !expected.contains(&membership.key, &membership.target, &membership.source) {
                result.stale.push(membership);
            }
        }
        result
    }

    /// Content fingerprint over every membership, for cheap equality checks
    /// across processes.
    pub fn fingerprint(&self) -> Address {
        let mut canonical = String::new();
        for m in self.iter() {
            canonical.push_str(&format!("{}|{}|{}\n", m.key, m.target, m.source));
        }
        ContentHasher::INDEX.hash(canonical.as_bytes())
    }
}
