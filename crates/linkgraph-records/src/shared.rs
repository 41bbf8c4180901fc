use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use linkgraph_index::{IndexKey, LinkIndex};
use linkgraph_types::Address;

use crate::error::{RecordError, RecordResult};

/// A link index shared between one agent's writer and its readers.
///
/// Writers hold the write guard for the whole of a write (store append plus
/// index delta), so a reader holding the read guard sees either all of a
/// write's effects or none.
#[derive(Clone, Default)]
pub struct SharedIndex(Arc<RwLock<LinkIndex>>);

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RecordResult<RwLockReadGuard<'_, LinkIndex>> {
        self.0.read().map_err(|_| RecordError::IndexLockPoisoned)
    }

    pub(crate) fn write(&self) -> RecordResult<RwLockWriteGuard<'_, LinkIndex>> {
        self.0.write().map_err(|_| RecordError::IndexLockPoisoned)
    }

    /// Current sources for `(key, target)`.
    pub fn lookup(&self, key: &IndexKey, target: &Address) -> RecordResult<BTreeSet<Address>> {
        Ok(self.read()?.lookup(key, target))
    }

    /// Content fingerprint of the index; equal on two agents exactly when
    /// their indexes hold the same memberships.
    pub fn fingerprint(&self) -> RecordResult<Address> {
        Ok(self.read()?.fingerprint())
    }

    /// A point-in-time copy of the whole index.
    pub fn snapshot(&self) -> RecordResult<LinkIndex> {
        Ok(self.read()?.clone())
    }
}

impl std::fmt::Debug for SharedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.read() {
            Ok(index) => f
                .debug_struct("SharedIndex")
                .field("entries", &index.len())
                .field("memberships", &index.memberships())
                .finish(),
            Err(_) => f.write_str("SharedIndex(<poisoned>)"),
        }
    }
}
