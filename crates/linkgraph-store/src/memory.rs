use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use linkgraph_types::Address;

use crate::error::{StoreError, StoreResult};
use crate::revision::{AppendRequest, Revision, StoredRevision};
use crate::traits::RecordStore;

#[derive(Default)]
struct StoreState {
    /// Arena of every revision ever written, keyed by address.
    revisions: HashMap<Address, StoredRevision>,
    /// Origin -> current head address. Tombstoned origins are removed.
    heads: HashMap<Address, Address>,
    tombstones: HashSet<Address>,
}

impl StoreState {
    fn head_of(&self, origin: &Address) -> StoreResult<Address> {
        if self.tombstones.contains(origin) {
            return Err(StoreError::NotFound(*origin));
        }
        self.heads
            .get(origin)
            .copied()
            .ok_or(StoreError::NotFound(*origin))
    }

    fn revision(&self, address: &Address) -> StoreResult<&StoredRevision> {
        self.revisions
            .get(address)
            .ok_or(StoreError::NotFound(*address))
    }
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All state is held behind one `RwLock`,
/// so each append or tombstone is atomic with respect to every other
/// operation on the same store. Several managers sharing one store behave
/// like several agents writing to one substrate.
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Number of revisions in the arena, including superseded and
    /// tombstoned ones.
    pub fn len(&self) -> usize {
        self.read_state().map(|s| s.revisions.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing has ever been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live (non-tombstoned) origins.
    pub fn live_count(&self) -> usize {
        self.read_state().map(|s| s.heads.len()).unwrap_or(0)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_head(&self, origin: &Address) -> StoreResult<StoredRevision> {
        let state = self.read_state()?;
        let head = state.head_of(origin)?;
        state.revision(&head).cloned()
    }

    fn read_revision(&self, address: &Address) -> StoreResult<StoredRevision> {
        let state = self.read_state()?;
        let revision = state.revision(address)?;
        if state.tombstones.contains(&revision.origin()) {
            return Err(StoreError::NotFound(*address));
        }
        Ok(revision.clone())
    }

    fn append(&self, request: AppendRequest) -> StoreResult<StoredRevision> {
        let mut state = self.write_state()?;

        let stored = match request {
            AppendRequest::Genesis { entity, fields } => {
                Revision::genesis(entity, fields).seal()?
            }
            AppendRequest::Successor {
                origin,
                predecessor,
                fields,
            } => {
                let current = state.head_of(&origin)?;
                if current != predecessor {
                    return Err(StoreError::HeadMismatch {
                        origin,
                        expected: predecessor,
                        actual: current,
                    });
                }
                let head = state.revision(&current)?;
                Revision::successor(head, fields).seal()?
            }
        };

        if stored.address.is_null() {
            return Err(StoreError::NullAddress);
        }

        let origin = stored.origin();
        state.heads.insert(origin, stored.address);
        state.revisions.insert(stored.address, stored.clone());
        debug!(
            origin = %origin.short_hex(),
            revision = %stored.address.short_hex(),
            seq = stored.revision.seq,
            "revision appended"
        );
        Ok(stored)
    }

    fn tombstone(&self, origin: &Address, expected_head: &Address) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let current = state.head_of(origin)?;
        if current != *expected_head {
            return Err(StoreError::HeadMismatch {
                origin: *origin,
                expected: *expected_head,
                actual: current,
            });
        }
        state.heads.remove(origin);
        state.tombstones.insert(*origin);
        debug!(origin = %origin.short_hex(), "origin tombstoned");
        Ok(())
    }

    fn live_heads(&self) -> StoreResult<Vec<StoredRevision>> {
        let state = self.read_state()?;
        let mut heads = state
            .heads
            .values()
            .map(|address| state.revision(address).cloned())
            .collect::<StoreResult<Vec<_>>>()?;
        heads.sort_by_key(StoredRevision::origin);
        Ok(heads)
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("revision_count", &self.len())
            .field("live_count", &self.live_count())
            .finish()
    }
}
