//! The record lifecycle manager.
//!
//! Every write runs in the same order under the index write guard:
//! validate, check the presented revision, append (or tombstone) in the
//! store, then apply the planned index delta. The store step is the only
//! one that can fail after validation, and it fails before the index is
//! touched, so a rejected write leaves both sides as they were.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use linkgraph_crypto::RevisionChainVerifier;
use linkgraph_index::{plan_link_ops, IndexDiff, LinkIndex};
use linkgraph_store::{AppendRequest, RecordStore, StoreError, StoredRevision};
use linkgraph_types::field::{apply_patch, normalize};
use linkgraph_types::{Address, EntityType, Fields, Patch, RecordId};

use crate::error::{RecordError, RecordResult, ValidationError};
use crate::record::Record;
use crate::schema::Schema;
use crate::shared::SharedIndex;

/// Creates, updates, and deletes records while keeping one agent's link
/// index in step with the store.
pub struct RecordManager {
    schema: Arc<Schema>,
    store: Arc<dyn RecordStore>,
    index: SharedIndex,
    require_live_targets: bool,
}

impl RecordManager {
    /// A manager writing records of `schema` into `store`.
    ///
    /// The schema is checked first: a reciprocal that shadows a declared
    /// field would share one index key between two fields.
    pub fn new(
        schema: Arc<Schema>,
        store: Arc<dyn RecordStore>,
        index: SharedIndex,
    ) -> RecordResult<Self> {
        schema.check()?;
        Ok(Self {
            schema,
            store,
            index,
            require_live_targets: true,
        })
    }

    /// Toggle the check that newly added link targets are live records of
    /// the declared type.
    pub fn with_live_target_check(mut self, enabled: bool) -> Self {
        self.require_live_targets = enabled;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Create a record. Its first revision's address becomes its origin.
    pub fn create(&self, entity: &EntityType, fields: Fields) -> RecordResult<Record> {
        let fields = normalize(fields);
        self.schema.validate_fields(entity, &fields)?;
        let indexed = self.schema.indexed_fields(entity)?;

        let mut index = self.index.write()?;
        self.check_targets(entity, None, &fields)?;

        let stored = self.store.append(AppendRequest::Genesis {
            entity: entity.clone(),
            fields,
        })?;
        let ops = plan_link_ops(stored.origin(), None, Some(&stored.revision.fields), &indexed);
        index.apply(&ops);

        info!(
            entity = %entity,
            origin = %stored.address.short_hex(),
            links = ops.len(),
            "record created"
        );
        Ok(self.view(&stored))
    }

    /// Update the record at `origin`, presenting `revision_id` as the head
    /// the patch was written against.
    ///
    /// Fields absent from `patch` carry over unchanged; only link fields
    /// whose target set actually changes touch the index.
    pub fn update(&self, origin: &Address, revision_id: &Address, patch: &Patch) -> RecordResult<Record> {
        let mut index = self.index.write()?;

        let head = self.store.get_head(origin)?;
        ensure_head(origin, revision_id, &head)?;

        let entity = head.revision.entity.clone();
        self.schema.validate_patch(&entity, patch)?;
        let next = apply_patch(&head.revision.fields, patch);
        self.schema.validate_fields(&entity, &next)?;
        let indexed = self.schema.indexed_fields(&entity)?;
        self.check_targets(&entity, Some(&head.revision.fields), &next)?;

        let stored = self.store.append(AppendRequest::Successor {
            origin: *origin,
            predecessor: *revision_id,
            fields: next,
        })?;
        let ops = plan_link_ops(
            *origin,
            Some(&head.revision.fields),
            Some(&stored.revision.fields),
            &indexed,
        );
        index.apply(&ops);

        debug!(
            entity = %entity,
            origin = %origin.short_hex(),
            seq = stored.revision.seq,
            ops = ops.len(),
            "record updated"
        );
        Ok(self.view(&stored))
    }

    /// Tombstone the record at `origin`, presenting `revision_id` as its
    /// current head. Every index entry it contributed is removed.
    pub fn delete(&self, origin: &Address, revision_id: &Address) -> RecordResult<bool> {
        let mut index = self.index.write()?;

        let head = self.store.get_head(origin)?;
        ensure_head(origin, revision_id, &head)?;
        let indexed = self.schema.indexed_fields(&head.revision.entity)?;

        self.store.tombstone(origin, revision_id)?;
        let ops = plan_link_ops(*origin, Some(&head.revision.fields), None, &indexed);
        index.apply(&ops);

        info!(
            entity = %head.revision.entity,
            origin = %origin.short_hex(),
            links = ops.len(),
            "record deleted"
        );
        Ok(true)
    }

    /// Delete by revision address alone: the revision names its origin.
    pub fn delete_revision(&self, revision_id: &Address) -> RecordResult<bool> {
        let revision = self.store.read_revision(revision_id)?;
        self.delete(&revision.origin(), revision_id)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// The current head of `origin`.
    pub fn get(&self, origin: &Address) -> RecordResult<Record> {
        let head = self.store.get_head(origin)?;
        Ok(self.view(&head))
    }

    /// Resolve a boundary identifier. The prefix is informational; lookup
    /// is by origin.
    pub fn get_by_id(&self, id: &RecordId) -> RecordResult<Record> {
        self.get(&id.origin())
    }

    /// A specific revision of a live record.
    pub fn get_revision(&self, revision_id: &Address) -> RecordResult<Record> {
        let revision = self.store.read_revision(revision_id)?;
        Ok(self.view(&revision))
    }

    /// Every revision of `origin`, newest first.
    pub fn history(&self, origin: &Address) -> RecordResult<Vec<Record>> {
        Ok(self
            .store
            .history(origin)?
            .iter()
            .map(|revision| self.view(revision))
            .collect())
    }

    /// Re-hash and re-link the revision chain of `origin`. Returns its
    /// length.
    pub fn verify_history(&self, origin: &Address) -> RecordResult<usize> {
        let mut chain = self.store.history(origin)?;
        chain.reverse();
        RevisionChainVerifier::verify_chain(chain.as_slice())
            .map_err(|e| RecordError::Integrity(format!("{}: {e}", origin.short_hex())))?;
        Ok(chain.len())
    }

    // ---------------------------------------------------------------
    // Index maintenance
    // ---------------------------------------------------------------

    /// The index the store's live heads imply.
    ///
    /// Heads of entities the schema does not declare are skipped.
    pub fn expected_index(&self) -> RecordResult<LinkIndex> {
        let mut expected = LinkIndex::new();
        for head in self.store.live_heads()? {
            let indexed = match self.schema.indexed_fields(&head.revision.entity) {
                Ok(indexed) => indexed,
                Err(e) => {
                    warn!(origin = %head.origin().short_hex(), error = %e, "skipping undeclared record");
                    continue;
                }
            };
            let ops = plan_link_ops(head.origin(), None, Some(&head.revision.fields), &indexed);
            expected.apply(&ops);
        }
        Ok(expected)
    }

    /// Replace the index with one rebuilt from the store. Returns the
    /// number of memberships.
    ///
    /// This is how an agent catches up with writes other agents made to a
    /// shared store.
    pub fn rebuild_index(&self) -> RecordResult<usize> {
        let mut index = self.index.write()?;
        *index = self.expected_index()?;
        let memberships = index.memberships();
        info!(memberships, entries = index.len(), "link index rebuilt");
        Ok(memberships)
    }

    /// Compare the live index with the one the store implies.
    pub fn verify_index(&self) -> RecordResult<IndexDiff> {
        let index = self.index.read()?;
        let diff = index.diff(&self.expected_index()?);
        if !diff.is_clean() {
            warn!(
                drift = diff.total_entries(),
                missing = diff.missing.len(),
                stale = diff.stale.len(),
                "link index drifted from store"
            );
        }
        Ok(diff)
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn view(&self, stored: &StoredRevision) -> Record {
        Record::from_revision(&self.schema, stored)
    }

    /// Newly added link targets must be live records of the declared type.
    fn check_targets(&self, entity: &EntityType, old: Option<&Fields>, new: &Fields) -> RecordResult<()> {
        if !self.require_live_targets {
            return Ok(());
        }
        let schema = self.schema.entity(entity)?;

        for (name, def) in &schema.fields {
            let Some(expected) = def.target() else {
                continue;
            };
            let before = old
                .and_then(|fields| fields.get(name))
                .map(|value| value.link_targets())
                .unwrap_or_default();
            let after = new
                .get(name)
                .map(|value| value.link_targets())
                .unwrap_or_default();

            for target in after.difference(&before) {
                let live = match self.store.get_head(target) {
                    Ok(head) => head.revision.entity == *expected,
                    Err(StoreError::NotFound(_)) => false,
                    Err(e) => return Err(e.into()),
                };
                if !live {
                    return Err(ValidationError::DanglingLink {
                        entity: entity.to_string(),
                        field: name.to_string(),
                        target: *target,
                        expected: expected.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn ensure_head(origin: &Address, presented: &Address, head: &StoredRevision) -> RecordResult<()> {
    if head.address != *presented {
        return Err(RecordError::StaleRevision {
            origin: *origin,
            presented: *presented,
            current: head.address,
        });
    }
    Ok(())
}

impl std::fmt::Debug for RecordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordManager")
            .field("entities", &self.schema.entities.keys().collect::<BTreeSet<_>>())
            .field("index", &self.index)
            .field("require_live_targets", &self.require_live_targets)
            .finish()
    }
}
