use linkgraph_types::Address;

use crate::error::{StoreError, StoreResult};
use crate::revision::{AppendRequest, StoredRevision};

/// Append-only revision store with per-origin head pointers.
///
/// All implementations must satisfy these invariants:
/// - Revisions are immutable once written.
/// - `append` of a successor succeeds only when the presented predecessor is
///   the origin's current head, and the head moves in the same step.
/// - Once `tombstone` succeeds, every read of the origin or any of its
///   revisions reports [`StoreError::NotFound`] and appends are refused.
/// - Errors are propagated, never silently ignored.
pub trait RecordStore: Send + Sync {
    /// Read the current head revision of `origin`.
    fn get_head(&self, origin: &Address) -> StoreResult<StoredRevision>;

    /// Read any revision of a live origin by its address.
    fn read_revision(&self, address: &Address) -> StoreResult<StoredRevision>;

    /// Append a revision and advance the head.
    fn append(&self, request: AppendRequest) -> StoreResult<StoredRevision>;

    /// Tombstone `origin`, provided `expected_head` is still its head.
    fn tombstone(&self, origin: &Address, expected_head: &Address) -> StoreResult<()>;

    /// Every live head, sorted by origin.
    fn live_heads(&self) -> StoreResult<Vec<StoredRevision>>;

    /// The revision chain of `origin`, newest first.
    ///
    /// Default implementation walks `predecessor` links from the head.
    fn history(&self, origin: &Address) -> StoreResult<Vec<StoredRevision>> {
        let mut chain = vec![self.get_head(origin)?];
        while let Some(prev) = chain.last().and_then(|r| r.revision.predecessor) {
            let revision = self.read_revision(&prev)?;
            if revision.origin() != *origin {
                return Err(StoreError::CorruptRevision {
                    address: prev,
                    reason: format!("predecessor belongs to origin {}", revision.origin()),
                });
            }
            chain.push(revision);
        }
        Ok(chain)
    }
}
