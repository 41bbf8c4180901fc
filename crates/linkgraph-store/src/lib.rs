//! Append-only record revision storage for linkgraph.
//!
//! Every write produces an immutable [`Revision`] addressed by the BLAKE3
//! hash of its canonical encoding. Revisions of one logical record share an
//! origin (the address of the first revision) and link back to their
//! predecessor. A per-origin head pointer is the only mutable state, plus a
//! tombstone set for deleted origins.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Revisions are immutable once written (content addressing guarantees this).
//! 2. Head pointers only move forward, and only from the head the writer
//!    presents (compare-and-swap); a mismatch is [`StoreError::HeadMismatch`].
//! 3. Tombstoned origins are unreadable and accept no further revisions.
//! 4. The store never interprets field values -- link semantics live above it.

pub mod error;
pub mod memory;
pub mod revision;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use revision::{AppendRequest, Revision, StoredRevision};
pub use traits::RecordStore;
