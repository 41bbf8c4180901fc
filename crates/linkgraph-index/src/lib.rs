//! Reverse link index for linkgraph.
//!
//! For every indexed link field the index maps a target address to the set
//! of source origins whose current revision references it. The index is a
//! derived structure: it holds nothing the record store cannot reproduce,
//! and all of its operations are total.
//!
//! # Key Types
//!
//! - [`LinkIndex`] -- The in-memory reverse map (BTreeMap-backed)
//! - [`IndexKey`] -- Field identifier: (entity type, field name)
//! - [`IndexedField`] -- A link field to maintain, with optional reciprocal
//! - [`LinkOp`] -- One insert/remove mutation
//! - [`plan_link_ops`] -- Minimal op list for one record transition
//! - [`IndexDiff`] -- Result of comparing two indexes

pub mod delta;
pub mod diff;
pub mod entry;
pub mod index;

pub use delta::plan_link_ops;
pub use diff::{IndexDiff, Membership};
pub use entry::{IndexKey, IndexedField, LinkOp};
pub use index::LinkIndex;
