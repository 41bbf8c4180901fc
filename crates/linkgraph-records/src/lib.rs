//! Record lifecycle and reverse link queries for linkgraph.
//!
//! [`RecordManager`] is the only writer: it validates against the
//! [`Schema`], appends revisions to a [`RecordStore`], and applies the
//! matching [`LinkIndex`] delta while holding the index write guard, so no
//! reader on this agent sees a revision without its index entries or the
//! other way round. [`ReverseQueryService`] answers "which records of type T
//! reference A through F" from the index, dereferencing candidates through
//! the store and skipping any that have gone away.
//!
//! [`RecordGraph`] bundles both behind one [`GraphConfig`].
//!
//! [`RecordStore`]: linkgraph_store::RecordStore
//! [`LinkIndex`]: linkgraph_index::LinkIndex

pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod schema;
pub mod shared;

#[cfg(test)]
mod testing;

pub use config::{GraphConfig, PagingConfig};
pub use error::{RecordError, RecordResult, ValidationError};
pub use graph::RecordGraph;
pub use lifecycle::RecordManager;
pub use query::{Cursor, Page, PageParams, ReverseQueryService};
pub use record::Record;
pub use schema::{EntitySchema, FieldDef, Schema};
pub use shared::SharedIndex;
