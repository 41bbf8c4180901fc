//! Foundation types for linkgraph.
//!
//! Every other linkgraph crate depends on `linkgraph-types`.
//!
//! # Key Types
//!
//! - [`Address`]: Content-derived identifier of a revision (BLAKE3 hash).
//!   The address of a record's first revision doubles as its origin.
//! - [`EntityType`] / [`FieldName`]: Validated schema identifiers
//! - [`RecordId`]: Boundary identifier: optional semantic prefix + origin
//! - [`FieldValue`] / [`Fields`]: The body of a revision
//! - [`FieldPatch`] / [`Patch`]: Update payloads that keep "erase" distinct
//!   from "leave untouched"

pub mod address;
pub mod error;
pub mod field;
pub mod names;
pub mod record_id;

pub use address::Address;
pub use error::TypeError;
pub use field::{FieldPatch, FieldValue, Fields, Patch};
pub use names::{EntityType, FieldName};
pub use record_id::RecordId;
