//! Field values, field maps, and update patches.
//!
//! A null field is represented by absence from [`Fields`]. Patches keep three
//! wire states apart: a key missing from the [`Patch`] leaves the field
//! untouched, [`FieldPatch::Clear`] erases it, and [`FieldPatch::Set`]
//! replaces it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::names::FieldName;

/// The value of one populated field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Single-valued link to another record's origin.
    Link(Address),
    /// Set-valued link. Never empty once normalised.
    LinkSet(BTreeSet<Address>),
    /// Plain data, opaque to the link machinery.
    Data(serde_json::Value),
}

impl FieldValue {
    /// Link targets carried by this value (empty for data fields).
    pub fn link_targets(&self) -> BTreeSet<Address> {
        match self {
            Self::Link(target) => BTreeSet::from([*target]),
            Self::LinkSet(targets) => targets.clone(),
            Self::Data(_) => BTreeSet::new(),
        }
    }

    /// Returns `true` for link and link-set values.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link(_) | Self::LinkSet(_))
    }

    /// Returns `true` if storing this value is equivalent to storing nothing.
    pub fn is_vacant(&self) -> bool {
        match self {
            Self::LinkSet(targets) => targets.is_empty(),
            Self::Data(value) => value.is_null(),
            Self::Link(_) => false,
        }
    }

    /// The data payload as a string, if this is string data.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Data(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// The populated fields of one revision, ordered by name for deterministic
/// encoding.
pub type Fields = BTreeMap<FieldName, FieldValue>;

/// A change to one field within an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldPatch {
    /// Replace the field with a new value.
    Set(FieldValue),
    /// Erase the field (explicit null).
    Clear,
}

/// Field-level changes for an update. Fields not named here are carried over.
pub type Patch = BTreeMap<FieldName, FieldPatch>;

/// Drop vacant values so that "empty" and "absent" compare equal.
pub fn normalize(mut fields: Fields) -> Fields {
    fields.retain(|_, value| !value.is_vacant());
    fields
}

/// Merge a patch over existing fields, producing the next revision's body.
pub fn apply_patch(current: &Fields, patch: &Patch) -> Fields {
    let mut next = current.clone();
    for (name, change) in patch {
        match change {
            FieldPatch::Set(value) => {
                next.insert(name.clone(), value.clone());
            }
            FieldPatch::Clear => {
                next.remove(name);
            }
        }
    }
    normalize(next)
}
