use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypeError;

/// Identifier handed out at the boundary for a logical record.
///
/// The canonical form is `"<prefix>:<origin hex>"`, where the prefix is a
/// human-meaningful attribute of the record (a unit's symbol, say). Records
/// without a prefix attribute use the bare origin hex. Only the origin
/// identifies the record: the prefix is informational and follows the
/// record's current field values, so the string form can change across
/// updates while the origin stays fixed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    prefix: Option<String>,
    origin: Address,
}

impl RecordId {
    /// An identifier with no prefix.
    pub fn bare(origin: Address) -> Self {
        Self {
            prefix: None,
            origin,
        }
    }

    /// An identifier with a semantic prefix. Empty prefixes are dropped.
    pub fn with_prefix(prefix: impl Into<String>, origin: Address) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
            origin,
        }
    }

    /// The origin address this identifier names.
    pub fn origin(&self) -> Address {
        self.origin
    }

    /// The semantic prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Parse from either `"<prefix>:<hex>"` or a bare 64-char hex string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: String| TypeError::InvalidRecordId {
            id: s.to_string(),
            reason,
        };

        match s.rsplit_once(':') {
            Some((prefix, hex)) => {
                if prefix.is_empty() {
                    return Err(invalid("empty prefix before ':'".into()));
                }
                let origin = Address::from_hex(hex).map_err(|e| invalid(e.to_string()))?;
                Ok(Self::with_prefix(prefix, origin))
            }
            None => {
                let origin = Address::from_hex(s).map_err(|e| invalid(e.to_string()))?;
                Ok(Self::bare(origin))
            }
        }
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "RecordId({prefix}:{})", self.origin.short_hex()),
            None => write!(f, "RecordId({})", self.origin.short_hex()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.origin),
            None => write!(f, "{}", self.origin),
        }
    }
}

impl FromStr for RecordId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.to_string()
    }
}

impl From<Address> for RecordId {
    fn from(origin: Address) -> Self {
        Self::bare(origin)
    }
}
