//! Entity type and field name validation.
//!
//! Valid names:
//! - Must be non-empty and at most [`MAX_NAME_LEN`] bytes
//! - Must start with an ASCII letter
//! - May contain only ASCII letters, digits, and `_`
//!
//! Both camelCase (`inputOf`) and snake_case (`input_of`) are accepted; names
//! are compared exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest accepted entity or field name.
pub const MAX_NAME_LEN: usize = 64;

/// Validate an entity or field name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use linkgraph_types::names::validate_name;
///
/// assert!(validate_name("inputOf").is_ok());
/// assert!(validate_name("economic_event").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name("9lives").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(&format!("longer than {MAX_NAME_LEN} bytes")));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with an ASCII letter"));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $ty(String);

        impl $ty {
            /// Validate and wrap a name.
            pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
                let name = name.into();
                validate_name(&name)?;
                Ok(Self(name))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = TypeError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_name!(
    /// Name of a record type declared in the schema (e.g. `economic_event`).
    EntityType
);

validated_name!(
    /// Name of a field within an entity (e.g. `inputOf`).
    FieldName
);
