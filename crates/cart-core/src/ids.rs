//! Newtype IDs for type-safe identifiers.
//!
//! A line item key and a variant id both identify "a thing in the cart", and
//! `/cart/change.js` and `/cart/add.js` both take a field called `id`. The
//! newtypes keep the two from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate string-backed ID structs.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Server-assigned line item key, stable across quantity changes.
    LineItemKey
);
define_id!(
    /// Opaque cart token from `/cart.js`.
    CartToken
);

/// Numeric product variant id as used by `/cart/add.js`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(u64);

impl VariantId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VariantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for VariantId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_creation() {
        let key = LineItemKey::new("39897499729985:f5d1b2");
        assert_eq!(key.as_str(), "39897499729985:f5d1b2");
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = LineItemKey::from("abc:123");
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""abc:123""#);
    }

    #[test]
    fn test_variant_id_parse_and_json() {
        let id: VariantId = " 39897499729985 ".parse().unwrap();
        assert_eq!(id.get(), 39897499729985);
        assert_eq!(serde_json::to_string(&id).unwrap(), "39897499729985");
        assert!("abc".parse::<VariantId>().is_err());
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(LineItemKey::new("same"), LineItemKey::from("same"));
        assert_ne!(LineItemKey::new("same"), LineItemKey::new("different"));
    }
}
