//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `SessionId` where an
//! `AccountId` is expected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Macro to generate typed integer ID wrappers.
macro_rules! typed_id {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Returns the inner integer.
            #[must_use]
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(AccountId, u32, "Identifier of a subscriber account.");
typed_id!(SessionId, i64, "Key of a billing session record.");

/// Errors produced when parsing or validating identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The value is not an integer.
    #[error("invalid identifier: {0}")]
    Malformed(String),

    /// The value falls outside the range of real account ids.
    #[error("account id {0} out of range [{min}, {max}]", min = AccountId::MIN, max = AccountId::MAX)]
    OutOfRange(u64),
}

impl AccountId {
    /// Lowest real account id. Lower values belong to personas imported from a
    /// legacy service and have no account details.
    pub const MIN: u32 = 100_000;

    /// Highest real account id. Bounded by the signed column type.
    #[allow(clippy::cast_sign_loss)]
    pub const MAX: u32 = i32::MAX as u32;

    /// Creates an account id, rejecting the reserved low band.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::OutOfRange`] if `value` is not a real account id.
    pub fn new(value: u32) -> Result<Self, IdError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(IdError::OutOfRange(u64::from(value)));
        }
        Ok(Self(value))
    }

    /// Returns the id as the signed integer stored in the database.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i64> for AccountId {
    type Error = IdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value = u32::try_from(value).map_err(|_| IdError::Malformed(value.to_string()))?;
        Self::new(value)
    }
}

impl std::str::FromStr for AccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| IdError::Malformed(s.to_string()))?;
        Self::new(value)
    }
}

impl SessionId {
    /// Wraps a row id assigned by the database.
    #[must_use]
    pub const fn from_row_id(row_id: i64) -> Self {
        Self(row_id)
    }
}

impl std::str::FromStr for SessionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| IdError::Malformed(s.to_string()))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
