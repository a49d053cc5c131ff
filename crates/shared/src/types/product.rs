//! Billing products.
//!
//! A product is a label written into every session record so usage can be
//! attributed to the service the subscriber connected to. It never changes how
//! a session is charged.

use serde::{Deserialize, Serialize};

use super::id::IdError;

/// Service a billing session is attributed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// No product recorded.
    #[default]
    Unspecified,
    /// The space trading game.
    Federation,
    /// The fantasy adventure game.
    AgeOfAdventure,
}

impl Product {
    /// Returns the numeric code stored in session records.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Federation => 1,
            Self::AgeOfAdventure => 2,
        }
    }

    /// Maps a stored code back to a product.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Federation),
            2 => Some(Self::AgeOfAdventure),
            _ => None,
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "unspecified",
            Self::Federation => "federation",
            Self::AgeOfAdventure => "age_of_adventure",
        })
    }
}

impl std::str::FromStr for Product {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "unspecified" => Ok(Self::Unspecified),
            "federation" => Ok(Self::Federation),
            "age_of_adventure" | "aoa" => Ok(Self::AgeOfAdventure),
            _ => Err(IdError::Malformed(s.to_string())),
        }
    }
}
