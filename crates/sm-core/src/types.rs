//! Category and verdict enums as the single source of truth for their
//! string representations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Unknown category string.
    #[error("invalid category: {value}")]
    InvalidCategory { value: String },

    /// Unknown verdict string.
    #[error("invalid verdict: {value}")]
    InvalidVerdict { value: String },

    /// A threshold was negative.
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    /// The red distraction limit was below the green limit.
    #[error("distraction red limit ({red}s) must be at least the green limit ({green}s)")]
    LimitOrder { green: i64, red: i64 },
}

/// Behavioral category of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Work,
    Distraction,
    #[default]
    Neutral,
}

impl Category {
    /// String representation for SQL storage and the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Distraction => "distraction",
            Self::Neutral => "neutral",
        }
    }

    /// Parses a stored category, mapping unknown values to [`Category::Neutral`].
    ///
    /// A corrupted rule row must never block an app, so classification fails
    /// open to neutral instead of erroring.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            tracing::warn!(value = s, "unknown category, defaulting to neutral");
            Self::Neutral
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Self::Work),
            "distraction" => Ok(Self::Distraction),
            "neutral" => Ok(Self::Neutral),
            _ => Err(ValidationError::InvalidCategory {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The daily outcome.
///
/// Variants are declared worst to best so the derived ordering matches the
/// reporting order (`Red < Yellow < Green`). Evaluation logic never compares
/// verdicts; each is produced by an explicit rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    Red,
    Yellow,
    Green,
}

impl Verdict {
    /// String representation for SQL storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            _ => Err(ValidationError::InvalidVerdict {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
