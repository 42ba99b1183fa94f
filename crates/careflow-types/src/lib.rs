//! Shared types and errors for the Careflow workflow engine.
//!
//! This crate provides the foundational types used across the other Careflow crates:
//! - `CareflowError`: unified error taxonomy
//! - `Ternary`: three-valued decision outcome
//! - `Outcome`: the value a caller supplies when completing a step

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unified error type for all Careflow subsystems.
#[derive(Debug, thiserror::Error)]
pub enum CareflowError {
    #[error("Workflow validation failed: {0}")]
    Validation(String),

    #[error("Node '{node}' not found in workflow")]
    NodeNotFound { node: String },

    #[error("Invalid outcome '{0}': expected true, false, or unknown")]
    InvalidOutcome(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias for `Result<T, CareflowError>`.
pub type Result<T> = std::result::Result<T, CareflowError>;

// ---------------------------------------------------------------------------
// Ternary: three-valued decision outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ternary {
    True,
    False,
    Unknown,
}

impl Ternary {
    pub fn as_str(self) -> &'static str {
        match self {
            Ternary::True => "true",
            Ternary::False => "false",
            Ternary::Unknown => "unknown",
        }
    }

    /// The boolean value, or `None` for `Unknown`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Ternary::True => Some(true),
            Ternary::False => Some(false),
            Ternary::Unknown => None,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }
}

impl FromStr for Ternary {
    type Err = CareflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Ternary::True),
            "false" => Ok(Ternary::False),
            "unknown" => Ok(Ternary::Unknown),
            _ => Err(CareflowError::InvalidOutcome(s.to_string())),
        }
    }
}

impl fmt::Display for Ternary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome: value supplied when completing a step
// ---------------------------------------------------------------------------

/// The result a caller reports for the active step.
///
/// Decision and logic-tree nodes take a [`Ternary`]; branch nodes take the
/// name of one of their declared branches. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Ternary(Ternary),
    Branch(String),
}

impl Outcome {
    /// Parse free text: `true`/`false`/`unknown` (any case) become ternary
    /// values, anything else is taken as a branch name.
    pub fn parse(s: &str) -> Self {
        match s.parse::<Ternary>() {
            Ok(t) => Outcome::Ternary(t),
            Err(_) => Outcome::Branch(s.trim().to_string()),
        }
    }

    pub fn as_ternary(&self) -> Option<Ternary> {
        match self {
            Outcome::Ternary(t) => Some(*t),
            Outcome::Branch(_) => None,
        }
    }

    /// The outcome as it would appear on an edge's `outcome` field.
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Ternary(t) => t.as_str(),
            Outcome::Branch(name) => name,
        }
    }
}

impl From<Ternary> for Outcome {
    fn from(value: Ternary) -> Self {
        Outcome::Ternary(value)
    }
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        Outcome::Ternary(value.into())
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        Outcome::parse(&value)
    }
}

impl From<&str> for Outcome {
    fn from(value: &str) -> Self {
        Outcome::parse(value)
    }
}

impl From<Outcome> for String {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Ternary(t) => t.as_str().to_string(),
            Outcome::Branch(name) => name,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
