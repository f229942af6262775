//! Enums for dimension merging
//!
//! # Serde Conventions
//!
//! - `ScdType` is written as its Kimball type number (`2`) and also accepts the
//!   `SCREAMING_SNAKE_CASE` form (`"TYPE2"`) on input.
//! - Behavioural switches (`Type3Mode`, `IntervalEnd`, `SurrogateKeyStrategy`)
//!   use `lowercase` keywords so they read naturally in TOML.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slowly changing dimension technique applied to one attribute.
///
/// Types 4 and 5 need a separate mini-dimension table and are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScdTypeRepr", into = "u8")]
pub enum ScdType {
    /// Retain original
    Type0,
    /// Overwrite
    Type1,
    /// Add new row
    Type2,
    /// Add new attribute
    Type3,
    /// Type 1 attributes embedded in a type 2 dimension
    Type6,
    /// Dual type 1 and type 2 access through durable and surrogate keys
    Type7,
}

impl ScdType {
    pub const ALL: [ScdType; 6] = [
        ScdType::Type0,
        ScdType::Type1,
        ScdType::Type2,
        ScdType::Type3,
        ScdType::Type6,
        ScdType::Type7,
    ];

    /// Whether a change in this attribute produces a new dimension row
    pub fn is_row_versioning(self) -> bool {
        matches!(self, ScdType::Type2 | ScdType::Type6 | ScdType::Type7)
    }

    pub fn number(self) -> u8 {
        match self {
            ScdType::Type0 => 0,
            ScdType::Type1 => 1,
            ScdType::Type2 => 2,
            ScdType::Type3 => 3,
            ScdType::Type6 => 6,
            ScdType::Type7 => 7,
        }
    }
}

impl TryFrom<u8> for ScdType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ScdType::Type0),
            1 => Ok(ScdType::Type1),
            2 => Ok(ScdType::Type2),
            3 => Ok(ScdType::Type3),
            6 => Ok(ScdType::Type6),
            7 => Ok(ScdType::Type7),
            4 | 5 => Err(format!(
                "SCD type {} requires a mini-dimension table and is not supported",
                value
            )),
            other => Err(format!("Unknown SCD type: {}", other)),
        }
    }
}

impl From<ScdType> for u8 {
    fn from(value: ScdType) -> Self {
        value.number()
    }
}

impl FromStr for ScdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let digits = upper
            .strip_prefix("TYPE")
            .map(|rest| rest.trim_start_matches(['_', ' ']))
            .unwrap_or(upper.as_str());
        digits
            .parse::<u8>()
            .map_err(|_| format!("Unknown SCD type: {}", s))
            .and_then(ScdType::try_from)
    }
}

impl fmt::Display for ScdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TYPE{}", self.number())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScdTypeRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<ScdTypeRepr> for ScdType {
    type Error = String;

    fn try_from(value: ScdTypeRepr) -> Result<Self, Self::Error> {
        match value {
            ScdTypeRepr::Number(n) => ScdType::try_from(n),
            ScdTypeRepr::Name(s) => s.parse(),
        }
    }
}

/// How the type 3 alternate column behaves on repeated changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type3Mode {
    /// Alternate captures the value in place before the first change and then stays put
    #[default]
    Freeze,
    /// Alternate always holds the value in place before the most recent change
    Cascade,
}

impl FromStr for Type3Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "freeze" => Ok(Type3Mode::Freeze),
            "cascade" => Ok(Type3Mode::Cascade),
            _ => Err(format!(
                "Unknown type 3 mode: {}. Use 'freeze' or 'cascade'.",
                s
            )),
        }
    }
}

/// Convention for the `effective_to` date of a closed version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalEnd {
    /// `effective_to` is the last day the version was valid (merge date minus one day)
    #[default]
    Inclusive,
    /// Half-open `[from, to)`: `effective_to` equals the next version's `effective_from`
    Exclusive,
}

impl FromStr for IntervalEnd {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inclusive" => Ok(IntervalEnd::Inclusive),
            "exclusive" | "half-open" => Ok(IntervalEnd::Exclusive),
            _ => Err(format!(
                "Unknown interval convention: {}. Use 'inclusive' or 'exclusive'.",
                s
            )),
        }
    }
}

/// Which surrogate key generator a merge uses when none is supplied explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurrogateKeyStrategy {
    /// UUID v5 derived from the durable key and effective date
    #[default]
    Uuid,
    /// Integers counting up from the largest key already in the target
    Sequence,
}

impl FromStr for SurrogateKeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uuid" => Ok(SurrogateKeyStrategy::Uuid),
            "sequence" => Ok(SurrogateKeyStrategy::Sequence),
            _ => Err(format!(
                "Unknown surrogate key strategy: {}. Use 'uuid' or 'sequence'.",
                s
            )),
        }
    }
}

/// Classification of a durable key in the source batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    /// No current target row
    New,
    /// At least one tracked attribute differs from the current row
    Changed,
    /// Every tracked attribute equals the current row
    Unchanged,
}

/// What a single attribute change requires from the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    None,
    /// Rewrite existing rows of the key
    InPlace,
    /// Close the current row and open a new version
    NewVersion,
}
