//! Merge error taxonomy
//!
//! Every failure is reported before any output row is produced, so a caller
//! either receives a fully consistent snapshot or one of these errors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which merge input a structural error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    Source,
    Target,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRole::Source => write!(f, "source"),
            TableRole::Target => write!(f, "target"),
        }
    }
}

/// Error type for merge operations
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MergeError {
    /// A source column has no declared policy and is not pass-through
    #[error("Column '{column}' has no declared SCD policy and is not marked pass-through")]
    UnknownColumnPolicy { column: String },

    /// A declared rule is missing or misusing type-specific parameters
    #[error("Invalid policy parameters for column '{column}': {reason}")]
    InvalidPolicyParams { column: String, reason: String },

    /// Rules on the same column (or their output names) are incompatible
    #[error("Conflicting policy for column '{column}': {reason}")]
    PolicyConflict { column: String, reason: String },

    /// The source batch holds more than one row for a durable key
    #[error("Source batch contains {count} rows for durable key {key}")]
    DuplicateSourceKey { key: String, count: usize },

    /// The target holds more than one current row for a durable key
    #[error("Target holds {count} current rows for durable key {key}")]
    DuplicateCurrentRow { key: String, count: usize },

    /// A surrogate key was handed out twice or already exists in the target
    #[error("Surrogate key {surrogate_key} is not unique (durable key {key})")]
    SurrogateKeyCollision { key: String, surrogate_key: String },

    /// A required key or versioning column is absent
    #[error("Column '{column}' is missing from the {table} table")]
    MissingColumn { table: TableRole, column: String },

    /// A durable key value is null
    #[error("Row {row} of the {table} table has a null durable key")]
    NullDurableKey { table: TableRole, row: usize },

    /// A target row cannot be interpreted under the versioning columns
    #[error("Malformed target row for durable key {key}: {reason}")]
    MalformedTargetRow { key: String, reason: String },

    /// The merge date precedes the start of the current version
    #[error(
        "Merge timestamp {merge_timestamp} precedes the current version of {key} (effective from {current_from})"
    )]
    MergeTimestampBeforeCurrent {
        key: String,
        current_from: NaiveDate,
        merge_timestamp: NaiveDate,
    },

    /// A member with only closed versions is reopened inside its own history
    #[error(
        "Merge timestamp {merge_timestamp} falls within the closed history of {key} (last version ends {closed_to})"
    )]
    MergeTimestampWithinHistory {
        key: String,
        closed_to: NaiveDate,
        merge_timestamp: NaiveDate,
    },
}

impl MergeError {
    /// Stable short code for logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            MergeError::UnknownColumnPolicy { .. } => "UnknownColumnPolicy",
            MergeError::InvalidPolicyParams { .. } => "InvalidPolicyParams",
            MergeError::PolicyConflict { .. } => "PolicyConflict",
            MergeError::DuplicateSourceKey { .. } => "DuplicateSourceKey",
            MergeError::DuplicateCurrentRow { .. } => "DuplicateCurrentRow",
            MergeError::SurrogateKeyCollision { .. } => "SurrogateKeyCollision",
            MergeError::MissingColumn { .. } => "MissingColumn",
            MergeError::NullDurableKey { .. } => "NullDurableKey",
            MergeError::MalformedTargetRow { .. } => "MalformedTargetRow",
            MergeError::MergeTimestampBeforeCurrent { .. } => "MergeTimestampBeforeCurrent",
            MergeError::MergeTimestampWithinHistory { .. } => "MergeTimestampWithinHistory",
        }
    }

    pub(crate) fn invalid_params(column: &str, reason: impl Into<String>) -> Self {
        MergeError::InvalidPolicyParams {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conflict(column: &str, reason: impl Into<String>) -> Self {
        MergeError::PolicyConflict {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for merge operations
pub type MergeResult<T> = Result<T, MergeError>;
