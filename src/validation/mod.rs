//! Validation functionality
//!
//! Provides validation logic for:
//! - Column policies (declared types, parameters, conflicts, output names)
//! - Merge inputs against a validated policy
//! - Effective interval histories of versioned dimensions

pub mod intervals;
pub mod policy;

pub use intervals::{IntervalViolation, IntervalViolationKind, check_history};
pub use policy::{PolicyValidator, ResolvedRule, ValidatedPolicy};
