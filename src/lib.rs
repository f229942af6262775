//! SCD Merge - slowly changing dimension merge engine
//!
//! Given a batch of source records and the current versioned dimension
//! table, produces the next dimension snapshot while applying a per-column
//! historization policy:
//!
//! - Type 0: retain the original value
//! - Type 1: overwrite in place
//! - Type 2: add a new row per change (surrogate key, effective interval, current flag)
//! - Type 3: keep the prior value in an alternate column
//! - Type 6: type 2 history plus a type 1 shadow column on every version
//! - Type 7: type 2 rows guaranteed to carry both durable and surrogate keys
//!
//! The engine is a pure transform: inputs are never modified, the merge date
//! is always explicit and any failure aborts without a partial result.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use scd_merge::models::{ColumnPolicy, Row, ScdType, Table};
//!
//! let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
//! let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);
//! let source = Table::default()
//!     .with_row(Row::new().with("customer", "C1").with("credit_score", 730));
//! let target = Table::default().with_row(
//!     Row::new()
//!         .with("customer", "C1")
//!         .with("effective_from", d(2022, 1, 1))
//!         .with("effective_to", d(9999, 12, 31))
//!         .with("is_current", true)
//!         .with("credit_score", 630),
//! );
//!
//! let snapshot = scd_merge::merge(&source, &target, &policy, d(2022, 1, 31)).unwrap();
//! assert_eq!(snapshot.table.len(), 2);
//! assert_eq!(snapshot.table.rows[0].get("effective_to").as_date(), Some(d(2022, 1, 30)));
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod snapshot;
pub mod surrogate;
pub mod validation;

pub use config::{ConfigError, ConfigResult, MergeConfig};
pub use error::{MergeError, MergeResult, TableRole};
pub use merge::{MergeOptions, Merger, merge};
pub use pipeline::{PipelineError, PipelineResult, TablePipeline, Transform};
pub use snapshot::{KeyDecision, MergeReport, MergedSnapshot};
pub use surrogate::{DurableKeyUuid, SequenceGenerator, SurrogateKeyGenerator};
pub use validation::{IntervalViolation, IntervalViolationKind, PolicyValidator, check_history};

// Re-export models
pub use models::enums::*;
pub use models::{
    ColumnPolicy, ColumnRule, DurableKey, NamingStrategy, Row, RuleParams, Table, Value,
    Versioning,
};
