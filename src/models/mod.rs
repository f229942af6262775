//! Models module
//!
//! Defines the tabular values the merge engine consumes and produces, and the
//! declarative column policy that drives it.

pub mod enums;
pub mod policy;
pub mod table;
pub mod value;

pub use enums::*;
pub use policy::{ColumnPolicy, ColumnRule, NamingStrategy, RuleParams, Versioning};
pub use table::{Row, Table};
pub use value::{DurableKey, Value};
