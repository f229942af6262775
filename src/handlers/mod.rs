//! SCD type handlers
//!
//! One strategy per SCD type. A handler looks at the incoming source row and
//! the matched target rows of one durable key and writes its output columns
//! into one of two images:
//!
//! - the **key-level** image holds attributes with one value per durable key
//!   (types 0, 1, 3 and the type 6 shadow), written onto every row of the key;
//! - the **version-level** image holds attributes whose value belongs to one
//!   version (types 2, 7 and the type 6 historical column), written only on
//!   the row that represents that version.

pub mod add_attribute;
pub mod add_row;
pub mod dual;
pub mod hybrid;
pub mod overwrite;
pub mod retain;

use crate::models::{ChangeKind, DurableKey, Row, ScdType, Type3Mode, Value};
use crate::validation::ResolvedRule;
use std::collections::BTreeSet;
use std::fmt;

pub use add_attribute::AddAttribute;
pub use add_row::AddRow;
pub use dual::DualKeys;
pub use hybrid::Hybrid;
pub use overwrite::Overwrite;
pub use retain::RetainOriginal;

static NULL: Value = Value::Null;

/// Everything a handler may read for one durable key
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    pub key: &'a DurableKey,
    /// The key's row in the source batch
    pub source: &'a Row,
    /// Columns present in the source batch
    pub source_columns: &'a BTreeSet<String>,
    /// The key's current target row, if any
    pub current: Option<&'a Row>,
    /// Most recent closed target row, used when no current row exists
    pub latest_closed: Option<&'a Row>,
    /// Merge-level type 3 behaviour
    pub type3_mode: Type3Mode,
}

impl<'a> KeyContext<'a> {
    /// New source value for a column, or `None` when the batch does not carry it
    pub fn incoming(&self, column: &str) -> Option<&'a Value> {
        self.source_columns
            .contains(column)
            .then(|| self.source.get(column))
    }

    /// Value of an output column on the current target row, or on the latest
    /// closed version when the member has no current row
    pub fn existing(&self, column: &str) -> &'a Value {
        self.reference().map_or(&NULL, |row| row.get(column))
    }

    /// Current row, falling back to the latest closed version
    pub fn reference(&self) -> Option<&'a Row> {
        self.current.or(self.latest_closed)
    }

    /// Whether the incoming value differs from `existing` (null-aware)
    pub fn differs(&self, source_column: &str, output_column: &str) -> bool {
        match (self.current, self.incoming(source_column)) {
            (Some(row), Some(value)) => !value.same_as(row.get(output_column)),
            _ => false,
        }
    }

    /// Incoming value, falling back to the existing output value
    pub fn incoming_or_existing(&self, source_column: &str, output_column: &str) -> Value {
        self.incoming(source_column)
            .unwrap_or_else(|| self.existing(output_column))
            .clone()
    }
}

/// Output images a handler writes into
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Images {
    /// Written onto every row of the durable key
    pub key_level: Row,
    /// Written onto the row of a new version only
    pub version_level: Row,
}

/// Strategy for one SCD type applied to one attribute
pub trait ScdHandler: Send + Sync + fmt::Debug {
    fn scd_type(&self) -> ScdType;

    /// What the incoming row requires for this attribute
    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind;

    /// Write this attribute's output values for the key
    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images);
}

/// Build the handler for a resolved rule
pub fn handler_for(rule: &ResolvedRule) -> Box<dyn ScdHandler> {
    let source = rule.source.clone();
    let output = rule.output.clone();
    let secondary = rule.secondary.clone().unwrap_or_default();
    match rule.scd_type {
        ScdType::Type0 => Box::new(RetainOriginal::new(source, output)),
        ScdType::Type1 => Box::new(Overwrite::new(source, output)),
        ScdType::Type2 => Box::new(AddRow::new(source, output)),
        ScdType::Type3 => Box::new(AddAttribute::new(source, output, secondary, rule.type3_mode)),
        ScdType::Type6 => Box::new(Hybrid::new(source, output, secondary)),
        ScdType::Type7 => Box::new(DualKeys::new(source, output)),
    }
}

/// Collect the handlers for every rule of a validated policy
pub fn handlers_for(rules: &[ResolvedRule]) -> Vec<Box<dyn ScdHandler>> {
    rules.iter().map(handler_for).collect()
}
