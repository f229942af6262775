//! Composable table transforms
//!
//! A [`TablePipeline`] is an ordered list of named [`Transform`] steps that
//! run over a [`Table`] value. It is how callers attach their own
//! post-processing to a merge result:
//!
//! ```rust
//! use scd_merge::models::{Row, Table, Value};
//! use scd_merge::pipeline::{CurrentRows, TablePipeline, WithColumn};
//!
//! let pipeline = TablePipeline::new()
//!     .then(CurrentRows::default())
//!     .then(WithColumn::new("load_id", 42));
//!
//! let table = Table::default()
//!     .with_row(Row::new().with("customer", "C1").with("is_current", true))
//!     .with_row(Row::new().with("customer", "C1").with("is_current", false));
//!
//! let out = table.pipe(&pipeline).unwrap();
//! assert_eq!(out.len(), 1);
//! assert_eq!(out.rows[0].get("load_id"), &Value::Int(42));
//! ```

use crate::models::{Row, Table, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Error type for pipeline steps
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PipelineError {
    #[error("Pipeline step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Pipeline step '{step}' references unknown column '{column}'")]
    UnknownColumn { step: String, column: String },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One named table-to-table step
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, table: Table) -> PipelineResult<Table>;
}

/// Adapter turning a closure into a [`Transform`]
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Table) -> Result<Table, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(Table) -> Result<Table, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, table: Table) -> PipelineResult<Table> {
        (self.f)(table).map_err(|reason| PipelineError::StepFailed {
            step: self.name.clone(),
            reason,
        })
    }
}

/// Ordered list of transforms
#[derive(Default)]
pub struct TablePipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl fmt::Debug for TablePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TablePipeline")
            .field("steps", &self.names())
            .finish()
    }
}

impl TablePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named closure step
    pub fn step<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Table) -> Result<Table, String> + Send + Sync + 'static,
    {
        self.then(FnTransform::new(name, f))
    }

    /// Append a transform
    pub fn then(mut self, transform: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(transform));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order; the first failure aborts the run
    pub fn run(&self, mut table: Table) -> PipelineResult<Table> {
        for step in &self.steps {
            let before = table.len();
            table = step.apply(table)?;
            debug!(
                "Pipeline step '{}' turned {} rows into {}",
                step.name(),
                before,
                table.len()
            );
        }
        Ok(table)
    }
}

fn require_column(step: &str, table: &Table, column: &str) -> PipelineResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(PipelineError::UnknownColumn {
            step: step.to_string(),
            column: column.to_string(),
        })
    }
}

/// Set a column to a constant on every row
#[derive(Debug, Clone)]
pub struct WithColumn {
    column: String,
    value: Value,
}

impl WithColumn {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl Transform for WithColumn {
    fn name(&self) -> &str {
        "with_column"
    }

    fn apply(&self, mut table: Table) -> PipelineResult<Table> {
        if !table.has_column(&self.column) {
            table.columns.push(self.column.clone());
        }
        for row in &mut table.rows {
            row.set(self.column.clone(), self.value.clone());
        }
        Ok(table)
    }
}

#[derive(Debug, Clone)]
enum Exclusion {
    /// Column value is one of the listed values
    AnyOf { column: String, values: Vec<Value> },
    /// Every column equals its paired value
    AllOf(Vec<(String, Value)>),
}

/// Drop rows matching a filter
#[derive(Debug, Clone)]
pub struct ExcludeRows {
    exclusion: Exclusion,
}

impl ExcludeRows {
    /// Drop rows whose `column` holds one of `values`
    pub fn any_of<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            exclusion: Exclusion::AnyOf {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Drop rows where every listed column equals its value
    pub fn matching<C: Into<String>, V: Into<Value>>(
        conditions: impl IntoIterator<Item = (C, V)>,
    ) -> Self {
        Self {
            exclusion: Exclusion::AllOf(
                conditions
                    .into_iter()
                    .map(|(c, v)| (c.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn excludes(&self, row: &Row) -> bool {
        match &self.exclusion {
            Exclusion::AnyOf { column, values } => {
                let value = row.get(column);
                values.iter().any(|v| v.same_as(value))
            }
            Exclusion::AllOf(conditions) => conditions
                .iter()
                .all(|(column, value)| row.get(column).same_as(value)),
        }
    }
}

impl Transform for ExcludeRows {
    fn name(&self) -> &str {
        "exclude_rows"
    }

    fn apply(&self, mut table: Table) -> PipelineResult<Table> {
        match &self.exclusion {
            Exclusion::AnyOf { column, .. } => require_column(self.name(), &table, column)?,
            Exclusion::AllOf(conditions) => {
                for (column, _) in conditions {
                    require_column(self.name(), &table, column)?;
                }
            }
        }
        table.rows.retain(|row| !self.excludes(row));
        Ok(table)
    }
}

/// Keep only the listed columns, in the listed order
#[derive(Debug, Clone)]
pub struct SelectColumns {
    columns: Vec<String>,
}

impl SelectColumns {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for SelectColumns {
    fn name(&self) -> &str {
        "select_columns"
    }

    fn apply(&self, table: Table) -> PipelineResult<Table> {
        for column in &self.columns {
            require_column(self.name(), &table, column)?;
        }
        let rows = table
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).clone()))
                    .collect()
            })
            .collect();
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }
}

/// Keep rows whose current flag is true
#[derive(Debug, Clone)]
pub struct CurrentRows {
    flag_column: String,
}

impl CurrentRows {
    pub fn new(flag_column: impl Into<String>) -> Self {
        Self {
            flag_column: flag_column.into(),
        }
    }
}

impl Default for CurrentRows {
    fn default() -> Self {
        Self::new("is_current")
    }
}

impl Transform for CurrentRows {
    fn name(&self) -> &str {
        "current_rows"
    }

    fn apply(&self, mut table: Table) -> PipelineResult<Table> {
        require_column(self.name(), &table, &self.flag_column)?;
        table
            .rows
            .retain(|row| row.get(&self.flag_column).as_bool() == Some(true));
        Ok(table)
    }
}
