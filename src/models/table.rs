//! Tabular model for source batches and dimension snapshots

use super::value::{DurableKey, Value};
use crate::pipeline::{PipelineResult, TablePipeline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

/// One record of a source batch or dimension snapshot.
///
/// Cells are keyed by column name; a missing cell reads as [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell, treating a missing column as null
    pub fn get(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style [`Row::set`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Copy every cell of `other` into this row, overwriting existing cells
    pub fn extend_from(&mut self, other: &Row) {
        for (column, value) in &other.0 {
            self.0.insert(column.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Extract the durable key for the given key columns
    pub fn durable_key(&self, key_columns: &[String]) -> DurableKey {
        DurableKey(key_columns.iter().map(|c| self.get(c).clone()).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An in-memory table: an ordered column list plus its rows.
///
/// Both the incoming source batch and the existing dimension snapshot use
/// this shape. How a table is read or persisted is up to the caller.
///
/// # Example
///
/// ```rust
/// use scd_merge::models::{Row, Table};
///
/// let table = Table::new(vec!["customer".to_string(), "credit_score".to_string()])
///     .with_row(Row::new().with("customer", "C1").with("credit_score", 730));
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Column names in presentation order
    pub columns: Vec<String>,
    /// Table rows
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table from column names given as string slices
    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| (*c).to_string()).collect())
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.push(row);
        self
    }

    /// Append a row, registering any columns the table has not seen yet
    pub fn push(&mut self, row: Row) {
        for (column, _) in row.iter() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a table from a JSON array of objects.
    ///
    /// Column order follows first appearance across the records.
    pub fn from_json_records(json: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<Row> = serde_json::from_str(json)?;
        let mut table = Table::default();
        for row in rows {
            table.push(row);
        }
        Ok(table)
    }

    /// Serialize the rows as a JSON array of objects
    pub fn to_json_records(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.rows)
    }

    /// Run a pipeline over this table
    pub fn pipe(self, pipeline: &TablePipeline) -> PipelineResult<Table> {
        pipeline.run(self)
    }

    /// Rows whose durable key equals `key`
    pub fn rows_for_key<'a>(
        &'a self,
        key_columns: &'a [String],
        key: &'a DurableKey,
    ) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows
            .iter()
            .filter(move |row| &row.durable_key(key_columns) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_read_as_null() {
        let row = Row::new().with("a", 1);
        assert!(row.get("b").is_null());
        assert!(!row.contains("b"));
    }

    #[test]
    fn push_registers_new_columns_in_order() {
        let mut table = Table::with_columns(&["customer"]);
        table.push(Row::new().with("customer", "C1").with("score", 1));
        assert_eq!(table.columns, vec!["customer", "score"]);
    }

    #[test]
    fn json_records_round_trip_keeps_first_seen_column_order() {
        let json = r#"[
            {"customer": "C1", "credit_score": 730},
            {"customer": "C2", "credit_score": null, "segment": "retail"}
        ]"#;
        let table = Table::from_json_records(json).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("segment"));
        assert!(table.rows[1].get("credit_score").is_null());

        let back = Table::from_json_records(&table.to_json_records().unwrap()).unwrap();
        assert_eq!(back.rows, table.rows);
    }
}
