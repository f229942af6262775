//! Merge output: the next dimension snapshot plus a summary of what changed

use crate::models::{ChangeKind, DurableKey, KeyStatus, Row, Table, Value, Versioning};
use crate::pipeline::{PipelineResult, TablePipeline};
use crate::validation::ValidatedPolicy;
use serde::{Deserialize, Serialize};

/// Classification of one source key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDecision {
    pub key: DurableKey,
    pub status: KeyStatus,
    /// Strongest change any handler asked for
    pub change: ChangeKind,
}

/// Counts describing one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub new_keys: usize,
    pub changed_keys: usize,
    pub unchanged_keys: usize,
    /// Target keys absent from the source batch
    pub carried_keys: usize,
    pub versions_opened: usize,
    pub versions_closed: usize,
    /// Current versions replaced in place by a same-day change
    pub versions_rewritten: usize,
    pub surrogate_keys_allocated: usize,
    pub rows_out: usize,
    /// One entry per source key, in key order
    pub decisions: Vec<KeyDecision>,
}

impl MergeReport {
    pub(crate) fn record(&mut self, decision: KeyDecision) {
        match decision.status {
            KeyStatus::New => self.new_keys += 1,
            KeyStatus::Changed => self.changed_keys += 1,
            KeyStatus::Unchanged => self.unchanged_keys += 1,
        }
        self.decisions.push(decision);
    }

    /// Status of a source key, if it was part of the batch
    pub fn status_of(&self, key: &DurableKey) -> Option<KeyStatus> {
        self.decisions
            .iter()
            .find(|d| &d.key == key)
            .map(|d| d.status)
    }
}

/// The next version of the dimension table.
///
/// Besides the raw [`Table`], the snapshot knows which columns hold the
/// durable key, surrogate key and current flag, so it can serve the two
/// access paths of a type 7 dimension:
///
/// - [`MergedSnapshot::current_view`]: one row per member, joined by durable key;
/// - [`MergedSnapshot::history_view`]: every version, joined by surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSnapshot {
    pub table: Table,
    pub report: MergeReport,
    durable_key: Vec<String>,
    versioning: Option<Versioning>,
}

impl MergedSnapshot {
    pub(crate) fn new(table: Table, report: MergeReport, policy: &ValidatedPolicy) -> Self {
        Self {
            table,
            report,
            durable_key: policy.durable_key.clone(),
            versioning: policy.versioning.clone(),
        }
    }

    pub fn durable_key_columns(&self) -> &[String] {
        &self.durable_key
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    fn is_current(&self, row: &Row) -> bool {
        match &self.versioning {
            Some(versioning) => row.get(&versioning.current_flag).as_bool() == Some(true),
            None => true,
        }
    }

    /// Current rows only (type 1 perspective)
    pub fn current_view(&self) -> Table {
        Table {
            columns: self.table.columns.clone(),
            rows: self
                .table
                .rows
                .iter()
                .filter(|row| self.is_current(row))
                .cloned()
                .collect(),
        }
    }

    /// Every version (type 2 perspective)
    pub fn history_view(&self) -> Table {
        self.table.clone()
    }

    /// Current row of a member, looked up by durable key
    pub fn current_row(&self, key: &DurableKey) -> Option<&Row> {
        self.table
            .rows
            .iter()
            .find(|row| self.is_current(row) && &row.durable_key(&self.durable_key) == key)
    }

    /// A specific version, looked up by surrogate key
    pub fn version(&self, surrogate_key: &Value) -> Option<&Row> {
        let versioning = self.versioning.as_ref()?;
        self.table
            .rows
            .iter()
            .find(|row| row.get(&versioning.surrogate_key).same_as(surrogate_key))
    }

    /// Run a pipeline over the merged table
    pub fn pipe(self, pipeline: &TablePipeline) -> PipelineResult<Table> {
        pipeline.run(self.table)
    }
}
