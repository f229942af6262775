//! Merge orchestrator
//!
//! Joins a source batch to the existing dimension by durable key, runs every
//! declared handler for each key and assembles the next snapshot.
//!
//! Processing happens in three phases:
//!
//! - **validation**: policy, input columns, key cardinality, current flags and
//!   surrogate key uniqueness of the target;
//! - **per-key merge**: handlers classify and rewrite each key independently
//!   (optionally across threads with the `parallel` feature);
//! - **assembly**: surrogate keys are allocated in key order and the rows are
//!   collected into the output table.
//!
//! An error in any phase aborts the merge; no partial snapshot is returned.

pub mod keys;

pub use keys::{KeyGroup, resolve_keys};

use crate::error::{MergeError, MergeResult};
use crate::handlers::{Images, KeyContext, ScdHandler, handlers_for};
use crate::models::{
    ChangeKind, ColumnPolicy, DurableKey, IntervalEnd, KeyStatus, Row, SurrogateKeyStrategy,
    Table, Type3Mode, Value, Versioning,
};
use crate::snapshot::{KeyDecision, MergeReport, MergedSnapshot};
use crate::surrogate::{DurableKeyUuid, KeyRegistry, SequenceGenerator, SurrogateKeyGenerator};
use crate::validation::{PolicyValidator, ValidatedPolicy};
use chrono::NaiveDate;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Merge-wide behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Type 3 alternate behaviour for rules without their own override
    pub type3_mode: Type3Mode,
    /// Generator used when none is supplied through [`Merger::with_key_generator`]
    pub surrogate_keys: SurrogateKeyStrategy,
    /// Process durable keys on the rayon pool (requires the `parallel` feature)
    pub parallel: bool,
}

/// Reusable merge engine for one validated policy.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use scd_merge::merge::Merger;
/// use scd_merge::models::{ColumnPolicy, Row, ScdType, Table};
///
/// let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type1);
/// let merger = Merger::new(&policy).unwrap();
///
/// let source = Table::default()
///     .with_row(Row::new().with("customer", "C1").with("credit_score", 730));
/// let day = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
/// let snapshot = merger.merge(&source, &Table::default(), day).unwrap();
///
/// assert_eq!(snapshot.table.rows[0].get("current_credit_score").as_i64(), Some(730));
/// ```
#[derive(Debug)]
pub struct Merger {
    policy: ValidatedPolicy,
    handlers: Vec<Box<dyn ScdHandler>>,
    options: MergeOptions,
    key_generator: Option<Arc<dyn SurrogateKeyGenerator>>,
}

impl Merger {
    /// Validate `policy` and build its handlers
    pub fn new(policy: &ColumnPolicy) -> MergeResult<Self> {
        let policy = PolicyValidator::new().validate(policy)?;
        let handlers = handlers_for(&policy.rules);
        Ok(Self {
            policy,
            handlers,
            options: MergeOptions::default(),
            key_generator: None,
        })
    }

    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a shared generator instead of the one chosen by [`MergeOptions`]
    pub fn with_key_generator(mut self, generator: Arc<dyn SurrogateKeyGenerator>) -> Self {
        self.key_generator = Some(generator);
        self
    }

    pub fn policy(&self) -> &ValidatedPolicy {
        &self.policy
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `source` into `target` as of `merge_timestamp`.
    ///
    /// Neither input is modified. The returned snapshot holds every target
    /// row (closed, rewritten or carried through) plus any new versions,
    /// ordered by durable key.
    pub fn merge(
        &self,
        source: &Table,
        target: &Table,
        merge_timestamp: NaiveDate,
    ) -> MergeResult<MergedSnapshot> {
        self.policy.check_source(source)?;
        self.policy.check_target(target)?;
        let groups = resolve_keys(source, target, &self.policy)?;

        let mut registry = KeyRegistry::default();
        if let Some(versioning) = &self.policy.versioning {
            for row in &target.rows {
                registry.claim(
                    row.get(&versioning.surrogate_key),
                    &row.durable_key(&self.policy.durable_key),
                )?;
            }
        }

        let source_columns: BTreeSet<String> = source.columns.iter().cloned().collect();
        let outcomes = self.process(&groups, &source_columns, merge_timestamp)?;

        let generator = self.key_generator_for(target);
        let mut report = MergeReport::default();
        let mut table = Table::new(self.output_columns(target));
        for mut outcome in outcomes {
            if let Some(versioning) = &self.policy.versioning {
                for &index in &outcome.pending {
                    let row = &mut outcome.rows[index];
                    let from = row.get(&versioning.effective_from).as_date().ok_or_else(|| {
                        MergeError::MalformedTargetRow {
                            key: outcome.key.to_string(),
                            reason: format!(
                                "cannot assign a surrogate key without '{}'",
                                versioning.effective_from
                            ),
                        }
                    })?;
                    let surrogate = generator.allocate(&outcome.key, from);
                    registry.claim(&surrogate, &outcome.key)?;
                    row.set(versioning.surrogate_key.clone(), surrogate);
                    report.surrogate_keys_allocated += 1;
                }
            }
            report.versions_opened += outcome.opened;
            report.versions_closed += outcome.closed;
            report.versions_rewritten += outcome.rewritten;
            match outcome.decision {
                Some(decision) => report.record(decision),
                None => report.carried_keys += 1,
            }
            for row in outcome.rows {
                table.push(row);
            }
        }
        report.rows_out = table.len();

        info!(
            "Merged {} source rows into {} target rows as of {}: {} new, {} changed, {} unchanged, {} carried through, {} versions opened",
            source.len(),
            target.len(),
            merge_timestamp,
            report.new_keys,
            report.changed_keys,
            report.unchanged_keys,
            report.carried_keys,
            report.versions_opened
        );
        Ok(MergedSnapshot::new(table, report, &self.policy))
    }

    fn process(
        &self,
        groups: &[KeyGroup<'_>],
        source_columns: &BTreeSet<String>,
        merge_timestamp: NaiveDate,
    ) -> MergeResult<Vec<KeyOutcome>> {
        #[cfg(feature = "parallel")]
        {
            if self.options.parallel {
                // Collect in key order first so the reported error is deterministic.
                let results: Vec<MergeResult<KeyOutcome>> = groups
                    .par_iter()
                    .map(|group| self.merge_key(group, source_columns, merge_timestamp))
                    .collect();
                return results.into_iter().collect();
            }
        }
        groups
            .iter()
            .map(|group| self.merge_key(group, source_columns, merge_timestamp))
            .collect()
    }

    fn merge_key(
        &self,
        group: &KeyGroup<'_>,
        source_columns: &BTreeSet<String>,
        merge_timestamp: NaiveDate,
    ) -> MergeResult<KeyOutcome> {
        let Some(source) = group.source else {
            let mut outcome = KeyOutcome::new(group.key.clone(), None);
            outcome.rows = group.target.iter().map(|row| (*row).clone()).collect();
            self.backfill_surrogate_keys(&mut outcome);
            return Ok(outcome);
        };

        let current = group.current_row();
        let ctx = KeyContext {
            key: &group.key,
            source,
            source_columns,
            current,
            latest_closed: self.latest_closed(group),
            type3_mode: self.options.type3_mode,
        };
        let change = self
            .handlers
            .iter()
            .map(|handler| handler.detect(&ctx))
            .max()
            .unwrap_or(ChangeKind::None);
        let mut images = Images::default();
        for handler in &self.handlers {
            handler.emit(&ctx, &mut images);
        }
        let carried = self.pass_through_values(&ctx);

        let status = match (current, change) {
            (None, _) => KeyStatus::New,
            (Some(_), ChangeKind::None) => KeyStatus::Unchanged,
            (Some(_), _) => KeyStatus::Changed,
        };
        debug!("Key {} is {:?} ({:?})", group.key, status, change);

        let mut outcome = KeyOutcome::new(
            group.key.clone(),
            Some(KeyDecision {
                key: group.key.clone(),
                status,
                change,
            }),
        );
        match &self.policy.versioning {
            None => {
                let mut row = current.cloned().unwrap_or_else(|| self.key_row(&group.key));
                row.extend_from(&images.key_level);
                row.extend_from(&carried);
                outcome.rows.push(row);
            }
            Some(versioning) => self.merge_versions(
                group,
                &images,
                &carried,
                change,
                versioning,
                merge_timestamp,
                &mut outcome,
            )?,
        }
        self.backfill_surrogate_keys(&mut outcome);
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_versions(
        &self,
        group: &KeyGroup<'_>,
        images: &Images,
        carried: &Row,
        change: ChangeKind,
        versioning: &Versioning,
        merge_timestamp: NaiveDate,
        outcome: &mut KeyOutcome,
    ) -> MergeResult<()> {
        let mut rows: Vec<Row> = group.target.iter().map(|row| (*row).clone()).collect();
        for row in &mut rows {
            row.extend_from(&images.key_level);
        }

        match (group.current, group.current_from) {
            (Some(index), Some(current_from)) if change == ChangeKind::NewVersion => {
                if merge_timestamp < current_from {
                    return Err(MergeError::MergeTimestampBeforeCurrent {
                        key: group.key.to_string(),
                        current_from,
                        merge_timestamp,
                    });
                }
                if merge_timestamp == current_from {
                    // Same-day rerun: replace the version instead of stacking a new one.
                    rows[index].extend_from(&images.version_level);
                    rows[index].extend_from(carried);
                    outcome.rewritten += 1;
                } else {
                    let mut next = rows[index].clone();
                    let closing = &mut rows[index];
                    closing.set(
                        versioning.effective_to.clone(),
                        close_date(versioning.interval_end, merge_timestamp),
                    );
                    closing.set(versioning.current_flag.clone(), false);

                    next.extend_from(&images.version_level);
                    next.extend_from(carried);
                    open_version(&mut next, versioning, merge_timestamp);
                    rows.push(next);
                    outcome.pending.push(rows.len() - 1);
                    outcome.opened += 1;
                    outcome.closed += 1;
                }
            }
            (Some(index), _) => rows[index].extend_from(carried),
            (None, _) => {
                let closed_to = latest_close(&group.target, versioning);
                if let Some(closed_to) = closed_to.filter(|to| {
                    overlaps_closed(versioning.interval_end, *to, merge_timestamp)
                }) {
                    return Err(MergeError::MergeTimestampWithinHistory {
                        key: group.key.to_string(),
                        closed_to,
                        merge_timestamp,
                    });
                }
                let mut next = self.key_row(&group.key);
                next.extend_from(&images.key_level);
                next.extend_from(&images.version_level);
                next.extend_from(carried);
                open_version(&mut next, versioning, merge_timestamp);
                rows.push(next);
                outcome.pending.push(rows.len() - 1);
                outcome.opened += 1;
            }
        }
        outcome.rows = rows;
        Ok(())
    }

    /// Queue every row without a surrogate key when type 7 requires both keys
    fn backfill_surrogate_keys(&self, outcome: &mut KeyOutcome) {
        let Some(versioning) = &self.policy.versioning else {
            return;
        };
        if !self.policy.requires_dual_keys() {
            return;
        }
        for (index, row) in outcome.rows.iter().enumerate() {
            if row.get(&versioning.surrogate_key).is_null() && !outcome.pending.contains(&index) {
                outcome.pending.push(index);
            }
        }
        outcome.pending.sort_unstable();
    }

    fn latest_closed<'a>(&self, group: &KeyGroup<'a>) -> Option<&'a Row> {
        if group.current.is_some() {
            return None;
        }
        match &self.policy.versioning {
            Some(versioning) => group
                .target
                .iter()
                .copied()
                .max_by_key(|row| row.get(&versioning.effective_from).as_date()),
            None => group.target.last().copied(),
        }
    }

    fn pass_through_values(&self, ctx: &KeyContext<'_>) -> Row {
        self.policy
            .pass_through
            .iter()
            .map(|column| {
                let value = ctx
                    .incoming(column)
                    .unwrap_or_else(|| ctx.existing(column))
                    .clone();
                (column.clone(), value)
            })
            .collect()
    }

    fn key_row(&self, key: &DurableKey) -> Row {
        self.policy
            .durable_key
            .iter()
            .cloned()
            .zip(key.values().iter().cloned())
            .collect()
    }

    fn key_generator_for(&self, target: &Table) -> Arc<dyn SurrogateKeyGenerator> {
        if let Some(generator) = &self.key_generator {
            return Arc::clone(generator);
        }
        match (self.options.surrogate_keys, &self.policy.versioning) {
            (SurrogateKeyStrategy::Sequence, Some(versioning)) => Arc::new(
                SequenceGenerator::after_max(target, &versioning.surrogate_key),
            ),
            _ => Arc::new(DurableKeyUuid::default()),
        }
    }

    /// Policy columns first, then any extra columns the target already carried
    fn output_columns(&self, target: &Table) -> Vec<String> {
        let mut columns = self.policy.output_columns();
        for column in &target.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}

/// Per-key result before surrogate keys are assigned
#[derive(Debug)]
struct KeyOutcome {
    key: DurableKey,
    /// `None` for keys only present in the target
    decision: Option<KeyDecision>,
    rows: Vec<Row>,
    /// Rows that still need a surrogate key
    pending: Vec<usize>,
    opened: usize,
    closed: usize,
    rewritten: usize,
}

impl KeyOutcome {
    fn new(key: DurableKey, decision: Option<KeyDecision>) -> Self {
        Self {
            key,
            decision,
            rows: Vec::new(),
            pending: Vec::new(),
            opened: 0,
            closed: 0,
            rewritten: 0,
        }
    }
}

/// `effective_to` of a version closed by a merge at `merge_timestamp`
pub fn close_date(interval_end: IntervalEnd, merge_timestamp: NaiveDate) -> NaiveDate {
    match interval_end {
        IntervalEnd::Inclusive => merge_timestamp.pred_opt().unwrap_or(merge_timestamp),
        IntervalEnd::Exclusive => merge_timestamp,
    }
}

/// Latest `effective_to` among a member's closed versions
fn latest_close(target: &[&Row], versioning: &Versioning) -> Option<NaiveDate> {
    target
        .iter()
        .filter_map(|row| row.get(&versioning.effective_to).as_date())
        .max()
}

/// Whether a version opened at `merge_timestamp` would overlap one ending at `closed_to`
fn overlaps_closed(
    interval_end: IntervalEnd,
    closed_to: NaiveDate,
    merge_timestamp: NaiveDate,
) -> bool {
    match interval_end {
        IntervalEnd::Inclusive => merge_timestamp <= closed_to,
        IntervalEnd::Exclusive => merge_timestamp < closed_to,
    }
}

fn open_version(row: &mut Row, versioning: &Versioning, merge_timestamp: NaiveDate) {
    row.set(versioning.surrogate_key.clone(), Value::Null);
    row.set(versioning.effective_from.clone(), merge_timestamp);
    row.set(versioning.effective_to.clone(), versioning.sentinel);
    row.set(versioning.current_flag.clone(), true);
}

/// Validate `policy` and merge `source` into `target` as of `merge_timestamp`.
///
/// Shorthand for [`Merger::new`] followed by [`Merger::merge`] with default
/// options.
pub fn merge(
    source: &Table,
    target: &Table,
    policy: &ColumnPolicy,
    merge_timestamp: NaiveDate,
) -> MergeResult<MergedSnapshot> {
    Merger::new(policy)?.merge(source, target, merge_timestamp)
}
