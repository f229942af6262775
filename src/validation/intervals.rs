//! Effective interval validation
//!
//! Checks the history of every durable key in a versioned dimension:
//! intervals are well formed, consecutive versions are contiguous without
//! overlap, and exactly one row is current and open-ended.

use crate::models::{DurableKey, IntervalEnd, Row, Table, Versioning};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of interval violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalViolationKind {
    /// `effective_from` or `effective_to` is missing or not a date
    MissingDates,
    /// The interval ends before it starts
    Inverted,
    /// Two versions cover the same date
    Overlap,
    /// Dates between two versions are not covered
    Gap,
    /// More than one row is flagged current
    MultipleCurrent,
    /// No row is flagged current
    NoCurrent,
    /// The current flag and the sentinel `effective_to` disagree
    CurrentFlagMismatch,
}

/// A single interval violation for one durable key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalViolation {
    pub key: DurableKey,
    pub kind: IntervalViolationKind,
    pub message: String,
}

struct Version {
    from: NaiveDate,
    to: NaiveDate,
    current: bool,
}

/// Check every durable key's version history.
///
/// Returns an empty vector when the table is consistent.
///
/// # Example
///
/// ```rust
/// use scd_merge::models::{Row, Table, Versioning};
/// use scd_merge::validation::intervals::check_history;
/// use chrono::NaiveDate;
///
/// let versioning = Versioning::default();
/// let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
/// let table = Table::default()
///     .with_row(Row::new().with("customer", "C1")
///         .with("effective_from", d(2022, 1, 1)).with("effective_to", d(2022, 1, 30))
///         .with("is_current", false))
///     .with_row(Row::new().with("customer", "C1")
///         .with("effective_from", d(2022, 1, 31)).with("effective_to", d(9999, 12, 31))
///         .with("is_current", true));
///
/// assert!(check_history(&table, &["customer".to_string()], &versioning).is_empty());
/// ```
pub fn check_history(
    table: &Table,
    durable_key: &[String],
    versioning: &Versioning,
) -> Vec<IntervalViolation> {
    let mut violations = Vec::new();
    let mut by_key: BTreeMap<DurableKey, Vec<&Row>> = BTreeMap::new();
    for row in &table.rows {
        by_key
            .entry(row.durable_key(durable_key))
            .or_default()
            .push(row);
    }

    for (key, rows) in by_key {
        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            let from = row.get(&versioning.effective_from).as_date();
            let to = row.get(&versioning.effective_to).as_date();
            match (from, to) {
                (Some(from), Some(to)) => versions.push(Version {
                    from,
                    to,
                    current: row.get(&versioning.current_flag).as_bool() == Some(true),
                }),
                _ => violations.push(violation(
                    &key,
                    IntervalViolationKind::MissingDates,
                    "row has no usable effective dates".to_string(),
                )),
            }
        }
        check_key(&key, &mut versions, versioning, &mut violations);
    }
    violations
}

fn check_key(
    key: &DurableKey,
    versions: &mut [Version],
    versioning: &Versioning,
    violations: &mut Vec<IntervalViolation>,
) {
    versions.sort_by_key(|v| v.from);

    for v in versions.iter() {
        let inverted = match versioning.interval_end {
            IntervalEnd::Inclusive => v.to < v.from,
            IntervalEnd::Exclusive => v.to <= v.from,
        };
        if inverted {
            violations.push(violation(
                key,
                IntervalViolationKind::Inverted,
                format!("interval {} .. {} is inverted", v.from, v.to),
            ));
        }
        let open_ended = v.to == versioning.sentinel;
        if v.current != open_ended {
            violations.push(violation(
                key,
                IntervalViolationKind::CurrentFlagMismatch,
                format!(
                    "row from {} has current flag {} but effective_to {}",
                    v.from, v.current, v.to
                ),
            ));
        }
    }

    for pair in versions.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let expected_next = match versioning.interval_end {
            IntervalEnd::Inclusive => prev.to.checked_add_days(Days::new(1)),
            IntervalEnd::Exclusive => Some(prev.to),
        };
        match expected_next {
            Some(expected) if next.from < expected => violations.push(violation(
                key,
                IntervalViolationKind::Overlap,
                format!(
                    "version from {} overlaps version ending {}",
                    next.from, prev.to
                ),
            )),
            Some(expected) if next.from > expected => violations.push(violation(
                key,
                IntervalViolationKind::Gap,
                format!("gap between {} and {}", prev.to, next.from),
            )),
            Some(_) => {}
            None => violations.push(violation(
                key,
                IntervalViolationKind::Overlap,
                format!("version ending {} leaves no room for a successor", prev.to),
            )),
        }
    }

    let current = versions.iter().filter(|v| v.current).count();
    if current > 1 {
        violations.push(violation(
            key,
            IntervalViolationKind::MultipleCurrent,
            format!("{} rows are flagged current", current),
        ));
    } else if current == 0 && !versions.is_empty() {
        violations.push(violation(
            key,
            IntervalViolationKind::NoCurrent,
            "no row is flagged current".to_string(),
        ));
    }
}

fn violation(key: &DurableKey, kind: IntervalViolationKind, message: String) -> IntervalViolation {
    IntervalViolation {
        key: key.clone(),
        kind,
        message,
    }
}
