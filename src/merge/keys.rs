//! Durable key resolution
//!
//! Groups source and target rows by durable key and locates the current
//! target row of every key. Duplicate or null keys and corrupt current flags
//! are rejected here, before any handler runs.

use crate::error::{MergeError, MergeResult, TableRole};
use crate::models::{DurableKey, Row, Table};
use crate::validation::ValidatedPolicy;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// All rows of one durable key across both merge inputs
#[derive(Debug, Clone)]
pub struct KeyGroup<'a> {
    pub key: DurableKey,
    /// The key's source row; `None` when the key only exists in the target
    pub source: Option<&'a Row>,
    /// Target rows of the key in their original order
    pub target: Vec<&'a Row>,
    /// Index into `target` of the current row
    pub current: Option<usize>,
    /// Start date of the current row, for versioned policies
    pub current_from: Option<NaiveDate>,
}

impl<'a> KeyGroup<'a> {
    fn new(key: DurableKey) -> Self {
        Self {
            key,
            source: None,
            target: Vec::new(),
            current: None,
            current_from: None,
        }
    }

    pub fn current_row(&self) -> Option<&'a Row> {
        self.current.map(|i| self.target[i])
    }

    pub fn is_carried_through(&self) -> bool {
        self.source.is_none()
    }
}

/// Group both inputs by durable key, in ascending key order.
///
/// # Errors
///
/// `NullDurableKey` for a row with a null key value, `DuplicateSourceKey` when
/// the source holds several rows for one key, `DuplicateCurrentRow` when the
/// target holds several current rows for one key and `MalformedTargetRow`
/// when a current flag or start date cannot be read.
pub fn resolve_keys<'a>(
    source: &'a Table,
    target: &'a Table,
    policy: &ValidatedPolicy,
) -> MergeResult<Vec<KeyGroup<'a>>> {
    let mut groups: BTreeMap<DurableKey, KeyGroup<'a>> = BTreeMap::new();
    let mut source_counts: BTreeMap<DurableKey, usize> = BTreeMap::new();

    for (index, row) in source.rows.iter().enumerate() {
        let key = row.durable_key(&policy.durable_key);
        if key.has_null() {
            return Err(MergeError::NullDurableKey {
                table: TableRole::Source,
                row: index,
            });
        }
        *source_counts.entry(key.clone()).or_default() += 1;
        groups
            .entry(key.clone())
            .or_insert_with(|| KeyGroup::new(key))
            .source = Some(row);
    }
    if let Some((key, count)) = source_counts.iter().find(|(_, count)| **count > 1) {
        return Err(MergeError::DuplicateSourceKey {
            key: key.to_string(),
            count: *count,
        });
    }

    for (index, row) in target.rows.iter().enumerate() {
        let key = row.durable_key(&policy.durable_key);
        if key.has_null() {
            return Err(MergeError::NullDurableKey {
                table: TableRole::Target,
                row: index,
            });
        }
        groups
            .entry(key.clone())
            .or_insert_with(|| KeyGroup::new(key))
            .target
            .push(row);
    }

    for group in groups.values_mut() {
        locate_current(group, policy)?;
    }
    Ok(groups.into_values().collect())
}

fn locate_current(group: &mut KeyGroup<'_>, policy: &ValidatedPolicy) -> MergeResult<()> {
    let Some(versioning) = &policy.versioning else {
        // Without versioning every target row is the member's only row.
        if group.target.len() > 1 {
            return Err(MergeError::DuplicateCurrentRow {
                key: group.key.to_string(),
                count: group.target.len(),
            });
        }
        group.current = (!group.target.is_empty()).then_some(0);
        return Ok(());
    };

    let mut current = Vec::new();
    for (index, row) in group.target.iter().enumerate() {
        let flag = row.get(&versioning.current_flag);
        match flag.as_bool() {
            Some(true) => current.push(index),
            Some(false) => {}
            None => {
                return Err(MergeError::MalformedTargetRow {
                    key: group.key.to_string(),
                    reason: format!(
                        "'{}' must be a boolean, found {}",
                        versioning.current_flag, flag
                    ),
                });
            }
        }
    }
    if current.len() > 1 {
        return Err(MergeError::DuplicateCurrentRow {
            key: group.key.to_string(),
            count: current.len(),
        });
    }

    if let Some(&index) = current.first() {
        let from = group.target[index].get(&versioning.effective_from);
        let date = from.as_date().ok_or_else(|| MergeError::MalformedTargetRow {
            key: group.key.to_string(),
            reason: format!(
                "current row has no readable '{}' (found {})",
                versioning.effective_from, from
            ),
        })?;
        group.current = Some(index);
        group.current_from = Some(date);
    }
    Ok(())
}
