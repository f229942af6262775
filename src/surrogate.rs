//! Surrogate key generation
//!
//! Surrogate keys identify one version of a dimension member. They are only
//! allocated for row-versioning (type 2/6/7) output and are never reused.

use crate::error::{MergeError, MergeResult};
use crate::models::{DurableKey, Table, Value};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Allocator for surrogate keys.
///
/// Implementations must hand out distinct keys under concurrent access.
pub trait SurrogateKeyGenerator: Send + Sync + fmt::Debug {
    /// Allocate the key for the version of `key` starting at `effective_from`
    fn allocate(&self, key: &DurableKey, effective_from: NaiveDate) -> Value;
}

/// Deterministic UUID v5 keys derived from the durable key and effective date.
///
/// The same member and start date always yield the same key, which makes
/// re-running a merge reproduce byte-identical output.
#[derive(Debug, Clone)]
pub struct DurableKeyUuid {
    namespace: Uuid,
}

impl Default for DurableKeyUuid {
    fn default() -> Self {
        Self::new(Uuid::new_v5(&Uuid::NAMESPACE_OID, b"scd-merge.surrogate-key"))
    }
}

impl DurableKeyUuid {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    fn name(key: &DurableKey, effective_from: NaiveDate) -> String {
        let mut name: String = key
            .values()
            .iter()
            .map(|value| {
                let rendered = value.to_string();
                // Tag and length prefix keep ("a|b") distinct from ("a", "b").
                format!("{}{}:{}|", type_tag(value), rendered.len(), rendered)
            })
            .collect();
        name.push_str(&format!("@{}", effective_from.format("%Y-%m-%d")));
        name
    }
}

fn type_tag(value: &Value) -> char {
    match value {
        Value::Null => 'n',
        Value::Bool(_) => 'b',
        Value::Int(_) => 'i',
        Value::Float(_) => 'f',
        Value::Date(_) => 'd',
        Value::String(_) => 's',
    }
}

impl SurrogateKeyGenerator for DurableKeyUuid {
    fn allocate(&self, key: &DurableKey, effective_from: NaiveDate) -> Value {
        let name = Self::name(key, effective_from);
        Value::String(Uuid::new_v5(&self.namespace, name.as_bytes()).to_string())
    }
}

/// Monotonic integer keys backed by an atomic counter.
///
/// Share one instance behind an `Arc` to get process-wide unique keys across
/// merges.
///
/// # Example
///
/// ```rust
/// use scd_merge::surrogate::{SequenceGenerator, SurrogateKeyGenerator};
/// use scd_merge::models::{DurableKey, Value};
/// use chrono::NaiveDate;
///
/// let keys = SequenceGenerator::new(100);
/// let member = DurableKey(vec![Value::from("C1")]);
/// let day = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap();
/// assert_eq!(keys.allocate(&member, day), Value::Int(100));
/// assert_eq!(keys.allocate(&member, day), Value::Int(101));
/// ```
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Start one above the largest non-negative integer key in `column`
    pub fn after_max(table: &Table, column: &str) -> Self {
        let max = table
            .rows
            .iter()
            .filter_map(|row| row.get(column).as_i64())
            .filter_map(|v| u64::try_from(v).ok())
            .max();
        Self::new(max.map_or(1, |m| m.saturating_add(1)))
    }

    /// Next key that would be handed out
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl SurrogateKeyGenerator for SequenceGenerator {
    fn allocate(&self, _key: &DurableKey, _effective_from: NaiveDate) -> Value {
        Value::from(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Tracks surrogate keys seen in one merge to detect reuse
#[derive(Debug, Default)]
pub(crate) struct KeyRegistry {
    seen: HashSet<Value>,
}

impl KeyRegistry {
    /// Register a key, failing if it was seen before
    pub(crate) fn claim(&mut self, surrogate: &Value, owner: &DurableKey) -> MergeResult<()> {
        if surrogate.is_null() {
            return Ok(());
        }
        if !self.seen.insert(surrogate.clone()) {
            return Err(MergeError::SurrogateKeyCollision {
                key: owner.to_string(),
                surrogate_key: surrogate.to_string(),
            });
        }
        Ok(())
    }
}
