//! Column policy model
//!
//! A [`ColumnPolicy`] declares, for every attribute of the source batch, which
//! SCD technique governs it, plus the durable key and the naming conventions
//! used for derived columns. Validation lives in
//! [`crate::validation::policy`]; this module only holds the declarative shape.

use super::enums::{IntervalEnd, ScdType, Type3Mode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder replaced by the source column name in rename templates
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Default far-future `effective_to` for current rows
pub fn default_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Type-specific parameters of a column rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Type 3: name of the alternate column (defaults to the naming strategy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_column: Option<String>,
    /// Type 3: override the merge-level alternate column behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type3_mode: Option<Type3Mode>,
    /// Type 6: name of the shadow current column (defaults to the naming strategy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_column: Option<String>,
}

impl RuleParams {
    pub fn is_empty(&self) -> bool {
        self == &RuleParams::default()
    }
}

/// One SCD rule applied to a source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// SCD technique
    #[serde(rename = "type")]
    pub scd_type: ScdType,
    /// Template for the primary output column; `{name}` expands to the source column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Type-specific parameters
    #[serde(default, flatten)]
    pub params: RuleParams,
}

impl ColumnRule {
    pub fn new(scd_type: ScdType) -> Self {
        Self {
            scd_type,
            rename: None,
            params: RuleParams::default(),
        }
    }

    pub fn renamed(mut self, template: impl Into<String>) -> Self {
        self.rename = Some(template.into());
        self
    }

    pub fn with_params(mut self, params: RuleParams) -> Self {
        self.params = params;
        self
    }
}

/// Accepts either a single rule or a list of rules per column
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleSet {
    One(ColumnRule),
    Many(Vec<ColumnRule>),
}

fn deserialize_columns<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Vec<ColumnRule>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, RuleSet> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(column, set)| {
            let rules = match set {
                RuleSet::One(rule) => vec![rule],
                RuleSet::Many(rules) => rules,
            };
            (column, rules)
        })
        .collect())
}

/// Output column naming conventions.
///
/// Each template contains `{name}`, which expands to the source column. The
/// defaults follow the Kimball presentation style: `original_`, `current_`,
/// `_alternate`, `_current` and `_historical`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingStrategy {
    pub type0: String,
    pub type1: String,
    pub type2: String,
    pub type3: String,
    pub type3_alternate: String,
    pub type6_historical: String,
    pub type6_current: String,
    pub type7: String,
}

impl Default for NamingStrategy {
    fn default() -> Self {
        Self {
            type0: "original_{name}".to_string(),
            type1: "current_{name}".to_string(),
            type2: NAME_PLACEHOLDER.to_string(),
            type3: NAME_PLACEHOLDER.to_string(),
            type3_alternate: "{name}_alternate".to_string(),
            type6_historical: "{name}_historical".to_string(),
            type6_current: "{name}_current".to_string(),
            type7: NAME_PLACEHOLDER.to_string(),
        }
    }
}

impl NamingStrategy {
    /// Template for the primary output column of a type
    pub fn primary_template(&self, scd_type: ScdType) -> &str {
        match scd_type {
            ScdType::Type0 => &self.type0,
            ScdType::Type1 => &self.type1,
            ScdType::Type2 => &self.type2,
            ScdType::Type3 => &self.type3,
            ScdType::Type6 => &self.type6_historical,
            ScdType::Type7 => &self.type7,
        }
    }
}

/// Expand a rename template for a source column
pub fn expand_template(template: &str, column: &str) -> String {
    template.replace(NAME_PLACEHOLDER, column)
}

/// Row-versioning metadata columns, emitted when any type 2/6/7 rule is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Versioning {
    pub surrogate_key: String,
    pub effective_from: String,
    pub effective_to: String,
    pub current_flag: String,
    /// `effective_to` of current rows
    pub sentinel: NaiveDate,
    pub interval_end: IntervalEnd,
}

impl Default for Versioning {
    fn default() -> Self {
        Self {
            surrogate_key: "surrogate_key".to_string(),
            effective_from: "effective_from".to_string(),
            effective_to: "effective_to".to_string(),
            current_flag: "is_current".to_string(),
            sentinel: default_sentinel(),
            interval_end: IntervalEnd::default(),
        }
    }
}

impl Versioning {
    pub fn column_names(&self) -> [&str; 4] {
        [
            &self.surrogate_key,
            &self.effective_from,
            &self.effective_to,
            &self.current_flag,
        ]
    }
}

/// Declared historization policy for a dimension.
///
/// # Example
///
/// ```rust
/// use scd_merge::models::{ColumnPolicy, ScdType};
///
/// let policy = ColumnPolicy::new(["customer"])
///     .declare("credit_score", ScdType::Type2)
///     .declare("segment", ScdType::Type1);
/// assert!(policy.is_versioned());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPolicy {
    /// Durable (natural) key columns
    pub durable_key: Vec<String>,
    /// Rules per source column
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: BTreeMap<String, Vec<ColumnRule>>,
    /// Columns copied as-is without historization
    #[serde(default)]
    pub pass_through: Vec<String>,
    #[serde(default)]
    pub naming: NamingStrategy,
    #[serde(default)]
    pub versioning: Versioning,
}

impl ColumnPolicy {
    pub fn new<I, S>(durable_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            durable_key: durable_key.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Declare a rule with default naming and no parameters
    pub fn declare(self, column: impl Into<String>, scd_type: ScdType) -> Self {
        self.declare_rule(column, ColumnRule::new(scd_type))
    }

    pub fn declare_rule(mut self, column: impl Into<String>, rule: ColumnRule) -> Self {
        self.columns.entry(column.into()).or_default().push(rule);
        self
    }

    pub fn pass_through(mut self, column: impl Into<String>) -> Self {
        self.pass_through.push(column.into());
        self
    }

    pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_versioning(mut self, versioning: Versioning) -> Self {
        self.versioning = versioning;
        self
    }

    /// Whether any declared rule creates row versions
    pub fn is_versioned(&self) -> bool {
        self.rules().any(|(_, rule)| rule.scd_type.is_row_versioning())
    }

    /// Iterate `(source column, rule)` pairs in declaration order per column
    pub fn rules(&self) -> impl Iterator<Item = (&String, &ColumnRule)> {
        self.columns
            .iter()
            .flat_map(|(column, rules)| rules.iter().map(move |rule| (column, rule)))
    }

    /// Parse a policy from YAML
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Export the policy to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
