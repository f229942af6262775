//! Column policy validation
//!
//! Turns a declarative [`ColumnPolicy`] into a read-only [`ValidatedPolicy`]
//! with every output column name resolved, and checks merge inputs against it.

use crate::error::{MergeError, MergeResult, TableRole};
use crate::models::policy::{NAME_PLACEHOLDER, expand_template};
use crate::models::{ColumnPolicy, ColumnRule, ScdType, Table, Type3Mode, Versioning};
use std::collections::{BTreeMap, BTreeSet};

/// A column rule with its output names resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    /// Source column the rule reads
    pub source: String,
    pub scd_type: ScdType,
    /// Primary output column
    pub output: String,
    /// Type 3 alternate column or type 6 shadow current column
    pub secondary: Option<String>,
    /// Type 3 per-rule mode override
    pub type3_mode: Option<Type3Mode>,
}

impl ResolvedRule {
    pub fn output_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.output.as_str()).chain(self.secondary.as_deref())
    }
}

/// Policy that passed validation.
///
/// Read-only after construction; every handler looks its columns up here.
#[derive(Debug, Clone)]
pub struct ValidatedPolicy {
    pub durable_key: Vec<String>,
    pub rules: Vec<ResolvedRule>,
    pub pass_through: Vec<String>,
    /// Present when at least one rule versions rows
    pub versioning: Option<Versioning>,
}

impl ValidatedPolicy {
    pub fn is_versioned(&self) -> bool {
        self.versioning.is_some()
    }

    /// Whether any type 7 rule requires both keys on every row
    pub fn requires_dual_keys(&self) -> bool {
        self.rules.iter().any(|r| r.scd_type == ScdType::Type7)
    }

    fn declared_sources(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.source.as_str()).collect()
    }

    /// Output columns in presentation order: durable key, versioning metadata,
    /// rule outputs, pass-through.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = self.durable_key.clone();
        if let Some(versioning) = &self.versioning {
            columns.extend(versioning.column_names().iter().map(|c| (*c).to_string()));
        }
        for rule in &self.rules {
            columns.extend(rule.output_columns().map(str::to_string));
        }
        columns.extend(self.pass_through.iter().cloned());
        columns
    }

    /// Check that every source column is covered by the policy
    ///
    /// # Errors
    ///
    /// `MissingColumn` when a durable key column is absent, `UnknownColumnPolicy`
    /// for a column that is neither a key, declared, nor pass-through.
    pub fn check_source(&self, source: &Table) -> MergeResult<()> {
        for key in &self.durable_key {
            if !source.has_column(key) {
                return Err(MergeError::MissingColumn {
                    table: TableRole::Source,
                    column: key.clone(),
                });
            }
        }

        let declared = self.declared_sources();
        for column in &source.columns {
            let known = self.durable_key.contains(column)
                || declared.contains(column.as_str())
                || self.pass_through.contains(column);
            if !known {
                return Err(MergeError::UnknownColumnPolicy {
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that a non-empty target carries the key and versioning columns
    pub fn check_target(&self, target: &Table) -> MergeResult<()> {
        if target.is_empty() {
            return Ok(());
        }
        let mut required: Vec<&str> = self.durable_key.iter().map(String::as_str).collect();
        if let Some(versioning) = &self.versioning {
            // Surrogate keys may be absent on legacy rows; type 7 backfills them.
            required.extend([
                versioning.effective_from.as_str(),
                versioning.effective_to.as_str(),
                versioning.current_flag.as_str(),
            ]);
        }
        for column in required {
            if !target.has_column(column) {
                return Err(MergeError::MissingColumn {
                    table: TableRole::Target,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Column policy validator
#[derive(Default)]
pub struct PolicyValidator;

impl PolicyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a policy and resolve its output names.
    ///
    /// # Errors
    ///
    /// `InvalidPolicyParams` for malformed rules or templates, `PolicyConflict`
    /// for incompatible rule combinations or output name collisions.
    ///
    /// # Example
    ///
    /// ```rust
    /// use scd_merge::models::{ColumnPolicy, ScdType};
    /// use scd_merge::validation::PolicyValidator;
    ///
    /// let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type0);
    /// let validated = PolicyValidator::new().validate(&policy).unwrap();
    /// assert_eq!(validated.rules[0].output, "original_credit_score");
    /// ```
    pub fn validate(&self, policy: &ColumnPolicy) -> MergeResult<ValidatedPolicy> {
        if policy.durable_key.is_empty() {
            return Err(MergeError::invalid_params(
                "durable_key",
                "at least one durable key column is required",
            ));
        }
        let mut seen_keys = BTreeSet::new();
        for key in &policy.durable_key {
            if key.trim().is_empty() {
                return Err(MergeError::invalid_params(
                    "durable_key",
                    "durable key column names cannot be empty",
                ));
            }
            if !seen_keys.insert(key.as_str()) {
                return Err(MergeError::conflict(key, "durable key column listed twice"));
            }
        }

        let mut seen_pass_through = BTreeSet::new();
        for column in &policy.pass_through {
            if policy.durable_key.contains(column) {
                return Err(MergeError::conflict(
                    column,
                    "a durable key column cannot also be pass-through",
                ));
            }
            if policy.columns.contains_key(column) {
                return Err(MergeError::conflict(
                    column,
                    "column is both declared and marked pass-through",
                ));
            }
            if !seen_pass_through.insert(column.as_str()) {
                return Err(MergeError::conflict(column, "pass-through column listed twice"));
            }
        }

        let mut rules = Vec::new();
        for (column, column_rules) in &policy.columns {
            if policy.durable_key.contains(column) {
                return Err(MergeError::conflict(
                    column,
                    "durable key columns cannot carry an SCD rule",
                ));
            }
            if column_rules.is_empty() {
                return Err(MergeError::invalid_params(column, "no rules declared"));
            }
            check_compatibility(column, column_rules)?;
            for rule in column_rules {
                rules.push(resolve_rule(policy, column, rule)?);
            }
        }

        let versioning = rules
            .iter()
            .any(|r| r.scd_type.is_row_versioning())
            .then(|| policy.versioning.clone());

        let validated = ValidatedPolicy {
            durable_key: policy.durable_key.clone(),
            rules,
            pass_through: policy.pass_through.clone(),
            versioning,
        };
        check_output_names(&validated)?;
        Ok(validated)
    }
}

/// Reject rule combinations that cannot coexist on one attribute
fn check_compatibility(column: &str, rules: &[ColumnRule]) -> MergeResult<()> {
    let mut types = BTreeSet::new();
    for rule in rules {
        if !types.insert(rule.scd_type) {
            return Err(MergeError::conflict(
                column,
                format!("{} declared more than once", rule.scd_type),
            ));
        }
    }

    let versioning: Vec<String> = types
        .iter()
        .filter(|t| t.is_row_versioning())
        .map(ToString::to_string)
        .collect();
    if versioning.len() > 1 {
        return Err(MergeError::conflict(
            column,
            format!(
                "only one row-versioning type is allowed per column, found {}",
                versioning.join(" and ")
            ),
        ));
    }

    let incompatible = [
        (
            ScdType::Type0,
            ScdType::Type3,
            "both claim the prior value of the attribute",
        ),
        (
            ScdType::Type1,
            ScdType::Type6,
            "TYPE6 already maintains an overwritten current value",
        ),
    ];
    for (a, b, reason) in incompatible {
        if types.contains(&a) && types.contains(&b) {
            return Err(MergeError::conflict(
                column,
                format!("{} and {} are incompatible: {}", a, b, reason),
            ));
        }
    }
    Ok(())
}

fn resolve_rule(
    policy: &ColumnPolicy,
    column: &str,
    rule: &ColumnRule,
) -> MergeResult<ResolvedRule> {
    let params = &rule.params;
    if rule.scd_type != ScdType::Type3
        && (params.alternate_column.is_some() || params.type3_mode.is_some())
    {
        return Err(MergeError::invalid_params(
            column,
            format!(
                "alternate_column and type3_mode only apply to TYPE3, not {}",
                rule.scd_type
            ),
        ));
    }
    if rule.scd_type != ScdType::Type6 && params.current_column.is_some() {
        return Err(MergeError::invalid_params(
            column,
            format!("current_column only applies to TYPE6, not {}", rule.scd_type),
        ));
    }

    let primary_template = rule
        .rename
        .as_deref()
        .unwrap_or_else(|| policy.naming.primary_template(rule.scd_type));
    let output = expand_checked(column, primary_template)?;

    let secondary = match rule.scd_type {
        ScdType::Type3 => {
            let template = params
                .alternate_column
                .as_deref()
                .unwrap_or(policy.naming.type3_alternate.as_str());
            let alternate = expand_checked(column, template).map_err(|_| {
                MergeError::invalid_params(column, "TYPE3 requires an alternate column name")
            })?;
            if alternate == output {
                return Err(MergeError::invalid_params(
                    column,
                    "TYPE3 alternate column must differ from the primary column",
                ));
            }
            Some(alternate)
        }
        ScdType::Type6 => {
            let template = params
                .current_column
                .as_deref()
                .unwrap_or(policy.naming.type6_current.as_str());
            let current = expand_checked(column, template).map_err(|_| {
                MergeError::invalid_params(column, "TYPE6 requires a current column name")
            })?;
            if current == output {
                return Err(MergeError::invalid_params(
                    column,
                    "TYPE6 current column must differ from the historical column",
                ));
            }
            Some(current)
        }
        _ => None,
    };

    Ok(ResolvedRule {
        source: column.to_string(),
        scd_type: rule.scd_type,
        output,
        secondary,
        type3_mode: params.type3_mode,
    })
}

/// Expand a template, rejecting empty results and unknown placeholders
fn expand_checked(column: &str, template: &str) -> MergeResult<String> {
    let stripped = template.replace(NAME_PLACEHOLDER, "");
    if stripped.contains('{') || stripped.contains('}') {
        return Err(MergeError::invalid_params(
            column,
            format!("template '{}' has a placeholder other than {{name}}", template),
        ));
    }
    let expanded = expand_template(template, column);
    if expanded.trim().is_empty() {
        return Err(MergeError::invalid_params(
            column,
            "output column template resolves to an empty name",
        ));
    }
    Ok(expanded)
}

/// Every output column must have exactly one owner
fn check_output_names(policy: &ValidatedPolicy) -> MergeResult<()> {
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for key in &policy.durable_key {
        owners.insert(key.clone(), "durable key".to_string());
    }
    if let Some(versioning) = &policy.versioning {
        for column in versioning.column_names() {
            if let Some(owner) = owners.insert(column.to_string(), "versioning".to_string()) {
                return Err(MergeError::conflict(
                    column,
                    format!("versioning column collides with {}", owner),
                ));
            }
        }
    }
    for column in &policy.pass_through {
        if let Some(owner) = owners.insert(column.clone(), "pass-through".to_string()) {
            return Err(MergeError::conflict(
                column,
                format!("pass-through column collides with {}", owner),
            ));
        }
    }
    for rule in &policy.rules {
        for output in rule.output_columns() {
            let owner = format!("{} output of '{}'", rule.scd_type, rule.source);
            if let Some(existing) = owners.insert(output.to_string(), owner) {
                return Err(MergeError::conflict(
                    &rule.source,
                    format!("output column '{}' collides with {}", output, existing),
                ));
            }
        }
    }
    Ok(())
}
