//! Tests for declaring and validating column policies

use chrono::NaiveDate;
use scd_merge::models::{ColumnPolicy, ColumnRule, NamingStrategy, Row, ScdType, Table, Value};
use scd_merge::{MergeConfig, MergeError, PolicyValidator, merge};

const POLICY_YAML: &str = r#"
durable_key: [customer]
columns:
  credit_score:
    - type: 0
    - type: 2
  segment:
    type: TYPE1
    rename: "latest_{name}"
  email:
    type: 3
    alternate_column: "previous_{name}"
  tier:
    type: 6
pass_through: [load_batch]
versioning:
  surrogate_key: customer_sk
  effective_from: valid_from
  effective_to: valid_to
  current_flag: current
  sentinel: 2999-12-31
"#;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn test_yaml_policy_resolves_output_columns() {
    let policy = ColumnPolicy::from_yaml(POLICY_YAML).unwrap();
    let validated = PolicyValidator::new().validate(&policy).unwrap();

    assert_eq!(
        validated.output_columns(),
        vec![
            "customer",
            "customer_sk",
            "valid_from",
            "valid_to",
            "current",
            "original_credit_score",
            "credit_score",
            "email",
            "previous_email",
            "latest_segment",
            "tier_historical",
            "tier_current",
            "load_batch",
        ]
    );
}

#[test]
fn test_yaml_policy_round_trip() {
    let policy = ColumnPolicy::from_yaml(POLICY_YAML).unwrap();
    let yaml = policy.to_yaml().unwrap();
    assert_eq!(ColumnPolicy::from_yaml(&yaml).unwrap(), policy);
}

#[test]
fn test_yaml_policy_drives_merge() {
    let policy = ColumnPolicy::from_yaml(POLICY_YAML).unwrap();
    let source = Table::default().with_row(
        Row::new()
            .with("customer", "C1")
            .with("credit_score", 700)
            .with("segment", "retail")
            .with("email", "a@example.com")
            .with("tier", "gold")
            .with("load_batch", 7),
    );

    let snapshot = merge(&source, &Table::default(), &policy, d(2022, 1, 31)).unwrap();
    let row = &snapshot.table.rows[0];
    assert_eq!(row.get("valid_to").as_date(), Some(d(2999, 12, 31)));
    assert_eq!(row.get("current"), &Value::Bool(true));
    assert!(!row.get("customer_sk").is_null());
    assert_eq!(row.get("latest_segment"), &Value::from("retail"));
    assert_eq!(row.get("previous_email"), &Value::Null);
    assert_eq!(row.get("tier_current"), &Value::from("gold"));
    assert_eq!(row.get("load_batch"), &Value::Int(7));
}

#[test]
fn test_custom_naming_strategy() {
    let naming = NamingStrategy {
        type0: "{name}_first".to_string(),
        type1: "{name}_now".to_string(),
        ..NamingStrategy::default()
    };
    let policy = ColumnPolicy::new(["id"])
        .declare("score", ScdType::Type0)
        .declare("score", ScdType::Type1)
        .with_naming(naming);

    let validated = PolicyValidator::new().validate(&policy).unwrap();
    assert_eq!(validated.output_columns(), vec!["id", "score_first", "score_now"]);
    assert!(!validated.is_versioned());
}

#[test]
fn test_rule_rename_overrides_naming_strategy() {
    let policy = ColumnPolicy::new(["id"])
        .declare_rule("score", ColumnRule::new(ScdType::Type1).renamed("score"));
    let validated = PolicyValidator::new().validate(&policy).unwrap();
    assert_eq!(validated.rules[0].output, "score");
}

#[test]
fn test_conflicting_rules_are_rejected() {
    let conflicts = [
        ColumnPolicy::new(["id"])
            .declare("score", ScdType::Type2)
            .declare("score", ScdType::Type6),
        ColumnPolicy::new(["id"])
            .declare("score", ScdType::Type0)
            .declare("score", ScdType::Type3),
        ColumnPolicy::new(["id"])
            .declare("score", ScdType::Type1)
            .declare("score", ScdType::Type6),
        ColumnPolicy::new(["id"])
            .declare("score", ScdType::Type1)
            .declare("score", ScdType::Type1),
        ColumnPolicy::new(["id"]).declare("id", ScdType::Type1),
        ColumnPolicy::new(["id"])
            .declare("score", ScdType::Type1)
            .pass_through("score"),
    ];
    for policy in &conflicts {
        let err = PolicyValidator::new().validate(policy).unwrap_err();
        assert_eq!(err.code(), "PolicyConflict", "{:?}", policy.columns);
    }
}

#[test]
fn test_output_name_collision_is_rejected() {
    let policy = ColumnPolicy::new(["id"])
        .declare("score", ScdType::Type1)
        .declare_rule("rank", ColumnRule::new(ScdType::Type1).renamed("current_score"));
    let err = PolicyValidator::new().validate(&policy).unwrap_err();
    assert!(matches!(err, MergeError::PolicyConflict { .. }));
}

#[test]
fn test_versioning_column_collision_is_rejected() {
    let policy = ColumnPolicy::new(["id"])
        .declare("score", ScdType::Type2)
        .declare_rule("flag", ColumnRule::new(ScdType::Type1).renamed("is_current"));
    let err = PolicyValidator::new().validate(&policy).unwrap_err();
    assert!(matches!(err, MergeError::PolicyConflict { .. }));
}

#[test]
fn test_empty_durable_key_is_rejected() {
    let policy = ColumnPolicy::default().declare("score", ScdType::Type1);
    let err = PolicyValidator::new().validate(&policy).unwrap_err();
    assert_eq!(err.code(), "InvalidPolicyParams");
}

#[test]
fn test_config_file_policy_matches_yaml_policy() {
    let toml = r#"
[policy]
durable_key = ["customer"]
pass_through = ["load_batch"]

[policy.columns]
credit_score = [{ type = 0 }, { type = 2 }]
segment = { type = "TYPE1", rename = "latest_{name}" }
email = { type = 3, alternate_column = "previous_{name}" }
tier = { type = 6 }

[policy.versioning]
surrogate_key = "customer_sk"
effective_from = "valid_from"
effective_to = "valid_to"
current_flag = "current"
sentinel = "2999-12-31"
"#;
    let config = MergeConfig::parse(toml).unwrap();
    assert_eq!(config.policy, ColumnPolicy::from_yaml(POLICY_YAML).unwrap());
}
