//! Tests for merging source batches into dimension snapshots, one SCD type at a time

use chrono::NaiveDate;
use scd_merge::models::{
    ColumnPolicy, ColumnRule, KeyStatus, Row, RuleParams, ScdType, Table, Value,
};
use scd_merge::{DurableKey, MergeError, TableRole, check_history, merge};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn merge_date() -> NaiveDate {
    d(2022, 1, 31)
}

fn source(scores: &[(&str, i64)]) -> Table {
    let mut table = Table::with_columns(&["customer", "credit_score"]);
    for (customer, score) in scores {
        table.push(
            Row::new()
                .with("customer", *customer)
                .with("credit_score", *score),
        );
    }
    table
}

fn version(customer: &str, from: NaiveDate, to: NaiveDate, current: bool) -> Row {
    Row::new()
        .with("customer", customer)
        .with("effective_from", from)
        .with("effective_to", to)
        .with("is_current", current)
}

fn open_version(customer: &str) -> Row {
    version(customer, d(2022, 1, 1), d(9999, 12, 31), true)
}

fn key(customer: &str) -> DurableKey {
    DurableKey(vec![Value::from(customer)])
}

fn cells(row: &Row, columns: &[&str]) -> Vec<Value> {
    columns.iter().map(|c| row.get(c).clone()).collect()
}

#[test]
fn test_type0_retains_original_value() {
    let target = Table::default()
        .with_row(Row::new().with("customer", "C00000001").with("original_credit_score", 630))
        .with_row(Row::new().with("customer", "C00000002").with("original_credit_score", 520));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type0);

    let snapshot = merge(
        &source(&[("C00000001", 730), ("C00000002", 480)]),
        &target,
        &policy,
        merge_date(),
    )
    .unwrap();

    assert_eq!(snapshot.table.columns, vec!["customer", "original_credit_score"]);
    let scores: Vec<&Value> = snapshot
        .table
        .rows
        .iter()
        .map(|r| r.get("original_credit_score"))
        .collect();
    assert_eq!(scores, vec![&Value::Int(630), &Value::Int(520)]);
    assert_eq!(snapshot.report.unchanged_keys, 2);
}

#[test]
fn test_type1_overwrites_value() {
    let target = Table::default()
        .with_row(Row::new().with("customer", "C00000001").with("current_credit_score", 630))
        .with_row(Row::new().with("customer", "C00000002").with("current_credit_score", 520));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type1);

    let snapshot = merge(
        &source(&[("C00000001", 730), ("C00000002", 480)]),
        &target,
        &policy,
        merge_date(),
    )
    .unwrap();

    assert_eq!(snapshot.table.len(), 2);
    assert_eq!(
        snapshot.table.rows[0].get("current_credit_score"),
        &Value::Int(730)
    );
    assert_eq!(
        snapshot.table.rows[1].get("current_credit_score"),
        &Value::Int(480)
    );
    assert_eq!(snapshot.report.changed_keys, 2);
    assert_eq!(snapshot.report.versions_opened, 0);
}

#[test]
fn test_type2_closes_and_appends_version() {
    let target = Table::default().with_row(open_version("C1").with("credit_score", 630));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    let columns = [
        "customer",
        "effective_from",
        "effective_to",
        "is_current",
        "credit_score",
    ];
    assert_eq!(snapshot.table.len(), 2);
    assert_eq!(
        cells(&snapshot.table.rows[0], &columns),
        vec![
            Value::from("C1"),
            Value::from(d(2022, 1, 1)),
            Value::from(d(2022, 1, 30)),
            Value::Bool(false),
            Value::Int(630),
        ]
    );
    assert_eq!(
        cells(&snapshot.table.rows[1], &columns),
        vec![
            Value::from("C1"),
            Value::from(d(2022, 1, 31)),
            Value::from(d(9999, 12, 31)),
            Value::Bool(true),
            Value::Int(730),
        ]
    );
    assert!(!snapshot.table.rows[1].get("surrogate_key").is_null());
    assert_eq!(snapshot.report.versions_closed, 1);
    assert_eq!(snapshot.report.versions_opened, 1);
    assert_eq!(snapshot.report.status_of(&key("C1")), Some(KeyStatus::Changed));
}

#[test]
fn test_type2_new_member_gets_open_version() {
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    let snapshot =
        merge(&source(&[("C2", 480)]), &Table::default(), &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.len(), 1);
    let row = &snapshot.table.rows[0];
    assert_eq!(row.get("effective_from").as_date(), Some(merge_date()));
    assert_eq!(row.get("effective_to").as_date(), Some(d(9999, 12, 31)));
    assert_eq!(row.get("is_current"), &Value::Bool(true));
    assert_eq!(row.get("credit_score"), &Value::Int(480));
    assert_eq!(snapshot.report.status_of(&key("C2")), Some(KeyStatus::New));
}

#[test]
fn test_type2_unchanged_member_is_untouched() {
    let target = Table::default().with_row(
        open_version("C1")
            .with("surrogate_key", "sk-1")
            .with("credit_score", 630),
    );
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    let snapshot = merge(&source(&[("C1", 630)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.rows, target.rows);
    assert_eq!(snapshot.report.unchanged_keys, 1);
    assert_eq!(snapshot.report.surrogate_keys_allocated, 0);
}

#[test]
fn test_type2_exclusive_interval_end() {
    let mut policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);
    policy.versioning.interval_end = scd_merge::IntervalEnd::Exclusive;
    let target = Table::default().with_row(open_version("C1").with("credit_score", 630));

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(
        snapshot.table.rows[0].get("effective_to").as_date(),
        Some(merge_date())
    );
    assert_eq!(
        snapshot.table.rows[1].get("effective_from").as_date(),
        Some(merge_date())
    );
}

#[test]
fn test_type3_moves_prior_value_to_alternate() {
    let target = Table::default()
        .with_row(
            Row::new()
                .with("customer", "C00000001")
                .with("credit_score", 630)
                .with("credit_score_alternate", Value::Null),
        )
        .with_row(
            Row::new()
                .with("customer", "C00000002")
                .with("credit_score", 520)
                .with("credit_score_alternate", Value::Null),
        );
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type3);

    let snapshot = merge(
        &source(&[("C00000001", 730), ("C00000002", 480)]),
        &target,
        &policy,
        merge_date(),
    )
    .unwrap();

    let columns = ["customer", "credit_score", "credit_score_alternate"];
    assert_eq!(
        cells(&snapshot.table.rows[0], &columns),
        vec![Value::from("C00000001"), Value::Int(730), Value::Int(630)]
    );
    assert_eq!(
        cells(&snapshot.table.rows[1], &columns),
        vec![Value::from("C00000002"), Value::Int(480), Value::Int(520)]
    );
}

#[test]
fn test_type3_per_rule_cascade_override() {
    let target = Table::default().with_row(
        Row::new()
            .with("customer", "C1")
            .with("credit_score", 730)
            .with("previous_score", 630),
    );
    let policy = ColumnPolicy::new(["customer"]).declare_rule(
        "credit_score",
        ColumnRule::new(ScdType::Type3).with_params(RuleParams {
            alternate_column: Some("previous_score".to_string()),
            type3_mode: Some(scd_merge::Type3Mode::Cascade),
            current_column: None,
        }),
    );

    let snapshot = merge(&source(&[("C1", 800)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.rows[0].get("credit_score"), &Value::Int(800));
    assert_eq!(snapshot.table.rows[0].get("previous_score"), &Value::Int(730));
}

#[test]
fn test_type6_rewrites_current_shadow_on_all_versions() {
    let target = Table::default()
        .with_row(
            open_version("C00000001")
                .with("credit_score_current", 630)
                .with("credit_score_historical", 630),
        )
        .with_row(
            open_version("C00000002")
                .with("credit_score_current", 520)
                .with("credit_score_historical", 520),
        );
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type6);

    let snapshot = merge(
        &source(&[("C00000001", 730), ("C00000002", 480)]),
        &target,
        &policy,
        merge_date(),
    )
    .unwrap();

    let columns = [
        "customer",
        "effective_to",
        "is_current",
        "credit_score_current",
        "credit_score_historical",
    ];
    let rows: Vec<Vec<Value>> = snapshot
        .table
        .rows
        .iter()
        .map(|r| cells(r, &columns))
        .collect();
    assert_eq!(
        rows,
        vec![
            vec![
                Value::from("C00000001"),
                Value::from(d(2022, 1, 30)),
                Value::Bool(false),
                Value::Int(730),
                Value::Int(630),
            ],
            vec![
                Value::from("C00000001"),
                Value::from(d(9999, 12, 31)),
                Value::Bool(true),
                Value::Int(730),
                Value::Int(730),
            ],
            vec![
                Value::from("C00000002"),
                Value::from(d(2022, 1, 30)),
                Value::Bool(false),
                Value::Int(480),
                Value::Int(520),
            ],
            vec![
                Value::from("C00000002"),
                Value::from(d(9999, 12, 31)),
                Value::Bool(true),
                Value::Int(480),
                Value::Int(480),
            ],
        ]
    );
}

#[test]
fn test_type7_backfills_surrogate_keys_and_exposes_both_views() {
    let target = Table::default()
        .with_row(
            version("C1", d(2021, 1, 1), d(2021, 12, 31), false).with("credit_score", 600),
        )
        .with_row(open_version("C1").with("credit_score", 630))
        .with_row(open_version("C2").with("credit_score", 520));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type7);

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.len(), 4);
    for row in &snapshot.table.rows {
        assert!(!row.get("customer").is_null());
        assert!(!row.get("surrogate_key").is_null());
    }
    assert_eq!(snapshot.report.surrogate_keys_allocated, 4);

    let current = snapshot.current_view();
    assert_eq!(current.len(), 2);
    assert_eq!(
        snapshot.current_row(&key("C1")).map(|r| r.get("credit_score").clone()),
        Some(Value::Int(730))
    );

    let first_version = snapshot.table.rows[0].get("surrogate_key").clone();
    assert_eq!(
        snapshot.version(&first_version).map(|r| r.get("credit_score").clone()),
        Some(Value::Int(600))
    );
    assert_eq!(snapshot.history_view().len(), 4);
}

#[test]
fn test_mixed_policy_combines_key_and_version_level_columns() {
    let target = Table::default().with_row(
        open_version("C1")
            .with("surrogate_key", "sk-1")
            .with("original_credit_score", 600)
            .with("credit_score", 630)
            .with("current_segment", "retail")
            .with("load_batch", 1),
    );
    let policy = ColumnPolicy::new(["customer"])
        .declare("credit_score", ScdType::Type0)
        .declare("credit_score", ScdType::Type2)
        .declare("segment", ScdType::Type1)
        .pass_through("load_batch");
    let source = Table::default().with_row(
        Row::new()
            .with("customer", "C1")
            .with("credit_score", 730)
            .with("segment", "wholesale")
            .with("load_batch", 2),
    );

    let snapshot = merge(&source, &target, &policy, merge_date()).unwrap();
    let (closed, current) = (&snapshot.table.rows[0], &snapshot.table.rows[1]);

    assert_eq!(closed.get("credit_score"), &Value::Int(630));
    assert_eq!(closed.get("current_segment"), &Value::from("wholesale"));
    assert_eq!(closed.get("load_batch"), &Value::Int(1));
    assert_eq!(closed.get("surrogate_key"), &Value::from("sk-1"));

    assert_eq!(current.get("original_credit_score"), &Value::Int(600));
    assert_eq!(current.get("credit_score"), &Value::Int(730));
    assert_eq!(current.get("current_segment"), &Value::from("wholesale"));
    assert_eq!(current.get("load_batch"), &Value::Int(2));
}

#[test]
fn test_member_with_only_closed_history_is_new() {
    let target = Table::default().with_row(
        version("C1", d(2021, 1, 1), d(2021, 12, 31), false)
            .with("original_credit_score", 500)
            .with("credit_score", 600),
    );
    let policy = ColumnPolicy::new(["customer"])
        .declare("credit_score", ScdType::Type0)
        .declare("credit_score", ScdType::Type2);

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.report.status_of(&key("C1")), Some(KeyStatus::New));
    assert_eq!(snapshot.table.len(), 2);
    let reopened = &snapshot.table.rows[1];
    assert_eq!(reopened.get("is_current"), &Value::Bool(true));
    assert_eq!(reopened.get("original_credit_score"), &Value::Int(500));
    assert_eq!(reopened.get("credit_score"), &Value::Int(730));
}

#[test]
fn test_reopening_inside_closed_history_fails() {
    let target = Table::default()
        .with_row(version("C1", d(2022, 1, 1), d(2022, 3, 31), false).with("credit_score", 600));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    for merge_timestamp in [d(2022, 2, 1), d(2022, 3, 31)] {
        let err = merge(&source(&[("C1", 730)]), &target, &policy, merge_timestamp).unwrap_err();
        assert_eq!(
            err,
            MergeError::MergeTimestampWithinHistory {
                key: "(C1)".to_string(),
                closed_to: d(2022, 3, 31),
                merge_timestamp,
            }
        );
    }

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, d(2022, 4, 1)).unwrap();
    assert_eq!(snapshot.table.len(), 2);
    assert!(check_history(&snapshot.table, &policy.durable_key, &policy.versioning).is_empty());
}

#[test]
fn test_exclusive_history_reopens_on_its_end_date() {
    let mut policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);
    policy.versioning.interval_end = scd_merge::IntervalEnd::Exclusive;
    let target = Table::default()
        .with_row(version("C1", d(2022, 1, 1), d(2022, 3, 31), false).with("credit_score", 600));

    let err = merge(&source(&[("C1", 730)]), &target, &policy, d(2022, 3, 30)).unwrap_err();
    assert_eq!(err.code(), "MergeTimestampWithinHistory");

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, d(2022, 3, 31)).unwrap();
    assert_eq!(
        snapshot.table.rows[1].get("effective_from").as_date(),
        Some(d(2022, 3, 31))
    );
}

#[test]
fn test_closed_history_keeps_type1_value_missing_from_source() {
    let target = Table::default().with_row(
        version("C1", d(2021, 1, 1), d(2021, 12, 31), false)
            .with("credit_score", 600)
            .with("current_segment", "retail"),
    );
    let policy = ColumnPolicy::new(["customer"])
        .declare("credit_score", ScdType::Type2)
        .declare("segment", ScdType::Type1);

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.len(), 2);
    for row in &snapshot.table.rows {
        assert_eq!(row.get("current_segment"), &Value::from("retail"));
    }
    assert_eq!(snapshot.table.rows[1].get("credit_score"), &Value::Int(730));
}

#[test]
fn test_target_only_members_are_carried_through() {
    let target = Table::default()
        .with_row(open_version("C1").with("surrogate_key", "a").with("credit_score", 630))
        .with_row(open_version("C9").with("surrogate_key", "b").with("credit_score", 100));
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    let snapshot = merge(&source(&[("C1", 630)]), &target, &policy, merge_date()).unwrap();

    assert_eq!(snapshot.table.rows, target.rows);
    assert_eq!(snapshot.report.carried_keys, 1);
    assert_eq!(snapshot.report.status_of(&key("C9")), None);
}

#[test]
fn test_declared_column_missing_from_source_keeps_target_value() {
    let target = Table::default().with_row(
        Row::new()
            .with("customer", "C1")
            .with("current_credit_score", 630)
            .with("current_segment", "retail"),
    );
    let policy = ColumnPolicy::new(["customer"])
        .declare("credit_score", ScdType::Type1)
        .declare("segment", ScdType::Type1);

    let snapshot = merge(&source(&[("C1", 730)]), &target, &policy, merge_date()).unwrap();

    let row = &snapshot.table.rows[0];
    assert_eq!(row.get("current_credit_score"), &Value::Int(730));
    assert_eq!(row.get("current_segment"), &Value::from("retail"));
}

#[test]
fn test_composite_durable_key() {
    let policy = ColumnPolicy::new(["region", "customer"]).declare("credit_score", ScdType::Type1);
    let source = Table::default()
        .with_row(
            Row::new()
                .with("region", "EU")
                .with("customer", "C1")
                .with("credit_score", 1),
        )
        .with_row(
            Row::new()
                .with("region", "US")
                .with("customer", "C1")
                .with("credit_score", 2),
        );

    let snapshot = merge(&source, &Table::default(), &policy, merge_date()).unwrap();
    assert_eq!(snapshot.table.len(), 2);
    assert_eq!(snapshot.report.new_keys, 2);
}

#[test]
fn test_errors_abort_before_output() {
    let policy = ColumnPolicy::new(["customer"]).declare("credit_score", ScdType::Type2);

    let err = merge(
        &source(&[("C1", 1), ("C1", 2)]),
        &Table::default(),
        &policy,
        merge_date(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        MergeError::DuplicateSourceKey {
            key: "(C1)".to_string(),
            count: 2
        }
    );

    let undeclared =
        source(&[("C1", 1)]).with_row(Row::new().with("customer", "C2").with("segment", "x"));
    let err = merge(&undeclared, &Table::default(), &policy, merge_date()).unwrap_err();
    assert_eq!(
        err,
        MergeError::UnknownColumnPolicy {
            column: "segment".to_string()
        }
    );

    let target = Table::default()
        .with_row(open_version("C1").with("credit_score", 1))
        .with_row(open_version("C1").with("credit_score", 2));
    let err = merge(&source(&[("C1", 3)]), &target, &policy, merge_date()).unwrap_err();
    assert_eq!(err.code(), "DuplicateCurrentRow");

    let target =
        Table::default().with_row(Row::new().with("customer", "C1").with("credit_score", 1));
    let err = merge(&source(&[("C1", 3)]), &target, &policy, merge_date()).unwrap_err();
    assert_eq!(
        err,
        MergeError::MissingColumn {
            table: TableRole::Target,
            column: "effective_from".to_string()
        }
    );
}
