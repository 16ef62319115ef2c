//! End-to-end runs of the comparison pipeline on an in-memory database

use crate::common::{load_test_data, test_engine, x_table, y_table, SCHEMA};
use dbdiff::catalog;
use dbdiff::config::{DiffOptions, JoinStrategy, SummaryFormat, TableSource};
use dbdiff::progress::ProgressReporter;
use dbdiff::sql::{TableRef, TEMP_SCHEMA};
use dbdiff::{run_diff, DbdiffError, DiffEngine, DiffReport};
use serde_json::json;
use tempfile::TempDir;

fn options() -> DiffOptions {
    DiffOptions::new(x_table(), y_table(), &["join1", "join2"])
}

fn run(engine: &DiffEngine, options: &DiffOptions) -> DiffReport {
    let mut progress = ProgressReporter::new_minimal();
    run_diff(engine, options, &mut progress).expect("Diff should succeed")
}

fn assert_base_results(report: &DiffReport) {
    assert_eq!(report.dedup.x.count, 0);
    assert_eq!(report.dedup.y.count, 1);
    assert_eq!(report.y_table, TableRef::new(SCHEMA, "y_table_dedup"));

    assert_eq!(report.unmatched.x_only.count, 6);
    assert_eq!(report.unmatched.y_only.count, 2);
    assert_eq!(report.joined_count, 2);

    let names: Vec<&str> = report.column_diffs.iter().map(|c| c.column_name.as_str()).collect();
    assert_eq!(names, vec!["data2", "data3", "data1"]);
    assert_eq!(report.diff_summary.total_count, 5);
    assert_eq!(report.diff_summary.count, Some(2));
    assert_eq!(report.compared_column_count(), 4);
    assert_eq!(report.max_differences(), 2);
    assert_eq!(report.uncomparable_columns(), vec!["dtypemiss"]);
}

#[test]
fn test_default_run() {
    let engine = test_engine();
    let report = run(&engine, &options());

    assert_base_results(&report);
    assert_eq!(report.joined_table, TableRef::new(SCHEMA, "x_table_JOINED"));
    assert!(report.diff_table.is_none());
    assert!(report.hierarchical.is_none());
    assert!(catalog::table_exists(&engine, &report.joined_table).unwrap());
    assert!(catalog::table_exists(&engine, &TableRef::new(SCHEMA, "y_table_dup")).unwrap());

    let data2 = report.column_diffs[0].numeric.as_ref().unwrap();
    let deltas = data2.sorted.sample.column("diff").unwrap();
    assert!(deltas.contains(&&json!(1.0)));
    assert!(deltas.contains(&&json!(-1.0)));
}

#[test]
fn test_diff_table_mode_matches_joined_mode() {
    let engine = test_engine();
    let mut options = options();
    options.use_diff_table = true;
    let report = run(&engine, &options);

    assert_base_results(&report);
    assert_eq!(report.diff_table, Some(TableRef::new(SCHEMA, "x_table_DIFF")));
    let diff_table = report.diff_table.as_ref().unwrap();
    assert_eq!(engine.query_count(&dbdiff::sql::table_rows(diff_table)).unwrap(), 5);
}

#[test]
fn test_hierarchical_join() {
    let engine = test_engine();
    let mut options = options();
    options.hierarchical_join = true;
    let report = run(&engine, &options);

    let hierarchical = report.hierarchical.as_ref().unwrap();
    assert_eq!(hierarchical["join1"].x_only.count, 3);
    assert_eq!(hierarchical["join2"].x_only.count, 2);
    for column_diff in &report.column_diffs {
        assert!(column_diff.hier_x.is_some());
        assert!(column_diff.hier_y.is_some());
    }
}

#[test]
fn test_drop_output_tables() {
    let engine = test_engine();
    let mut options = options();
    options.drop_output_tables = true;
    options.use_diff_table = true;
    let report = run(&engine, &options);

    assert!(report.output_tables_dropped);
    assert!(!catalog::table_exists(&engine, &report.joined_table).unwrap());
    assert!(!catalog::table_exists(&engine, report.diff_table.as_ref().unwrap()).unwrap());
    // dedup tables went to temporary storage
    assert_eq!(report.y_table, TableRef::new(TEMP_SCHEMA, "dbdiff_y_table_dedup"));
    assert!(!catalog::table_exists(&engine, &TableRef::new(SCHEMA, "y_table_dedup")).unwrap());
}

#[test]
fn test_same_table_name_in_two_schemas_with_temp_dedup() {
    let engine = DiffEngine::in_memory().unwrap();
    engine
        .execute(
            "CREATE SCHEMA a; CREATE SCHEMA b;
             CREATE TABLE a.orders (id INTEGER, amount INTEGER);
             CREATE TABLE b.orders (id INTEGER, amount INTEGER);
             INSERT INTO a.orders VALUES (1, 10), (2, 20), (3, 30), (3, 31);
             INSERT INTO b.orders VALUES (1, 99), (2, 98), (4, 40), (4, 41);",
        )
        .unwrap();
    let mut options = DiffOptions::new(TableRef::new("a", "orders"), TableRef::new("b", "orders"), &["id"]);
    options.drop_output_tables = true;
    let report = run(&engine, &options);

    assert_eq!(report.x_table, TableRef::temp("a_orders_dedup"));
    assert_eq!(report.y_table, TableRef::temp("b_orders_dedup"));
    assert_eq!(report.dedup.x.count, 1);
    assert_eq!(report.dedup.y.count, 1);
    assert_eq!(report.joined_count, 2);
    assert_eq!(report.column_diffs.len(), 1);
    assert_eq!(report.column_diffs[0].column_name, "amount");
    assert_eq!(report.diff_summary.total_count, 2);
    assert_eq!(report.unmatched.x_only.count, 0);
    assert_eq!(report.unmatched.y_only.count, 0);
}

#[test]
fn test_same_table_name_in_two_schemas_with_kept_dedup() {
    let engine = DiffEngine::in_memory().unwrap();
    engine
        .execute(
            "CREATE SCHEMA a; CREATE SCHEMA b;
             CREATE TABLE a.orders (id INTEGER, amount INTEGER);
             CREATE TABLE b.orders (id INTEGER, amount INTEGER);
             INSERT INTO a.orders VALUES (1, 10), (2, 20), (2, 21);
             INSERT INTO b.orders VALUES (1, 11), (2, 20), (2, 22);",
        )
        .unwrap();
    let options = DiffOptions::new(TableRef::new("a", "orders"), TableRef::new("b", "orders"), &["id"]);
    let report = run(&engine, &options);

    assert_eq!(report.x_table, TableRef::new("a", "orders_dedup"));
    assert_eq!(report.y_table, TableRef::new("b", "orders_dedup"));
    assert_eq!(report.joined_count, 1);
    assert_eq!(report.diff_summary.total_count, 1);
}

#[test]
fn test_comparing_a_table_with_itself_after_dedup_is_rejected() {
    let engine = test_engine();
    let options = DiffOptions::new(y_table(), y_table(), &["join1", "join2"]);
    let mut progress = ProgressReporter::new_minimal();
    let err = run_diff(&engine, &options, &mut progress).unwrap_err();
    assert!(matches!(err, DbdiffError::InvalidInput { .. }));
}

#[test]
fn test_skip_row_total() {
    let engine = test_engine();
    let mut options = options();
    options.skip_row_total = true;
    let report = run(&engine, &options);
    assert_eq!(report.diff_summary.total_count, 5);
    assert!(report.diff_summary.count.is_none());
    assert!(report.diff_summary.sample.is_none());
}

#[test]
fn test_create_then_insert_strategy() {
    let engine = test_engine();
    let mut options = options();
    options.join_strategy = JoinStrategy::CreateInsert;
    let report = run(&engine, &options);
    assert_base_results(&report);
}

#[test]
fn test_output_schema_is_created() {
    let engine = test_engine();
    let mut options = options();
    options.output_schema = "diff_output".to_string();
    let report = run(&engine, &options);
    assert_eq!(report.joined_table, TableRef::new("diff_output", "x_table_JOINED"));
    assert!(catalog::table_exists(&engine, &report.joined_table).unwrap());
}

#[test]
fn test_case_insensitive() {
    let engine = DiffEngine::in_memory().unwrap();
    load_test_data(&engine, true).unwrap();
    let report = run(&engine, &options());
    assert!(report.column_diffs.iter().any(|c| c.column_name == "data4"));

    let engine = DiffEngine::in_memory().unwrap();
    load_test_data(&engine, true).unwrap();
    let mut options = options();
    options.case_insensitive = true;
    let report = run(&engine, &options);
    assert!(report.column_diffs.iter().all(|c| c.column_name != "data4"));
}

#[test]
fn test_query_file_sources() {
    let engine = test_engine();
    let temp_dir = TempDir::new().unwrap();
    let x_path = temp_dir.path().join("x_table_temp.sql");
    let y_path = temp_dir.path().join("y_table_temp.sql");
    std::fs::write(&x_path, "select * from dbdiff.x_table").unwrap();
    std::fs::write(&y_path, "-- y side\nselect * from dbdiff.y_table;\n").unwrap();

    let mut options = options();
    options.x = TableSource::QueryFile(x_path);
    options.y = TableSource::QueryFile(y_path);
    let report = run(&engine, &options);

    assert_eq!(report.x_source, TableRef::temp("x_table_temp"));
    assert_eq!(report.y_table, TableRef::temp("y_table_temp_dedup"));
    assert_eq!(report.joined_table, TableRef::new(SCHEMA, "x_table_temp_JOINED"));
    assert_eq!(report.diff_summary.total_count, 5);
}

#[test]
fn test_save_column_summary() {
    let engine = test_engine();
    let temp_dir = TempDir::new().unwrap();
    let mut options = options();
    options.save_column_summary = Some(SummaryFormat::Json);
    options.output_dir = temp_dir.path().join("reports");
    run(&engine, &options);

    let path = options.output_dir.join("x_table_col_info.json");
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(saved.as_array().map(|a| a.len()), Some(10));
}

#[test]
fn test_join_column_must_be_comparable() {
    let engine = test_engine();
    let options = DiffOptions::new(x_table(), y_table(), &["join1", "dtypemiss"]);
    let mut progress = ProgressReporter::new_minimal();
    let err = run_diff(&engine, &options, &mut progress).unwrap_err();
    assert!(matches!(err, DbdiffError::JoinColumnNotComparable { .. }));
}

#[test]
fn test_report_round_trips_through_json() {
    let engine = test_engine();
    let temp_dir = TempDir::new().unwrap();
    let report = run(&engine, &options());
    let path = report.save_json(temp_dir.path()).unwrap();

    let loaded: DiffReport = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(loaded.column_diffs, report.column_diffs);
    assert_eq!(loaded.unmatched, report.unmatched);
}
