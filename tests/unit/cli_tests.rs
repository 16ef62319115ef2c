//! Unit tests for CLI argument parsing and validation

use clap::Parser;
use dbdiff::cli::Cli;
use dbdiff::config::{JoinStrategy, SummaryFormat, TableSource};
use dbdiff::sql::TableRef;
use std::path::PathBuf;

#[test]
fn test_cli_positional_arguments() {
    let cli = Cli::try_parse_from(["dbdiff", "dbdiff", "x_table", "y_table", "join1,join2"]).unwrap();
    assert_eq!(cli.schema, "dbdiff");
    assert_eq!(cli.x_table, "x_table");
    assert_eq!(cli.y_table, "y_table");
    assert_eq!(cli.join_cols, "join1,join2");
    assert!(!cli.verbose);
    assert!(!cli.quiet);
}

#[test]
fn test_cli_missing_join_cols_fails() {
    let result = Cli::try_parse_from(["dbdiff", "dbdiff", "x_table", "y_table"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_row_limits() {
    let cli = Cli::try_parse_from([
        "dbdiff",
        "s",
        "x",
        "y",
        "id",
        "--max-rows-all",
        "25",
        "--max-rows-column",
        "5",
    ])
    .unwrap();
    let options = cli.diff_options().unwrap();
    assert_eq!(options.max_rows_all, 25);
    assert_eq!(options.max_rows_column, 5);
}

#[test]
fn test_cli_invalid_row_limit() {
    let result = Cli::try_parse_from(["dbdiff", "s", "x", "y", "id", "--max-rows-all", "-1"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_mode_flags() {
    let cli = Cli::try_parse_from([
        "dbdiff",
        "s",
        "x",
        "y",
        "id",
        "--use-diff-table",
        "--hierarchical-join",
        "--skip-row-total",
        "--drop-output-tables",
        "--case-insensitive",
    ])
    .unwrap();
    let options = cli.diff_options().unwrap();
    assert!(options.use_diff_table);
    assert!(options.hierarchical_join);
    assert!(options.skip_row_total);
    assert!(options.drop_output_tables);
    assert!(options.case_insensitive);
    assert_eq!(options.join_strategy, JoinStrategy::SelectInto);
}

#[test]
fn test_cli_query_files() {
    let cli = Cli::try_parse_from([
        "dbdiff",
        "dbdiff",
        "x_table_temp.sql",
        "y_table_temp.sql",
        "join1,join2",
        "--x-table-query",
        "--y-table-query",
    ])
    .unwrap();
    let options = cli.diff_options().unwrap();
    assert_eq!(options.x, TableSource::QueryFile(PathBuf::from("x_table_temp.sql")));
    assert_eq!(options.y, TableSource::QueryFile(PathBuf::from("y_table_temp.sql")));
    // output tables still go to the positional schema
    assert_eq!(options.output_schema, "dbdiff");
}

#[test]
fn test_cli_y_schema_only_affects_y() {
    let cli = Cli::try_parse_from(["dbdiff", "a", "x", "y", "id", "--y-schema", "b"]).unwrap();
    let options = cli.diff_options().unwrap();
    assert_eq!(options.x, TableSource::Table(TableRef::new("a", "x")));
    assert_eq!(options.y, TableSource::Table(TableRef::new("b", "y")));
    assert_eq!(options.output_schema, "a");
}

#[test]
fn test_cli_column_summary_format() {
    let cli = Cli::try_parse_from(["dbdiff", "s", "x", "y", "id", "--save-column-summary"]).unwrap();
    assert_eq!(cli.diff_options().unwrap().save_column_summary, Some(SummaryFormat::Csv));

    // The format alone does not turn saving on
    let cli = Cli::try_parse_from(["dbdiff", "s", "x", "y", "id", "--save-column-summary-format", "json"]).unwrap();
    assert_eq!(cli.save_column_summary_format, SummaryFormat::Json);
    assert!(cli.diff_options().unwrap().save_column_summary.is_none());
}

#[test]
fn test_cli_engine_settings() {
    let cli = Cli::try_parse_from([
        "dbdiff",
        "s",
        "x",
        "y",
        "id",
        "--database",
        "warehouse.duckdb",
        "--memory-limit",
        "2GB",
        "--threads",
        "4",
    ])
    .unwrap();
    let settings = cli.engine_settings();
    assert_eq!(settings.database, Some(PathBuf::from("warehouse.duckdb")));
    assert_eq!(settings.memory_limit.as_deref(), Some("2GB"));
    assert_eq!(settings.threads, Some(4));
}

#[test]
fn test_cli_empty_join_cols_rejected() {
    let cli = Cli::try_parse_from(["dbdiff", "s", "x", "y", " , "]).unwrap();
    assert!(cli.diff_options().is_err());
}
