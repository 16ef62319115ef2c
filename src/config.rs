//! Engine settings and diff options

use crate::error::{DbdiffError, Result};
use crate::sql::TableRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default number of full rows sampled from the differing rows
pub const DEFAULT_MAX_ROWS_ALL: usize = 10;

/// Default number of grouped and raw rows sampled per column
pub const DEFAULT_MAX_ROWS_COLUMN: usize = 10;

/// Upper bound on quantile buckets for numeric and date differences
pub const MAX_DIFF_TILES: u64 = 10;

/// DuckDB connection settings
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Database file; in-memory when absent
    pub database: Option<PathBuf>,
    /// Value for DuckDB's `memory_limit`, e.g. `4GB`
    pub memory_limit: Option<String>,
    pub threads: Option<usize>,
}

impl EngineSettings {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_database(database: impl Into<PathBuf>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = &self.memory_limit {
            let valid = limit
                .trim()
                .chars()
                .next()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
            if !valid {
                return Err(DbdiffError::config(format!(
                    "Invalid memory limit '{}'. Use a size such as '4GB'",
                    limit
                )));
            }
        }
        if self.threads == Some(0) {
            return Err(DbdiffError::config("Thread count must be greater than 0"));
        }
        Ok(())
    }
}

/// Where one side of the comparison comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Table(TableRef),
    /// A query stored in a file, materialized as a temporary table
    QueryFile(PathBuf),
}

/// How the joined table is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinStrategy {
    /// `CREATE TABLE ... AS SELECT`
    #[default]
    SelectInto,
    /// `CREATE TABLE` with explicit types, then `INSERT INTO ... SELECT`
    CreateInsert,
}

/// File format for the saved column match table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Csv,
    Json,
}

impl SummaryFormat {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid column summary format: {}. Use 'csv' or 'json'", s)),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SummaryFormat::Csv => "csv",
            SummaryFormat::Json => "json",
        }
    }
}

/// Everything one comparison run needs
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub x: TableSource,
    pub y: TableSource,
    /// Schema for the joined and diff tables
    pub output_schema: String,
    /// Lowercased join columns, in hierarchy order
    pub join_cols: Vec<String>,
    /// Lowercased column names left out of the comparison
    pub exclude_columns: BTreeSet<String>,
    pub hierarchical_join: bool,
    pub max_rows_all: usize,
    pub max_rows_column: usize,
    pub skip_row_total: bool,
    pub use_diff_table: bool,
    pub drop_output_tables: bool,
    pub case_insensitive: bool,
    pub join_strategy: JoinStrategy,
    /// Save the column match table into `output_dir` in this format
    pub save_column_summary: Option<SummaryFormat>,
    pub output_dir: PathBuf,
}

impl DiffOptions {
    /// Options comparing two tables with the defaults of the command line
    pub fn new(x: TableRef, y: TableRef, join_cols: &[&str]) -> Self {
        let output_schema = x.schema.clone();
        Self {
            x: TableSource::Table(x),
            y: TableSource::Table(y),
            output_schema,
            join_cols: join_cols.iter().map(|c| c.to_lowercase()).collect(),
            exclude_columns: BTreeSet::new(),
            hierarchical_join: false,
            max_rows_all: DEFAULT_MAX_ROWS_ALL,
            max_rows_column: DEFAULT_MAX_ROWS_COLUMN,
            skip_row_total: false,
            use_diff_table: false,
            drop_output_tables: false,
            case_insensitive: false,
            join_strategy: JoinStrategy::default(),
            save_column_summary: None,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.join_cols.is_empty() || self.join_cols.iter().any(|c| c.is_empty()) {
            return Err(DbdiffError::invalid_input("At least one non-empty join column is required"));
        }
        if let Some(col) = self.join_cols.iter().find(|c| self.exclude_columns.contains(*c)) {
            return Err(DbdiffError::invalid_input(format!(
                "Join column `{}` cannot also be excluded",
                col
            )));
        }
        if self.output_schema.trim().is_empty() {
            return Err(DbdiffError::invalid_input("Output schema cannot be empty"));
        }
        Ok(())
    }
}

/// Split a comma-separated column list, trimming and lowercasing each name
pub fn parse_column_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}
