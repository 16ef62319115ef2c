//! Command-line interface for dbdiff

use crate::config::{
    parse_column_list, DiffOptions, EngineSettings, JoinStrategy, SummaryFormat, TableSource,
    DEFAULT_MAX_ROWS_ALL, DEFAULT_MAX_ROWS_COLUMN,
};
use crate::error::{DbdiffError, Result};
use crate::sql::TableRef;
use clap::Parser;
use std::path::PathBuf;

/// Compare two tables X_TABLE and Y_TABLE, using DuckDB as the join engine.
///
/// Both tables are assumed to live in SCHEMA. They are joined on the columns in
/// the comma-separated JOIN_COLS. Join columns must have matching types or
/// convert implicitly, and every other column present in both tables is
/// compared after casting y to the type in X_TABLE.
///
/// Drops [X_TABLE]_JOINED (and [X_TABLE]_DIFF with --use-diff-table) if they exist.
#[derive(Parser, Debug)]
#[command(name = "dbdiff")]
#[command(version)]
pub struct Cli {
    /// Schema of X_TABLE (and of Y_TABLE unless --y-schema is given)
    pub schema: String,

    /// Table name, or a query file path with --x-table-query
    pub x_table: String,

    /// Table name, or a query file path with --y-table-query
    pub y_table: String,

    /// Comma-separated join columns, in hierarchy order
    pub join_cols: String,

    /// If the schema for the y_table is different, specify it
    #[arg(long)]
    pub y_schema: Option<String>,

    /// Schema for the joined and diff tables (defaults to SCHEMA)
    #[arg(long)]
    pub output_schema: Option<String>,

    /// Drop the joined and diff tables created and used here
    #[arg(long)]
    pub drop_output_tables: bool,

    /// X_TABLE is a file holding a query; it is materialized as a temp table named after the file
    #[arg(long)]
    pub x_table_query: bool,

    /// Y_TABLE is a file holding a query; it is materialized as a temp table named after the file
    #[arg(long)]
    pub y_table_query: bool,

    /// Comma-separated column names to exclude
    #[arg(long, default_value = "")]
    pub exclude_columns: String,

    /// Break out unmatched rows per join column, assuming each key refines the previous one
    #[arg(long)]
    pub hierarchical_join: bool,

    /// Limit of full rows to pull that have differences
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS_ALL)]
    pub max_rows_all: usize,

    /// Limit of grouped and raw column level differences to pull
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS_COLUMN)]
    pub max_rows_column: usize,

    /// Save the column dtype and match summary
    #[arg(long)]
    pub save_column_summary: bool,

    /// Column summary format: "csv" or "json"
    #[arg(long, default_value = "csv", value_parser = SummaryFormat::parse)]
    pub save_column_summary_format: SummaryFormat,

    /// Skip counting the total number of rows with differences, only count cells
    #[arg(long)]
    pub skip_row_total: bool,

    /// Use a diff table in the middle
    #[arg(long)]
    pub use_diff_table: bool,

    /// Compare strings ignoring case
    #[arg(long)]
    pub case_insensitive: bool,

    /// Save the full report as {X_TABLE}_diff_summary.json
    #[arg(long)]
    pub save_json_summary: bool,

    /// Create the joined table with explicit types, then insert into it
    #[arg(long)]
    pub create_then_insert: bool,

    /// DuckDB database file (in-memory when omitted)
    #[arg(long, env = "DBDIFF_DATABASE")]
    pub database: Option<PathBuf>,

    /// DuckDB memory limit, e.g. "4GB"
    #[arg(long, env = "DBDIFF_MEMORY_LIMIT")]
    pub memory_limit: Option<String>,

    /// DuckDB worker threads
    #[arg(long, env = "DBDIFF_THREADS")]
    pub threads: Option<usize>,

    /// Directory for saved summaries
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Output format: "pretty", "json"
    #[arg(long, default_value = "pretty", value_parser = OutputFormat::parse)]
    pub format: OutputFormat,

    /// Print only summary lines, no progress or tables
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            database: self.database.clone(),
            memory_limit: self.memory_limit.clone(),
            threads: self.threads,
        }
    }

    pub fn diff_options(&self) -> Result<DiffOptions> {
        let join_cols = parse_column_list(&self.join_cols);
        if join_cols.is_empty() {
            return Err(DbdiffError::invalid_input("JOIN_COLS must name at least one column"));
        }

        let y_schema = self.y_schema.clone().unwrap_or_else(|| self.schema.clone());
        let x = if self.x_table_query {
            TableSource::QueryFile(PathBuf::from(&self.x_table))
        } else {
            TableSource::Table(TableRef::new(self.schema.as_str(), self.x_table.as_str()))
        };
        let y = if self.y_table_query {
            TableSource::QueryFile(PathBuf::from(&self.y_table))
        } else {
            TableSource::Table(TableRef::new(y_schema, self.y_table.as_str()))
        };

        let options = DiffOptions {
            x,
            y,
            output_schema: self.output_schema.clone().unwrap_or_else(|| self.schema.clone()),
            join_cols,
            exclude_columns: parse_column_list(&self.exclude_columns).into_iter().collect(),
            hierarchical_join: self.hierarchical_join,
            max_rows_all: self.max_rows_all,
            max_rows_column: self.max_rows_column,
            skip_row_total: self.skip_row_total,
            use_diff_table: self.use_diff_table,
            drop_output_tables: self.drop_output_tables,
            case_insensitive: self.case_insensitive,
            join_strategy: if self.create_then_insert {
                JoinStrategy::CreateInsert
            } else {
                JoinStrategy::SelectInto
            },
            save_column_summary: self.save_column_summary.then_some(self.save_column_summary_format),
            output_dir: self.output_dir.clone(),
        };
        options.validate()?;
        Ok(options)
    }
}

/// How the finished report is written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
