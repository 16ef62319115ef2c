//! Error types for dbdiff operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbdiffError>;

#[derive(Error, Debug)]
pub enum DbdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("{table} has no columns.")]
    NoColumns { table: String },

    #[error("Column `{column}` not in comparable columns (missing from one, both, or bad dtype). Here is the info we do have about that col:\n{info}")]
    JoinColumnNotComparable { column: String, info: String },

    #[error("Query failed: {message}\n{sql}")]
    Query { message: String, sql: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbdiffError {
    pub fn no_columns(table: impl Into<String>) -> Self {
        Self::NoColumns {
            table: table.into(),
        }
    }

    pub fn join_column_not_comparable(column: impl Into<String>, info: impl Into<String>) -> Self {
        Self::JoinColumnNotComparable {
            column: column.into(),
            info: info.into(),
        }
    }

    pub fn query(error: duckdb::Error, sql: &str) -> Self {
        Self::Query {
            message: error.to_string(),
            sql: sql.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}
