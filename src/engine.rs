//! DuckDB connection wrapper that executes generated SQL

use crate::config::EngineSettings;
use crate::error::{DbdiffError, Result};
use crate::frame::Frame;
use duckdb::Connection;

/// Executes statements and fetches result sets, logging every query
pub struct DiffEngine {
    connection: Connection,
}

impl DiffEngine {
    /// Open the database described by `settings` and apply its tuning
    pub fn open(settings: &EngineSettings) -> Result<Self> {
        settings.validate()?;

        let connection = match &settings.database {
            Some(path) => {
                log::info!("Opening DuckDB database at {}", path.display());
                Connection::open(path)?
            }
            None => {
                log::info!("Opening in-memory DuckDB database");
                Connection::open_in_memory()?
            }
        };

        let engine = Self::from_connection(connection);
        engine.execute("SET enable_progress_bar=false")?;
        if let Some(limit) = &settings.memory_limit {
            engine.execute(&format!("SET memory_limit='{}'", limit.replace('\'', "")))?;
        }
        if let Some(threads) = settings.threads {
            engine.execute(&format!("SET threads={}", threads))?;
        }

        Ok(engine)
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(&EngineSettings::in_memory())
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Run one or more statements that return nothing of interest
    pub fn execute(&self, sql: &str) -> Result<()> {
        log::debug!("{}", sql);
        self.connection
            .execute_batch(sql)
            .map_err(|e| DbdiffError::query(e, sql))
    }

    /// Run a query whose first column of the first row is a count
    pub fn query_count(&self, sql: &str) -> Result<u64> {
        log::debug!("{}", sql);
        self.connection
            .prepare(sql)
            .and_then(|mut stmt| stmt.query_row([], |row| row.get::<_, u64>(0)))
            .map_err(|e| DbdiffError::query(e, sql))
    }

    /// Run a query and fetch the full result set
    pub fn query_frame(&self, sql: &str) -> Result<Frame> {
        log::debug!("{}", sql);
        let mut stmt = self
            .connection
            .prepare(sql)
            .map_err(|e| DbdiffError::query(e, sql))?;
        let mut rows = stmt.query([]).map_err(|e| DbdiffError::query(e, sql))?;
        Frame::from_rows(&mut rows).map_err(|e| DbdiffError::query(e, sql))
    }

    /// Make string comparisons ignore case for the rest of the session
    pub fn set_case_insensitive(&self) -> Result<()> {
        log::info!("Setting to case insensitive.");
        self.execute("SET default_collation='nocase'")
    }
}
