//! Common test utilities and helpers

use dbdiff::sql::TableRef;
use dbdiff::{DbdiffError, DiffEngine, DiffReport, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SCHEMA: &str = "dbdiff";

/// x_table: 8 rows, 9 columns. Unique on (join1, join2), not on join1.
const X_TABLE: &str = "
CREATE TABLE dbdiff.x_table (join1 VARCHAR(10), join2 VARCHAR(10), missingx INTEGER, missingx2 INTEGER, dtypemiss INTEGER, data1 INTEGER, data2 INTEGER, data3 DATE, data4 VARCHAR(10));
INSERT INTO dbdiff.x_table VALUES
    ('match1', 'matchdup21', 0, 0, 0, 0, 0, DATE '2017-10-11', ''),
    ('match1', 'match22', 0, 0, 0, 0, 0, DATE '2017-10-11', 'a'),
    ('match1', 'match23', 0, 0, 0, 1, 1, DATE '2017-10-11', ''),
    ('match1', 'missx21', NULL, NULL, NULL, NULL, NULL, NULL, ''),
    ('match1', 'missx22', NULL, NULL, NULL, NULL, NULL, NULL, ''),
    ('missx11', NULL, NULL, NULL, NULL, NULL, NULL, NULL, ''),
    ('missx12', NULL, NULL, NULL, NULL, NULL, NULL, NULL, ''),
    (NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, '');
";

/// y_table: 6 rows, 8 columns. (match1, matchdup21) appears twice.
fn y_table_sql(case_off: bool) -> String {
    let data4 = if case_off { "A" } else { "a" };
    format!(
        "
CREATE TABLE dbdiff.y_table (join1 VARCHAR(10), join2 VARCHAR(10), missingy INTEGER, dtypemiss DATE, data1 INTEGER, data2 INTEGER, data3 DATE, data4 VARCHAR(10));
INSERT INTO dbdiff.y_table VALUES
    ('match1', 'matchdup21', 0, DATE '2019-04-22', 0, 0, DATE '2017-10-11', ''),
    ('match1', 'matchdup21', 0, DATE '2019-04-22', 0, 0, DATE '2017-10-11', ''),
    ('match1', 'match22', 0, DATE '2019-04-22', 0, 1, DATE '2017-10-12', '{data4}'),
    ('match1', 'match23', 0, DATE '2019-04-22', 0, 0, DATE '2017-10-13', ''),
    ('match1', 'missy21', 0, DATE '2019-04-22', 0, 0, NULL, ''),
    ('missy11', NULL, 0, DATE '2019-04-22', 0, 0, NULL, '');
"
    )
}

/// Create the `dbdiff` schema with both test tables
pub fn load_test_data(engine: &DiffEngine, case_off: bool) -> Result<()> {
    engine.execute("CREATE SCHEMA IF NOT EXISTS dbdiff")?;
    engine.execute(X_TABLE)?;
    engine.execute(&y_table_sql(case_off))?;
    Ok(())
}

/// In-memory engine with the test tables loaded
pub fn test_engine() -> DiffEngine {
    let engine = DiffEngine::in_memory().expect("Should open in-memory DuckDB");
    load_test_data(&engine, false).expect("Should load test data");
    engine
}

pub fn x_table() -> TableRef {
    TableRef::new(SCHEMA, "x_table")
}

pub fn y_table() -> TableRef {
    TableRef::new(SCHEMA, "y_table")
}

pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Test fixture manager for creating temporary test environments
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Get the root path of the test fixture
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn database_path(&self) -> PathBuf {
        self.root().join("compare.duckdb")
    }

    /// Write the test tables into a fresh database file and close it
    pub fn create_database(&self, case_off: bool) -> Result<PathBuf> {
        let path = self.database_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let engine = DiffEngine::open(&dbdiff::config::EngineSettings::with_database(&path))?;
        load_test_data(&engine, case_off)?;
        Ok(path)
    }

    /// Open the fixture database, e.g. to inspect tables left behind by a run
    pub fn open_database(&self) -> Result<DiffEngine> {
        DiffEngine::open(&dbdiff::config::EngineSettings::with_database(self.database_path()))
    }

    /// Write a query file into the fixture directory
    pub fn create_query_file(&self, name: &str, query: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::write(&path, query)?;
        Ok(path)
    }
}

/// Helper for running CLI commands in tests
pub struct CliTestRunner {
    fixture: TestFixture,
}

impl CliTestRunner {
    /// Fixture with the test tables written to its database file
    pub fn new() -> Result<Self> {
        Self::with_data(false)
    }

    pub fn with_data(case_off: bool) -> Result<Self> {
        let fixture = TestFixture::new()?;
        fixture.create_database(case_off)?;
        Ok(Self { fixture })
    }

    pub fn fixture(&self) -> &TestFixture {
        &self.fixture
    }

    /// Run a dbdiff command against the fixture database and return the report
    pub fn run_command(&self, args: &[&str]) -> Result<DiffReport> {
        use clap::Parser;
        use dbdiff::cli::Cli;
        use dbdiff::commands::execute_command;

        let database = self.fixture.database_path();
        let output_dir = self.fixture.root().to_path_buf();
        let mut cmd_args: Vec<String> = vec!["dbdiff".to_string()];
        cmd_args.extend(args.iter().map(|s| s.to_string()));
        cmd_args.extend([
            "--database".to_string(),
            database.display().to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--quiet".to_string(),
        ]);

        let cli = Cli::try_parse_from(cmd_args).map_err(|e| DbdiffError::invalid_input(e.to_string()))?;
        execute_command(&cli)
    }

    /// Run a command and expect it to succeed
    pub fn expect_success(&self, args: &[&str]) -> DiffReport {
        self.run_command(args).expect("Command should succeed")
    }

    /// Run a command and expect it to fail
    pub fn expect_failure(&self, args: &[&str]) -> DbdiffError {
        self.run_command(args).expect_err("Command should fail")
    }
}

/// Assertion helpers for test validation
pub mod assertions {
    use dbdiff::Frame;
    use std::path::Path;

    /// Assert that a file exists and is not empty
    pub fn assert_file_exists_and_not_empty(path: &Path) {
        assert!(path.exists(), "File should exist: {}", path.display());
        let metadata = std::fs::metadata(path).expect("Should be able to read file metadata");
        assert!(metadata.len() > 0, "File should not be empty: {}", path.display());
    }

    pub fn assert_shape(frame: &Frame, rows: usize, columns: usize) {
        assert_eq!(
            frame.shape(),
            (rows, columns),
            "Unexpected frame shape for columns {:?}",
            frame.columns
        );
    }
}
