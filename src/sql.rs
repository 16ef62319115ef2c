//! SQL statement builders and query file handling
//!
//! Every function here is pure: it renders DuckDB SQL text from table
//! references and column names. Execution lives in [`crate::engine`].
//! Sample queries are rendered without a `LIMIT`; callers append one with
//! [`with_limit`] so the stored query returns the full result.

use crate::error::{DbdiffError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Schema that temporary tables are addressed through.
pub const TEMP_SCHEMA: &str = "temp";

/// Suffix of the table holding the inner join of both sides.
pub const JOINED_SUFFIX: &str = "_JOINED";

/// Suffix of the long-format table with one row per differing cell.
pub const DIFF_SUFFIX: &str = "_DIFF";

/// A schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn temp(table: impl Into<String>) -> Self {
        Self::new(TEMP_SCHEMA, table)
    }

    pub fn is_temp(&self) -> bool {
        self.schema.eq_ignore_ascii_case(TEMP_SCHEMA)
    }

    /// Quoted `"schema"."table"` form for use inside SQL
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Same table name with a suffix, placed in `schema`
    pub fn derived(&self, schema: &str, suffix: &str) -> TableRef {
        TableRef::new(schema, format!("{}{}", self.table, suffix))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A column present on both sides, with the type each side declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedColumn {
    pub name: String,
    pub x_dtype: String,
    pub y_dtype: String,
}

impl TypedColumn {
    pub fn new(name: impl Into<String>, x_dtype: impl Into<String>, y_dtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x_dtype: x_dtype.into(),
            y_dtype: y_dtype.into(),
        }
    }

    fn same_type(&self) -> bool {
        self.x_dtype.eq_ignore_ascii_case(&self.y_dtype)
    }
}

/// How the difference between two cells is measured for binning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    Numeric,
    /// Whole days between two dates
    Date,
}

impl DeltaKind {
    fn expr(self, x: &str, y: &str) -> String {
        match self {
            DeltaKind::Numeric => format!("(CAST({y} AS DOUBLE) - CAST({x} AS DOUBLE))"),
            DeltaKind::Date => format!("date_diff('day', {x}, {y})"),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of the x-side copy of `column` in the joined table
pub fn x_col(column: &str) -> String {
    format!("{column}_x")
}

/// Name of the y-side copy of `column` in the joined table
pub fn y_col(column: &str) -> String {
    format!("{column}_y")
}

pub fn with_limit(query: &str, limit: usize) -> String {
    format!("{query} LIMIT {limit}")
}

fn column_list(cols: &[String]) -> String {
    cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn aliased_column_list(alias: &str, cols: &[String]) -> String {
    cols.iter()
        .map(|c| format!("{alias}.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn positions(n: usize) -> String {
    (1..=n).map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// Null-safe equality of `cols` between two aliases
fn key_match(left: &str, right: &str, cols: &[String]) -> String {
    if cols.is_empty() {
        return "TRUE".to_string();
    }
    cols.iter()
        .map(|c| {
            let c = quote_ident(c);
            format!("{left}.{c} IS NOT DISTINCT FROM {right}.{c}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn cells_differ(alias: &str, column: &str) -> String {
    format!(
        "{alias}.{} IS DISTINCT FROM {alias}.{}",
        quote_ident(&x_col(column)),
        quote_ident(&y_col(column))
    )
}

fn cells_present(alias: &str, column: &str) -> String {
    format!(
        "{alias}.{} IS NOT NULL AND {alias}.{} IS NOT NULL",
        quote_ident(&x_col(column)),
        quote_ident(&y_col(column))
    )
}

// ---------------------------------------------------------------------------
// Table-level statements
// ---------------------------------------------------------------------------

pub fn table_rows(table: &TableRef) -> String {
    format!("SELECT COUNT(*) AS count FROM {}", table.qualified())
}

/// Count of distinct key tuples; NULL keys group together
pub fn table_rows_uniq(table: &TableRef, cols: &[String]) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM (SELECT DISTINCT {} FROM {}) AS uniq",
        column_list(cols),
        table.qualified()
    )
}

pub fn table_drop(table: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {}", table.qualified())
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// Matches the schema against both the schema and the catalog name so
/// temporary tables (catalog `temp`, schema `main`) resolve too.
pub fn table_exists(table: &TableRef) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM duckdb_tables() \
         WHERE lower(table_name) = lower({table}) \
         AND (lower(schema_name) = lower({schema}) OR lower(database_name) = lower({schema}))",
        table = quote_literal(&table.table),
        schema = quote_literal(&table.schema),
    )
}

pub fn table_columns(table: &TableRef) -> String {
    format!("DESCRIBE SELECT * FROM {}", table.qualified())
}

pub fn create_temp_table(table_name: &str, query: &str) -> String {
    format!("CREATE OR REPLACE TEMP TABLE {} AS {}", quote_ident(table_name), query)
}

pub fn create_table_as(table: &TableRef, query: &str) -> String {
    format!("CREATE TABLE {} AS {}", table.qualified(), query)
}

/// `CREATE ... AS query`, as a temporary table when `table` lives in [`TEMP_SCHEMA`]
pub fn materialize(table: &TableRef, query: &str) -> String {
    if table.is_temp() {
        create_temp_table(&table.table, query)
    } else {
        create_table_as(table, query)
    }
}

/// Rows whose key tuple occurs exactly once
pub fn dedup_select(table: &TableRef, cols: &[String]) -> String {
    let t = table.qualified();
    let group = column_list(cols);
    format!(
        "SELECT x.* FROM {t} AS x \
         JOIN (SELECT {group} FROM {t} GROUP BY {group} HAVING COUNT(*) = 1) AS y \
         ON {}",
        key_match("x", "y", cols)
    )
}

/// Rows whose key tuple occurs more than once, with the size of their group
pub fn dup_select(table: &TableRef, cols: &[String]) -> String {
    let t = table.qualified();
    let group = column_list(cols);
    format!(
        "SELECT x.*, y.dup_count FROM {t} AS x \
         JOIN (SELECT {group}, COUNT(*) AS dup_count FROM {t} GROUP BY {group} HAVING COUNT(*) > 1) AS y \
         ON {}",
        key_match("x", "y", cols)
    )
}

// ---------------------------------------------------------------------------
// Joined table
// ---------------------------------------------------------------------------

/// Inner join of both sides on null-safe key equality.
///
/// Key columns come from x. Every compare column `c` appears as `c_x` and
/// `c_y`; the y copy is cast to x's type when the declared types differ.
pub fn joined_select(
    x: &TableRef,
    y: &TableRef,
    join: &[TypedColumn],
    compare: &[TypedColumn],
) -> String {
    let mut select = Vec::with_capacity(join.len() + compare.len() * 2);
    for col in join {
        let c = quote_ident(&col.name);
        select.push(format!("x.{c} AS {c}"));
    }
    for col in compare {
        let c = quote_ident(&col.name);
        select.push(format!("x.{c} AS {}", quote_ident(&x_col(&col.name))));
        let y_value = if col.same_type() {
            format!("y.{c}")
        } else {
            format!("TRY_CAST(y.{c} AS {})", col.x_dtype)
        };
        select.push(format!("{y_value} AS {}", quote_ident(&y_col(&col.name))));
    }
    let key_names: Vec<String> = join.iter().map(|c| c.name.clone()).collect();
    format!(
        "SELECT {} FROM {} AS x JOIN {} AS y ON {}",
        select.join(", "),
        x.qualified(),
        y.qualified(),
        key_match("x", "y", &key_names)
    )
}

/// Explicit table definition for the create-then-insert strategy
pub fn create_joined_table(joined: &TableRef, join: &[TypedColumn], compare: &[TypedColumn]) -> String {
    let mut defs = Vec::with_capacity(join.len() + compare.len() * 2);
    for col in join {
        defs.push(format!("{} {}", quote_ident(&col.name), col.x_dtype));
    }
    for col in compare {
        defs.push(format!("{} {}", quote_ident(&x_col(&col.name)), col.x_dtype));
        defs.push(format!("{} {}", quote_ident(&y_col(&col.name)), col.x_dtype));
    }
    format!("CREATE TABLE {} ({})", joined.qualified(), defs.join(", "))
}

pub fn insert_joined_table(joined: &TableRef, select: &str) -> String {
    format!("INSERT INTO {} {}", joined.qualified(), select)
}

// ---------------------------------------------------------------------------
// Unmatched keys
// ---------------------------------------------------------------------------

fn all_keys_missing(from: &TableRef, other: &TableRef, join: &[String]) -> String {
    format!(
        "FROM {} AS a WHERE NOT EXISTS (SELECT 1 FROM {} AS b WHERE {})",
        from.qualified(),
        other.qualified(),
        key_match("a", "b", join)
    )
}

/// Rows of `from` with no key match in `other`
pub fn all_keys_count(from: &TableRef, other: &TableRef, join: &[String]) -> String {
    format!("SELECT COUNT(*) AS count {}", all_keys_missing(from, other, join))
}

pub fn all_keys_sample(from: &TableRef, other: &TableRef, join: &[String]) -> String {
    format!(
        "SELECT {} {} ORDER BY {}",
        aliased_column_list("a", join),
        all_keys_missing(from, other, join),
        positions(join.len())
    )
}

/// Distinct tuples of `cols` in `from` whose leading prefix (all but the
/// last column) exists in `other` while the full tuple does not.
fn missing_key_tuples(from: &TableRef, other: &TableRef, cols: &[String]) -> String {
    let prefix = &cols[..cols.len().saturating_sub(1)];
    let prefix_exists = if prefix.is_empty() {
        String::new()
    } else {
        format!(
            "EXISTS (SELECT 1 FROM {} AS b WHERE {}) AND ",
            other.qualified(),
            key_match("a", "b", prefix)
        )
    };
    format!(
        "SELECT DISTINCT {} FROM {} AS a WHERE {}NOT EXISTS (SELECT 1 FROM {} AS b WHERE {})",
        aliased_column_list("a", cols),
        from.qualified(),
        prefix_exists,
        other.qualified(),
        key_match("a", "b", cols)
    )
}

pub fn first_key_count(from: &TableRef, other: &TableRef, col: &str) -> String {
    sub_keys_count(from, other, &[col.to_string()])
}

pub fn first_key_sample(from: &TableRef, other: &TableRef, col: &str) -> String {
    sub_keys_sample(from, other, &[col.to_string()])
}

pub fn sub_keys_count(from: &TableRef, other: &TableRef, cols: &[String]) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM ({}) AS missing",
        missing_key_tuples(from, other, cols)
    )
}

pub fn sub_keys_sample(from: &TableRef, other: &TableRef, cols: &[String]) -> String {
    format!(
        "{} ORDER BY {}",
        missing_key_tuples(from, other, cols),
        positions(cols.len())
    )
}

/// Missing tuples counted per prefix, largest groups first
pub fn sub_keys_grouped(from: &TableRef, other: &TableRef, cols: &[String]) -> String {
    let prefix = &cols[..cols.len().saturating_sub(1)];
    let group = column_list(prefix);
    format!(
        "SELECT {group}, COUNT(*) AS count FROM ({}) AS missing GROUP BY {group} ORDER BY {} DESC, {}",
        missing_key_tuples(from, other, cols),
        prefix.len() + 1,
        positions(prefix.len())
    )
}

// ---------------------------------------------------------------------------
// Column-level differences
// ---------------------------------------------------------------------------

/// Where differing cells are read from.
///
/// `Joined` filters the joined table directly; `DiffTable` drives the same
/// queries through the long-format diff table joined back on the keys.
#[derive(Debug, Clone, Copy)]
pub enum DiffSource<'a> {
    Joined {
        joined: &'a TableRef,
    },
    DiffTable {
        diff: &'a TableRef,
        joined: &'a TableRef,
        join: &'a [String],
    },
}

impl<'a> DiffSource<'a> {
    fn from_clause(&self) -> String {
        match self {
            DiffSource::Joined { joined } => format!("{} AS joined", joined.qualified()),
            DiffSource::DiffTable { diff, joined, join } => format!(
                "{} AS diff JOIN {} AS joined ON {}",
                diff.qualified(),
                joined.qualified(),
                key_match("diff", "joined", join)
            ),
        }
    }

    fn filter(&self, column: &str) -> String {
        match self {
            DiffSource::Joined { .. } => cells_differ("joined", column),
            DiffSource::DiffTable { .. } => format!("diff.column_name = {}", quote_literal(column)),
        }
    }

    fn key_alias(&self) -> &'static str {
        match self {
            DiffSource::Joined { .. } => "joined",
            DiffSource::DiffTable { .. } => "diff",
        }
    }
}

/// Number of rows where `column` differs
pub fn column_diff_count(source: &DiffSource<'_>, column: &str) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM {} WHERE {}",
        source.from_clause(),
        source.filter(column)
    )
}

/// Differing `(x, y)` value pairs with their frequency, most frequent first
pub fn column_grouped(source: &DiffSource<'_>, column: &str) -> String {
    let x = quote_ident(&x_col(column));
    let y = quote_ident(&y_col(column));
    format!(
        "SELECT joined.{x} AS {x}, joined.{y} AS {y}, COUNT(*) AS count FROM {} WHERE {} \
         GROUP BY 1, 2 ORDER BY 3 DESC, 1, 2",
        source.from_clause(),
        source.filter(column)
    )
}

/// Keys of differing rows next to both values
pub fn column_raw(source: &DiffSource<'_>, join: &[String], column: &str) -> String {
    let x = quote_ident(&x_col(column));
    let y = quote_ident(&y_col(column));
    format!(
        "SELECT {}, joined.{x} AS {x}, joined.{y} AS {y} FROM {} WHERE {} ORDER BY {}",
        aliased_column_list(source.key_alias(), join),
        source.from_clause(),
        source.filter(column),
        positions(join.len())
    )
}

/// Rows of one source table that share their first key value with a
/// differing row, showing the keys and the column as stored on that side.
pub fn column_hier(source: &DiffSource<'_>, side: &TableRef, join: &[String], column: &str) -> String {
    let first = &join[..join.len().min(1)];
    format!(
        "SELECT {}, src.{} FROM {} AS src WHERE EXISTS (SELECT 1 FROM {} WHERE {} AND {}) ORDER BY {}",
        aliased_column_list("src", join),
        quote_ident(column),
        side.qualified(),
        source.from_clause(),
        source.filter(column),
        key_match(source.key_alias(), "src", first),
        positions(join.len())
    )
}

/// Differences bucketed into `tiles` quantiles with their range and size
pub fn column_numeric_diffs_binned(
    source: &DiffSource<'_>,
    column: &str,
    kind: DeltaKind,
    tiles: u64,
) -> String {
    let delta = kind.expr(
        &format!("joined.{}", quote_ident(&x_col(column))),
        &format!("joined.{}", quote_ident(&y_col(column))),
    );
    format!(
        "SELECT tile, MIN(delta) AS min_diff, MAX(delta) AS max_diff, COUNT(*) AS count FROM (\
         SELECT delta, NTILE({tiles}) OVER (ORDER BY delta) AS tile FROM (\
         SELECT {delta} AS delta FROM {} WHERE {} AND {}) AS deltas) AS binned \
         GROUP BY tile ORDER BY tile",
        source.from_clause(),
        source.filter(column),
        cells_present("joined", column)
    )
}

/// Differing rows ordered by the size of the difference, largest first
pub fn column_numeric_diffs_sorted(
    source: &DiffSource<'_>,
    join: &[String],
    column: &str,
    kind: DeltaKind,
) -> String {
    let x = quote_ident(&x_col(column));
    let y = quote_ident(&y_col(column));
    let delta = kind.expr(&format!("joined.{x}"), &format!("joined.{y}"));
    format!(
        "SELECT {}, joined.{x} AS {x}, joined.{y} AS {y}, {delta} AS diff FROM {} WHERE {} AND {} \
         ORDER BY ABS({delta}) DESC, {}",
        aliased_column_list(source.key_alias(), join),
        source.from_clause(),
        source.filter(column),
        cells_present("joined", column),
        positions(join.len())
    )
}

fn any_column_differs(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("({})", cells_differ("joined", c)))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Rows of the joined table with a difference in any of `columns`
pub fn joined_rows_count(joined: &TableRef, columns: &[String]) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM {} AS joined WHERE {}",
        joined.qualified(),
        any_column_differs(columns)
    )
}

pub fn joined_rows_sample(joined: &TableRef, join: &[String], columns: &[String]) -> String {
    format!(
        "SELECT * FROM {} AS joined WHERE {} ORDER BY {}",
        joined.qualified(),
        any_column_differs(columns),
        positions(join.len())
    )
}

// ---------------------------------------------------------------------------
// Diff table
// ---------------------------------------------------------------------------

pub fn create_diff_table(diff: &TableRef, join: &[TypedColumn]) -> String {
    let keys = join
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.x_dtype))
        .collect::<Vec<_>>();
    format!(
        "CREATE TABLE {} ({}, column_name VARCHAR)",
        diff.qualified(),
        keys.join(", ")
    )
}

/// One diff-table row per differing cell of `column`
pub fn insert_diff(diff: &TableRef, joined: &TableRef, join: &[String], column: &str) -> String {
    format!(
        "INSERT INTO {} SELECT {}, {} AS column_name FROM {} AS joined WHERE {}",
        diff.qualified(),
        aliased_column_list("joined", join),
        quote_literal(column),
        joined.qualified(),
        cells_differ("joined", column)
    )
}

/// Joined rows whose key appears in the diff table
pub fn diff_rows_sample(diff: &TableRef, joined: &TableRef, join: &[String]) -> String {
    format!(
        "SELECT joined.* FROM {} AS joined JOIN (SELECT DISTINCT {} FROM {}) AS x ON {} ORDER BY {}",
        joined.qualified(),
        column_list(join),
        diff.qualified(),
        key_match("x", "joined", join),
        aliased_column_list("joined", join)
    )
}

/// Differing cell counts per column, most differences first
pub fn diff_column_summary(diff: &TableRef) -> String {
    format!(
        "SELECT column_name, COUNT(*) AS count FROM {} GROUP BY column_name ORDER BY count DESC, column_name",
        diff.qualified()
    )
}

// ---------------------------------------------------------------------------
// Query files
// ---------------------------------------------------------------------------

/// A query read from disk, to be materialized as a temporary table
#[derive(Debug, Clone)]
pub struct QueryFile {
    /// Table name the query is materialized under (the file stem)
    pub table_name: String,
    pub query: String,
    pub source_path: std::path::PathBuf,
}

/// Read a query file, dropping comment lines and a trailing semicolon
pub fn read_query_file(file_path: &Path) -> Result<QueryFile> {
    let content = fs::read_to_string(file_path).map_err(|e| {
        DbdiffError::invalid_input(format!(
            "Failed to read query file '{}': {}",
            file_path.display(),
            e
        ))
    })?;

    let body = content
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let query = body.trim().trim_end_matches(';').trim().to_string();

    if query.is_empty() {
        return Err(DbdiffError::invalid_input(format!(
            "No query found in file '{}'",
            file_path.display()
        )));
    }

    if statement_count(&query) > 1 {
        return Err(DbdiffError::invalid_input(format!(
            "Query file '{}' holds more than one statement",
            file_path.display()
        )));
    }

    let table_name = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DbdiffError::invalid_input(format!(
                "Cannot derive a table name from '{}'",
                file_path.display()
            ))
        })?
        .to_string();

    Ok(QueryFile {
        table_name,
        query,
        source_path: file_path.to_path_buf(),
    })
}

/// Non-empty statements in `sql`, split on `;` outside quotes and comments
fn statement_count(sql: &str) -> usize {
    let mut count = 0;
    let mut has_content = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                has_content = true;
                // a doubled quote closes and immediately reopens
                for next in chars.by_ref() {
                    if next == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ';' => {
                if has_content {
                    count += 1;
                }
                has_content = false;
            }
            c if c.is_whitespace() => {}
            _ => has_content = true,
        }
    }

    if has_content {
        count += 1;
    }
    count
}

/// Check if a file is a SQL file
pub fn is_sql_file(file_path: &Path) -> bool {
    if let Some(extension) = file_path.extension().and_then(|s| s.to_str()) {
        extension.to_lowercase() == "sql"
    } else {
        false
    }
}
