//! Column metadata and type compatibility

use crate::config::SummaryFormat;
use crate::engine::DiffEngine;
use crate::error::{DbdiffError, Result};
use crate::frame::Frame;
use crate::sql::{self, TableRef, TypedColumn};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A column as declared by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
}

/// Broad type groups used to decide implicit conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Float,
    Text,
    Date,
    Boolean,
    Other,
}

impl TypeFamily {
    pub fn of(dtype: &str) -> Self {
        let t = dtype.to_uppercase();
        if t.contains("INTERVAL") {
            TypeFamily::Other
        } else if t.contains("INT") {
            TypeFamily::Integer
        } else if t.contains("NUMERIC") || t.contains("DECIMAL") {
            TypeFamily::Decimal
        } else if t.contains("FLOAT") || t.contains("DOUBLE") || t.contains("REAL") {
            TypeFamily::Float
        } else if t.contains("CHAR") || t.contains("TEXT") || t.contains("STRING") {
            TypeFamily::Text
        } else if t.contains("DATE") {
            TypeFamily::Date
        } else if t.contains("BOOL") {
            TypeFamily::Boolean
        } else {
            TypeFamily::Other
        }
    }
}

/// Can a `source` value be implicitly converted to `target` for comparison?
pub fn implicit_dtype_comparison(source: &str, target: &str) -> bool {
    use TypeFamily::*;
    match (TypeFamily::of(source), TypeFamily::of(target)) {
        (Integer, Boolean | Decimal | Float | Integer) => true,
        (Decimal, Float | Decimal) => true,
        (Text, Text | Float) => true,
        (Float, Float | Decimal) => true,
        (Date, Date) => true,
        (Integer | Decimal | Float | Text | Date, _) => false,
        _ => source.eq_ignore_ascii_case(target),
    }
}

pub fn is_numeric_like(dtype: &str) -> bool {
    matches!(
        TypeFamily::of(dtype),
        TypeFamily::Integer | TypeFamily::Decimal | TypeFamily::Float
    )
}

pub fn is_date_like(dtype: &str) -> bool {
    dtype.to_lowercase().contains("date")
}

pub fn get_column_info(engine: &DiffEngine, table: &TableRef) -> Result<Vec<ColumnInfo>> {
    let frame = engine.query_frame(&sql::table_columns(table))?;
    let name_idx = frame.column_index("column_name").unwrap_or(0);
    let type_idx = frame.column_index("column_type").unwrap_or(1);

    let columns: Vec<ColumnInfo> = frame
        .rows
        .iter()
        .map(|row| ColumnInfo {
            column_name: row.get(name_idx).and_then(Value::as_str).unwrap_or_default().to_string(),
            data_type: row.get(type_idx).and_then(Value::as_str).unwrap_or_default().to_string(),
        })
        .collect();

    if columns.is_empty() {
        return Err(DbdiffError::no_columns(table.to_string()));
    }
    Ok(columns)
}

/// Lowercased column name to declared type, in table order
pub fn get_column_info_lookup(engine: &DiffEngine, table: &TableRef) -> Result<IndexMap<String, String>> {
    let columns = get_column_info(engine, table)?;
    log::info!(
        "Column info for {}: {}",
        table,
        columns
            .iter()
            .take(5)
            .map(|c| format!("{} {}", c.column_name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(columns
        .into_iter()
        .map(|c| (c.column_name.to_lowercase(), c.data_type))
        .collect())
}

pub fn table_exists(engine: &DiffEngine, table: &TableRef) -> Result<bool> {
    Ok(engine.query_count(&sql::table_exists(table))? > 0)
}

/// How one column name lines up across both tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column_name: String,
    pub x_dtype: Option<String>,
    pub y_dtype: Option<String>,
    pub comparable: bool,
    pub exclude: bool,
}

impl ColumnMatch {
    /// Present on both sides, convertible, and not excluded
    pub fn passes_filter(&self) -> bool {
        !self.exclude && self.comparable && self.x_dtype.is_some() && self.y_dtype.is_some()
    }

    /// Present on both sides but neither type converts to the other
    pub fn uncomparable(&self) -> bool {
        !self.comparable && self.x_dtype.is_some() && self.y_dtype.is_some()
    }

    pub fn typed(&self) -> Option<TypedColumn> {
        match (&self.x_dtype, &self.y_dtype) {
            (Some(x), Some(y)) => Some(TypedColumn::new(self.column_name.clone(), x.clone(), y.clone())),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        format!(
            "x_dtype: {}, y_dtype: {}, comparable: {}, exclude: {}",
            self.x_dtype.as_deref().unwrap_or("<missing>"),
            self.y_dtype.as_deref().unwrap_or("<missing>"),
            self.comparable,
            self.exclude
        )
    }
}

/// Column matches keyed by lowercased name; x's columns first, then y-only ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatchTable {
    pub columns: IndexMap<String, ColumnMatch>,
}

impl ColumnMatchTable {
    pub fn build(
        x_lookup: &IndexMap<String, String>,
        y_lookup: &IndexMap<String, String>,
        exclude: &BTreeSet<String>,
    ) -> Self {
        let mut columns = IndexMap::new();
        for name in x_lookup.keys().chain(y_lookup.keys()) {
            if columns.contains_key(name) {
                continue;
            }
            let x_dtype = x_lookup.get(name).cloned();
            let y_dtype = y_lookup.get(name).cloned();
            let comparable = match (&x_dtype, &y_dtype) {
                (Some(x), Some(y)) => implicit_dtype_comparison(x, y) || implicit_dtype_comparison(y, x),
                _ => false,
            };
            columns.insert(
                name.clone(),
                ColumnMatch {
                    column_name: name.clone(),
                    x_dtype,
                    y_dtype,
                    comparable,
                    exclude: exclude.contains(name),
                },
            );
        }
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnMatch> {
        self.columns.get(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn missing_in_x(&self) -> Vec<&ColumnMatch> {
        self.columns.values().filter(|c| c.x_dtype.is_none()).collect()
    }

    pub fn missing_in_y(&self) -> Vec<&ColumnMatch> {
        self.columns.values().filter(|c| c.y_dtype.is_none()).collect()
    }

    pub fn uncomparable(&self) -> Vec<&ColumnMatch> {
        self.columns.values().filter(|c| c.uncomparable()).collect()
    }

    /// Join columns with their types; every one must pass the comparable filter
    pub fn join_columns(&self, join_cols: &[String]) -> Result<Vec<TypedColumn>> {
        join_cols
            .iter()
            .map(|col| match self.get(col) {
                Some(info) if info.passes_filter() => info
                    .typed()
                    .ok_or_else(|| DbdiffError::join_column_not_comparable(col, info.describe())),
                Some(info) => Err(DbdiffError::join_column_not_comparable(col, info.describe())),
                None => Err(DbdiffError::join_column_not_comparable(col, "not present in either table")),
            })
            .collect()
    }

    /// Non-key columns that will be compared cell by cell
    pub fn compare_columns(&self, join_cols: &[String]) -> Vec<TypedColumn> {
        self.columns
            .values()
            .filter(|c| c.passes_filter() && !join_cols.contains(&c.column_name))
            .filter_map(ColumnMatch::typed)
            .collect()
    }

    pub fn to_frame(&self) -> Frame {
        self.frame_of(self.columns.values())
    }

    fn frame_of<'a>(&self, matches: impl Iterator<Item = &'a ColumnMatch>) -> Frame {
        let mut frame = Frame::new(
            ["column_name", "x_dtype", "y_dtype", "comparable", "exclude"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for m in matches {
            frame.rows.push(vec![
                Value::String(m.column_name.clone()),
                m.x_dtype.clone().map(Value::String).unwrap_or(Value::Null),
                m.y_dtype.clone().map(Value::String).unwrap_or(Value::Null),
                Value::Bool(m.comparable),
                Value::Bool(m.exclude),
            ]);
        }
        frame
    }

    /// Write the table to `path`
    pub fn save(&self, path: &Path, format: SummaryFormat) -> Result<()> {
        match format {
            SummaryFormat::Json => {
                let rows: Vec<&ColumnMatch> = self.columns.values().collect();
                std::fs::write(path, serde_json::to_string_pretty(&rows)?)?;
            }
            SummaryFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                writer.write_record(["column_name", "x_dtype", "y_dtype", "comparable", "exclude"])?;
                for m in self.columns.values() {
                    writer.write_record([
                        m.column_name.as_str(),
                        m.x_dtype.as_deref().unwrap_or(""),
                        m.y_dtype.as_deref().unwrap_or(""),
                        if m.comparable { "true" } else { "false" },
                        if m.exclude { "true" } else { "false" },
                    ])?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }

    fn log_summary(&self) {
        let missing_x = self.frame_of(self.missing_in_x().into_iter());
        let missing_y = self.frame_of(self.missing_in_y().into_iter());
        let uncomparable = self.frame_of(self.uncomparable().into_iter());
        log::info!("Missing columns in x:\n{}", missing_x);
        log::info!("Missing columns in y:\n{}", missing_y);
        log::info!(
            "These columns have incompatible dtypes, specifically neither of them can be implicitly converted to the other:\n{}",
            uncomparable
        );
    }
}

/// Match the columns of both tables and report what lines up.
///
/// When `save` is given the full table is written to
/// `{dir}/{x_table}_col_info.{ext}`; otherwise it is logged.
pub fn get_all_col_info(
    engine: &DiffEngine,
    x: &TableRef,
    y: &TableRef,
    exclude: &BTreeSet<String>,
    save: Option<(SummaryFormat, &Path)>,
) -> Result<ColumnMatchTable> {
    log::info!("Getting column info for both tables.");
    let x_lookup = get_column_info_lookup(engine, x)?;
    let y_lookup = get_column_info_lookup(engine, y)?;
    let table = ColumnMatchTable::build(&x_lookup, &y_lookup, exclude);
    log::debug!("{:?}", table);

    match save {
        Some((format, dir)) => {
            let path = column_summary_path(dir, &x.table, format);
            log::info!("Saving column summary to {}", path.display());
            table.save(&path, format)?;
        }
        None => log::info!("All column info:\n{}", table.to_frame()),
    }
    table.log_summary();

    Ok(table)
}

pub fn column_summary_path(dir: &Path, x_table: &str, format: SummaryFormat) -> PathBuf {
    dir.join(format!("{}_col_info.{}", x_table, format.extension()))
}
