//! Individual comparison steps: each one renders SQL, runs it, and reshapes
//! the result into report types.

use crate::catalog::{is_date_like, is_numeric_like, ColumnMatchTable};
use crate::config::{JoinStrategy, MAX_DIFF_TILES};
use crate::engine::DiffEngine;
use crate::error::Result;
use crate::frame::Frame;
use crate::sql::{self, DeltaKind, DiffSource, TableRef, TypedColumn};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Count, query and sample for keys of one side missing from the other
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSample {
    pub count: u64,
    pub query: String,
    pub sample: Frame,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_grouped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_grouped: Option<Frame>,
}

/// Keys present on one side only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRows {
    /// Rows of x with no match in y
    pub x_only: SideSample,
    /// Rows of y with no match in x
    pub y_only: SideSample,
}

/// Unmatched keys per join column level, in join column order
pub type HierarchicalJoinInfo = IndexMap<String, UnmatchedRows>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySample {
    pub query: String,
    pub sample: Frame,
}

/// Distribution of numeric or date differences for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericDiffs {
    pub kind: DeltaKind,
    pub tiles: u64,
    pub binned: QuerySample,
    /// Largest differences first
    pub sorted: QuerySample,
}

/// Everything collected for one column with differences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub column_name: String,
    pub count: u64,
    /// Differing value pairs with their frequency
    pub grouped: QuerySample,
    /// Keys of differing rows with both values
    pub raw: QuerySample,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hier_x: Option<QuerySample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hier_y: Option<QuerySample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericDiffs>,
}

/// Row-level totals over all compared columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Sum of cell-by-cell differences
    pub total_count: u64,
    /// Rows with at least one difference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Frame>,
}

/// Shared parameters for the per-column detail queries
#[derive(Debug, Clone, Copy)]
pub struct ColumnDiffContext<'a> {
    pub x: &'a TableRef,
    pub y: &'a TableRef,
    pub joined: &'a TableRef,
    pub join_cols: &'a [String],
    pub max_rows_column: usize,
    pub hierarchical: bool,
}

fn sample(engine: &DiffEngine, query: String, limit: usize) -> Result<QuerySample> {
    let sample = engine.query_frame(&sql::with_limit(&query, limit))?;
    Ok(QuerySample { query, sample })
}

/// Number of rows that are not unique on `join_cols`
pub fn check_primary_key(engine: &DiffEngine, table: &TableRef, join_cols: &[String]) -> Result<u64> {
    let n_rows = engine.query_count(&sql::table_rows(table))?;
    let n_distinct = engine.query_count(&sql::table_rows_uniq(table, join_cols))?;
    Ok(n_rows.saturating_sub(n_distinct))
}

/// Names of the `(dedup, dup)` tables for `table`.
///
/// Temp copies of a non-temp table are prefixed with its schema, so
/// `a.orders` and `b.orders` land in `temp.a_orders_*` and `temp.b_orders_*`.
pub fn dedup_tables(table: &TableRef, use_temp_tables: bool) -> (TableRef, TableRef) {
    let base = if use_temp_tables && !table.is_temp() {
        TableRef::temp(format!("{}_{}", table.schema, table.table))
    } else if use_temp_tables {
        TableRef::temp(table.table.as_str())
    } else {
        table.clone()
    };
    (
        base.derived(&base.schema, "_dedup"),
        base.derived(&base.schema, "_dup"),
    )
}

/// Split a table into a dedup table (keys occurring once) and a dup table
/// (keys occurring more than once, with `dup_count`), named by
/// [`dedup_tables`]. Returns the dedup table.
///
/// Rows are selected into new tables rather than deleted from the source.
pub fn select_distinct_rows(
    engine: &DiffEngine,
    table: &TableRef,
    join_cols: &[String],
    use_temp_tables: bool,
) -> Result<TableRef> {
    let (dedup, dup) = dedup_tables(table, use_temp_tables);

    engine.execute(&sql::table_drop(&dedup))?;
    engine.execute(&sql::materialize(&dedup, &sql::dedup_select(table, join_cols)))?;
    engine.execute(&sql::table_drop(&dup))?;
    engine.execute(&sql::materialize(&dup, &sql::dup_select(table, join_cols)))?;

    Ok(dedup)
}

/// Build the joined table and return its row count
pub fn create_joined_table(
    engine: &DiffEngine,
    x: &TableRef,
    y: &TableRef,
    join: &[TypedColumn],
    compare: &[TypedColumn],
    joined: &TableRef,
    strategy: JoinStrategy,
) -> Result<u64> {
    let drop_q = sql::table_drop(joined);
    log::info!("{}", drop_q);
    engine.execute(&drop_q)?;

    let select = sql::joined_select(x, y, join, compare);
    match strategy {
        JoinStrategy::CreateInsert => {
            let create_q = sql::create_joined_table(joined, join, compare);
            log::info!("{}", create_q);
            engine.execute(&create_q)?;
            let insert_q = sql::insert_joined_table(joined, &select);
            log::info!("{}", insert_q);
            engine.execute(&insert_q)?;
        }
        JoinStrategy::SelectInto => {
            let join_q = sql::create_table_as(joined, &select);
            log::info!("{}", join_q);
            engine.execute(&join_q)?;
        }
    }

    engine.query_count(&sql::table_rows(joined))
}

/// Rows present on one side only, matching on all join columns at once
pub fn get_unmatched_rows_straight(
    engine: &DiffEngine,
    x: &TableRef,
    y: &TableRef,
    join_cols: &[String],
    max_rows_column: usize,
) -> Result<UnmatchedRows> {
    let side = |from: &TableRef, other: &TableRef| -> Result<SideSample> {
        let count = engine.query_count(&sql::all_keys_count(from, other, join_cols))?;
        let query = sql::all_keys_sample(from, other, join_cols);
        let sample = engine.query_frame(&sql::with_limit(&query, max_rows_column))?;
        Ok(SideSample {
            count,
            query,
            sample,
            ..SideSample::default()
        })
    };

    Ok(UnmatchedRows {
        x_only: side(x, y)?,
        y_only: side(y, x)?,
    })
}

/// Unmatched keys level by level.
///
/// The first level looks at the first join column alone. Level `i` looks at
/// the first `i + 1` columns, restricted to tuples whose first `i` columns
/// already match, so a miss is attributed to the column that introduced it.
pub fn get_unmatched_rows(
    engine: &DiffEngine,
    x: &TableRef,
    y: &TableRef,
    join_cols: &[String],
    max_rows_column: usize,
) -> Result<HierarchicalJoinInfo> {
    let mut results = HierarchicalJoinInfo::new();

    for i in 0..join_cols.len() {
        let columns = &join_cols[..=i];
        if i == 0 {
            log::info!(
                "Getting rows that did not match on only the first join column: {}.",
                join_cols[0]
            );
        } else {
            log::info!(
                "Getting rows that did not match on join column #{}: {}. This is equivalent to joining the tables on unique rows of {} where all but the last already exist.",
                i + 1,
                join_cols[i],
                columns.join(",")
            );
        }

        let side = |from: &TableRef, other: &TableRef| -> Result<SideSample> {
            let (count_q, query) = if i == 0 {
                (
                    sql::first_key_count(from, other, &join_cols[0]),
                    sql::first_key_sample(from, other, &join_cols[0]),
                )
            } else {
                (
                    sql::sub_keys_count(from, other, columns),
                    sql::sub_keys_sample(from, other, columns),
                )
            };
            let count = engine.query_count(&count_q)?;
            let sample = engine.query_frame(&sql::with_limit(&query, max_rows_column))?;
            let mut result = SideSample {
                count,
                query,
                sample,
                ..SideSample::default()
            };
            if i > 0 {
                let grouped = sql::sub_keys_grouped(from, other, columns);
                result.sample_grouped =
                    Some(engine.query_frame(&sql::with_limit(&grouped, max_rows_column))?);
                result.query_grouped = Some(grouped);
            }
            Ok(result)
        };

        results.insert(
            join_cols[i].clone(),
            UnmatchedRows {
                x_only: side(x, y)?,
                y_only: side(y, x)?,
            },
        );
    }

    Ok(results)
}

/// Create the diff table keyed like the joined table; returns the statement
pub fn create_diff_table(engine: &DiffEngine, diff: &TableRef, join: &[TypedColumn]) -> Result<String> {
    let q = sql::create_diff_table(diff, join);
    engine.execute(&sql::table_drop(diff))?;
    engine.execute(&q)?;
    Ok(q)
}

pub fn insert_diff_table(
    engine: &DiffEngine,
    diff: &TableRef,
    joined: &TableRef,
    join_cols: &[String],
    column: &str,
) -> Result<()> {
    engine.execute(&sql::insert_diff(diff, joined, join_cols, column))
}

/// Row totals from the diff table
pub fn get_diff_rows(
    engine: &DiffEngine,
    diff: &TableRef,
    joined: &TableRef,
    join_cols: &[String],
    max_rows_all: usize,
    skip_row_total: bool,
) -> Result<DiffSummary> {
    log::debug!("Getting diff rows");
    let total_count = engine.query_count(&sql::table_rows(diff))?;
    if skip_row_total {
        log::debug!("Skipping the sample of rows with differences; returning only the sum of cell-by-cell differences.");
        return Ok(DiffSummary {
            total_count,
            ..DiffSummary::default()
        });
    }

    let count = engine.query_count(&sql::table_rows_uniq(diff, join_cols))?;
    let query = sql::diff_rows_sample(diff, joined, join_cols);
    let sample = engine.query_frame(&sql::with_limit(&query, max_rows_all))?;

    Ok(DiffSummary {
        total_count,
        count: Some(count),
        query: Some(query),
        sample: Some(sample),
    })
}

/// `(column_name, count)` for every column with differences
pub fn get_diff_columns(engine: &DiffEngine, diff: &TableRef) -> Result<Frame> {
    log::debug!("Getting diff columns");
    engine.query_frame(&sql::diff_column_summary(diff))
}

fn delta_kind(column: Option<&TypedColumn>) -> Option<DeltaKind> {
    let column = column?;
    if is_numeric_like(&column.x_dtype) && is_numeric_like(&column.y_dtype) {
        Some(DeltaKind::Numeric)
    } else if is_date_like(&column.x_dtype) && is_date_like(&column.y_dtype) {
        Some(DeltaKind::Date)
    } else {
        None
    }
}

fn diff_tiles(count: u64) -> u64 {
    count.clamp(1, MAX_DIFF_TILES)
}

fn column_detail(
    engine: &DiffEngine,
    source: &DiffSource<'_>,
    ctx: &ColumnDiffContext<'_>,
    column: &str,
    typed: Option<&TypedColumn>,
    count: u64,
) -> Result<ColumnDiff> {
    log::info!(
        "Getting detailed diff for column: {} with {} differences.",
        column,
        count
    );
    let limit = ctx.max_rows_column;

    let grouped = sample(engine, sql::column_grouped(source, column), limit)?;
    let raw = sample(engine, sql::column_raw(source, ctx.join_cols, column), limit)?;

    let (hier_x, hier_y) = if ctx.hierarchical {
        (
            Some(sample(engine, sql::column_hier(source, ctx.x, ctx.join_cols, column), limit)?),
            Some(sample(engine, sql::column_hier(source, ctx.y, ctx.join_cols, column), limit)?),
        )
    } else {
        (None, None)
    };

    let numeric = match delta_kind(typed) {
        Some(kind) => {
            let tiles = diff_tiles(count);
            let binned_q = sql::column_numeric_diffs_binned(source, column, kind, tiles);
            let binned = QuerySample {
                sample: engine.query_frame(&binned_q)?,
                query: binned_q,
            };
            let sorted = sample(
                engine,
                sql::column_numeric_diffs_sorted(source, ctx.join_cols, column, kind),
                limit,
            )?;
            Some(NumericDiffs {
                kind,
                tiles,
                binned,
                sorted,
            })
        }
        None => None,
    };

    Ok(ColumnDiff {
        column_name: column.to_string(),
        count,
        grouped,
        raw,
        hier_x,
        hier_y,
        numeric,
    })
}

fn sort_by_count(diffs: &mut [ColumnDiff]) {
    diffs.sort_by(|a, b| b.count.cmp(&a.count));
}

/// Column details driven by the diff table summary
pub fn get_column_diffs(
    engine: &DiffEngine,
    diff_columns: &Frame,
    diff: &TableRef,
    ctx: &ColumnDiffContext<'_>,
    columns: &ColumnMatchTable,
) -> Result<Vec<ColumnDiff>> {
    log::debug!("Getting column diffs");
    let source = DiffSource::DiffTable {
        diff,
        joined: ctx.joined,
        join: ctx.join_cols,
    };

    let mut results = Vec::with_capacity(diff_columns.height());
    for row in &diff_columns.rows {
        let name = row.first().and_then(Value::as_str).unwrap_or_default();
        let count = row.get(1).and_then(Value::as_u64).unwrap_or(0);
        let typed = columns.get(name).and_then(|c| c.typed());
        results.push(column_detail(engine, &source, ctx, name, typed.as_ref(), count)?);
    }

    sort_by_count(&mut results);
    Ok(results)
}

/// Column details read straight from the joined table.
///
/// Columns without differences are counted but not detailed. The result is
/// ordered by difference count, largest first.
pub fn get_column_diffs_from_joined(
    engine: &DiffEngine,
    ctx: &ColumnDiffContext<'_>,
    compare: &[TypedColumn],
) -> Result<Vec<ColumnDiff>> {
    log::info!(
        "Getting column diffs for columns: {}",
        compare.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(",")
    );
    let source = DiffSource::Joined { joined: ctx.joined };

    let mut results = Vec::new();
    for column in compare {
        let diff_count = engine.query_count(&sql::column_diff_count(&source, &column.name))?;
        if diff_count > 0 {
            results.push(column_detail(engine, &source, ctx, &column.name, Some(column), diff_count)?);
        } else {
            log::info!("NOT getting detailed diff for column: {} with 0 differences.", column.name);
        }
    }

    sort_by_count(&mut results);
    Ok(results)
}

/// Row totals from the joined table, given the per-column results
pub fn get_diff_rows_from_joined(
    engine: &DiffEngine,
    column_diffs: &[ColumnDiff],
    joined: &TableRef,
    join_cols: &[String],
    max_rows_all: usize,
    skip_row_total: bool,
) -> Result<DiffSummary> {
    log::debug!("Getting diff rows from the joined table");
    let total_count = column_diffs.iter().map(|c| c.count).sum();
    if skip_row_total || column_diffs.is_empty() {
        log::debug!("Skipping the sample of rows with differences; returning only the sum of cell-by-cell differences.");
        return Ok(DiffSummary {
            total_count,
            ..DiffSummary::default()
        });
    }

    let columns: Vec<String> = column_diffs.iter().map(|c| c.column_name.clone()).collect();
    let count = engine.query_count(&sql::joined_rows_count(joined, &columns))?;
    let query = sql::joined_rows_sample(joined, join_cols, &columns);
    let sample = engine.query_frame(&sql::with_limit(&query, max_rows_all))?;

    Ok(DiffSummary {
        total_count,
        count: Some(count),
        query: Some(query),
        sample: Some(sample),
    })
}
