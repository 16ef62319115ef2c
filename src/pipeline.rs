//! Runs the comparison steps in order and assembles the report

use crate::catalog;
use crate::config::{DiffOptions, TableSource};
use crate::diff::{self, ColumnDiffContext};
use crate::engine::DiffEngine;
use crate::error::{DbdiffError, Result};
use crate::progress::ProgressReporter;
use crate::report::{DedupInfo, DedupSide, DiffReport};
use crate::sql::{self, TableRef, DIFF_SUFFIX, JOINED_SUFFIX, TEMP_SCHEMA};
use chrono::Utc;

/// One side after resolving query files
struct ResolvedSide {
    table: TableRef,
    from_query: bool,
}

fn resolve_source(engine: &DiffEngine, source: &TableSource, side: &str) -> Result<ResolvedSide> {
    match source {
        TableSource::Table(table) => Ok(ResolvedSide {
            table: table.clone(),
            from_query: false,
        }),
        TableSource::QueryFile(path) => {
            if !sql::is_sql_file(path) {
                log::warn!("Query file {} does not have a .sql extension", path.display());
            }
            let query_file = sql::read_query_file(path)?;
            log::info!(
                "Creating temp table {} from query for {}.",
                query_file.table_name,
                side
            );
            engine.execute(&sql::create_temp_table(&query_file.table_name, &query_file.query))?;
            Ok(ResolvedSide {
                table: TableRef::temp(query_file.table_name),
                from_query: true,
            })
        }
    }
}

/// The table a side is compared from once deduplication has run
fn compared_table(side: &ResolvedSide, dups: u64, use_temp_tables: bool) -> TableRef {
    if dups > 0 {
        diff::dedup_tables(&side.table, use_temp_tables).0
    } else {
        side.table.clone()
    }
}

fn dedup_side(
    engine: &DiffEngine,
    table: &TableRef,
    join_cols: &[String],
    count: u64,
    use_temp_tables: bool,
    side: &str,
) -> Result<(TableRef, DedupSide)> {
    if count == 0 {
        return Ok((table.clone(), DedupSide::default()));
    }
    log::info!(
        "{} table was not unique on join keys, creating _dedup and _dup versions.",
        side
    );
    let dedup = diff::select_distinct_rows(engine, table, join_cols, use_temp_tables)?;
    Ok((
        dedup.clone(),
        DedupSide {
            count,
            dedup_table: Some(dedup),
        },
    ))
}

/// Compare both sides of `options` and build the report.
///
/// Leaves the joined table (and the diff table in diff-table mode) in the
/// output schema unless `drop_output_tables` is set.
pub fn run_diff(engine: &DiffEngine, options: &DiffOptions, progress: &mut ProgressReporter) -> Result<DiffReport> {
    options.validate()?;
    let join_cols = &options.join_cols;

    if options.case_insensitive {
        engine.set_case_insensitive()?;
    }

    progress.start_step("Resolving tables...");
    let x = resolve_source(engine, &options.x, "x")?;
    let y = resolve_source(engine, &options.y, "y")?;
    if x.table == y.table && (x.from_query || y.from_query) {
        return Err(DbdiffError::invalid_input(format!(
            "Both sides resolve to the same table {}; rename one of the query files",
            x.table
        )));
    }
    progress.finish_step(&format!("Comparing {} with {}", x.table, y.table));

    progress.start_step("Matching columns...");
    if options.save_column_summary.is_some() {
        std::fs::create_dir_all(&options.output_dir)?;
    }
    let save = options
        .save_column_summary
        .map(|format| (format, options.output_dir.as_path()));
    let column_info = catalog::get_all_col_info(engine, &x.table, &y.table, &options.exclude_columns, save)?;
    let join = column_info.join_columns(join_cols)?;
    let compare = column_info.compare_columns(join_cols);
    progress.finish_step(&format!("{} columns to compare", compare.len()));

    progress.start_step("Checking primary keys...");
    log::info!("Checking primary keys.");
    let x_dups = diff::check_primary_key(engine, &x.table, join_cols)?;
    let y_dups = diff::check_primary_key(engine, &y.table, join_cols)?;
    progress.finish_step(&format!("Duplicate keys: x {}, y {}", x_dups, y_dups));

    let hierarchical = if options.hierarchical_join {
        progress.start_step("Finding unmatched rows per join column...");
        log::info!("Getting rows that are missing on each join key.");
        let info = diff::get_unmatched_rows(engine, &x.table, &y.table, join_cols, options.max_rows_column)?;
        progress.finish_step("Unmatched rows per join column collected");
        Some(info)
    } else {
        None
    };

    progress.start_step("Deduplicating...");
    let x_temp = options.drop_output_tables || x.from_query;
    let y_temp = options.drop_output_tables || y.from_query;
    let x_compared = compared_table(&x, x_dups, x_temp);
    if x_dups + y_dups > 0 && x_compared == compared_table(&y, y_dups, y_temp) {
        return Err(DbdiffError::invalid_input(format!(
            "Both sides would be compared from the same table {}",
            x_compared
        )));
    }
    let (x_table, x_dedup) = dedup_side(engine, &x.table, join_cols, x_dups, x_temp, "X")?;
    let (y_table, y_dedup) = dedup_side(engine, &y.table, join_cols, y_dups, y_temp, "Y")?;
    progress.finish_step("Join keys are unique");

    progress.start_step("Finding unmatched rows...");
    log::info!("Getting rows that did not match (not in joined table) after deduping.");
    let unmatched = diff::get_unmatched_rows_straight(engine, &x_table, &y_table, join_cols, options.max_rows_column)?;
    progress.finish_step(&format!(
        "Unmatched rows: x {}, y {}",
        unmatched.x_only.count, unmatched.y_only.count
    ));

    if !options.output_schema.eq_ignore_ascii_case(TEMP_SCHEMA) {
        engine.execute(&sql::create_schema(&options.output_schema))?;
    }
    let joined_table = x_table.derived(&options.output_schema, JOINED_SUFFIX);
    progress.start_step(&format!("Building joined table {}...", joined_table));
    log::info!("Building joined table {}", joined_table);
    let joined_count = diff::create_joined_table(
        engine,
        &x_table,
        &y_table,
        &join,
        &compare,
        &joined_table,
        options.join_strategy,
    )?;
    progress.finish_step(&format!("Joined {} rows", joined_count));

    let ctx = ColumnDiffContext {
        x: &x_table,
        y: &y_table,
        joined: &joined_table,
        join_cols,
        max_rows_column: options.max_rows_column,
        hierarchical: options.hierarchical_join,
    };

    progress.start_step("Comparing columns...");
    let (diff_table, column_diffs, diff_summary) = if options.use_diff_table {
        let diff_table = x_table.derived(&options.output_schema, DIFF_SUFFIX);
        log::info!("Building diff table {}.", diff_table);
        diff::create_diff_table(engine, &diff_table, &join)?;
        for column in &compare {
            log::info!("Inserting column {} into diff table.", column.name);
            progress.update_step(&format!("Comparing column {}...", column.name));
            diff::insert_diff_table(engine, &diff_table, &joined_table, join_cols, &column.name)?;
        }

        let diff_summary = diff::get_diff_rows(
            engine,
            &diff_table,
            &joined_table,
            join_cols,
            options.max_rows_all,
            options.skip_row_total,
        )?;
        let diff_columns = diff::get_diff_columns(engine, &diff_table)?;
        let column_diffs = diff::get_column_diffs(engine, &diff_columns, &diff_table, &ctx, &column_info)?;
        (Some(diff_table), column_diffs, diff_summary)
    } else {
        let column_diffs = diff::get_column_diffs_from_joined(engine, &ctx, &compare)?;
        let diff_summary = diff::get_diff_rows_from_joined(
            engine,
            &column_diffs,
            &joined_table,
            join_cols,
            options.max_rows_all,
            options.skip_row_total,
        )?;
        (None, column_diffs, diff_summary)
    };
    progress.finish_step(&format!(
        "{} columns with differences, {} differing cells",
        column_diffs.len(),
        diff_summary.total_count
    ));

    if options.drop_output_tables {
        log::info!("Dropping output tables. WARNING: queries in the report won't work!");
        engine.execute(&sql::table_drop(&joined_table))?;
        if let Some(diff_table) = &diff_table {
            engine.execute(&sql::table_drop(diff_table))?;
        }
    }

    Ok(DiffReport {
        generated_at: Utc::now(),
        x_source: x.table,
        y_source: y.table,
        x_table,
        y_table,
        join_cols: join_cols.clone(),
        joined_table,
        diff_table,
        joined_count,
        column_info,
        dedup: DedupInfo {
            x: x_dedup,
            y: y_dedup,
        },
        unmatched,
        hierarchical,
        column_diffs,
        diff_summary,
        output_tables_dropped: options.drop_output_tables,
    })
}
