//! Output formatting utilities

use crate::diff::{ColumnDiff, HierarchicalJoinInfo, SideSample};
use crate::error::Result;
use crate::frame::Frame;
use crate::report::DiffReport;

/// Pretty printer for dbdiff output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the whole report: overview tree, then samples
    pub fn print_report(report: &DiffReport) {
        Self::print_overview(report);
        Self::print_unmatched(report);
        if let Some(hierarchical) = &report.hierarchical {
            Self::print_hierarchical(hierarchical);
        }
        Self::print_column_diffs(&report.column_diffs);
        if let Some(sample) = &report.diff_summary.sample {
            if !sample.is_empty() {
                println!();
                println!("📋 Sample rows with differences:");
                println!("{}", sample);
            }
        }
    }

    /// Print the summary tree
    pub fn print_overview(report: &DiffReport) {
        println!("🔍 Diff Results: {} → {}", report.x_table, report.y_table);
        println!("├─ Join columns: {}", report.join_cols.join(", "));
        println!("├─ Joined rows: {} ({})", report.joined_count, report.joined_table);

        for (label, side, source) in [
            ("x", &report.dedup.x, &report.x_source),
            ("y", &report.dedup.y, &report.y_source),
        ] {
            if side.has_duplicates() {
                println!("├─ ❌ Duplicate keys in {} ({}): {}", label, source, side.count);
                if let Some(dedup) = &side.dedup_table {
                    println!("│  └─ Compared unique rows from {}", dedup);
                }
            }
        }

        let x_only = report.unmatched.x_only.count;
        let y_only = report.unmatched.y_only.count;
        if x_only + y_only > 0 {
            println!("├─ ❌ Unmatched rows");
            println!("│  ├─ Only in x: {}", x_only);
            println!("│  └─ Only in y: {}", y_only);
        } else {
            println!("├─ ✅ Unmatched rows: none");
        }

        let uncomparable = report.uncomparable_columns();
        if !uncomparable.is_empty() {
            println!("├─ ⚠️  Incompatible columns: {}", uncomparable.join(", "));
        }

        if report.column_diffs.is_empty() {
            println!("├─ ✅ Columns: all {} matched", report.compared_column_count());
        } else {
            println!(
                "├─ ❌ Columns with differences: {} of {}",
                report.column_diffs.len(),
                report.compared_column_count()
            );
            for (i, diff) in report.column_diffs.iter().enumerate() {
                let prefix = if i == report.column_diffs.len() - 1 { "│  └─" } else { "│  ├─" };
                println!("{} {}: {}", prefix, diff.column_name, diff.count);
            }
        }

        match report.diff_summary.count {
            Some(count) => {
                println!("├─ Differing cells: {}", report.diff_summary.total_count);
                println!("└─ Rows with differences: {}", count);
            }
            None => println!("└─ Differing cells: {}", report.diff_summary.total_count),
        }

        if report.output_tables_dropped {
            println!();
            println!("🟡 Output tables were dropped; the stored queries will not run.");
        }
    }

    fn print_side_sample(title: &str, side: &SideSample) {
        if side.count == 0 {
            return;
        }
        println!("{} ({}):", title, side.count);
        print_frame(&side.sample);
        if let Some(grouped) = &side.sample_grouped {
            println!("Grouped:");
            print_frame(grouped);
        }
    }

    fn print_unmatched(report: &DiffReport) {
        let unmatched = &report.unmatched;
        if unmatched.x_only.count + unmatched.y_only.count == 0 {
            return;
        }
        println!();
        println!("🧩 Unmatched keys");
        Self::print_side_sample(&format!("Only in {}", report.x_table), &unmatched.x_only);
        Self::print_side_sample(&format!("Only in {}", report.y_table), &unmatched.y_only);
    }

    fn print_hierarchical(hierarchical: &HierarchicalJoinInfo) {
        println!();
        println!("🪜 Unmatched keys per join column");
        for (column, unmatched) in hierarchical {
            println!(
                "{}: only in x {}, only in y {}",
                column, unmatched.x_only.count, unmatched.y_only.count
            );
            Self::print_side_sample("Only in x", &unmatched.x_only);
            Self::print_side_sample("Only in y", &unmatched.y_only);
        }
    }

    /// Grouped and raw samples per differing column
    pub fn print_column_diffs(column_diffs: &[ColumnDiff]) {
        for diff in column_diffs {
            println!();
            println!("📊 {} ({} differences)", diff.column_name, diff.count);
            println!("Grouped:");
            print_frame(&diff.grouped.sample);
            println!("Raw:");
            print_frame(&diff.raw.sample);
            if let Some(numeric) = &diff.numeric {
                println!("Differences in {} buckets:", numeric.tiles);
                print_frame(&numeric.binned.sample);
            }
        }
    }

    /// One line per finding, for quiet mode
    pub fn print_summary_lines(report: &DiffReport) {
        for line in report.summary_lines() {
            println!("{}", line);
        }
    }
}

fn print_frame(frame: &Frame) {
    if frame.is_empty() {
        println!("(no rows)");
    } else {
        println!("{}", frame);
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}
