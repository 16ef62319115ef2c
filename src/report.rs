//! The report produced by one comparison run

use crate::catalog::ColumnMatchTable;
use crate::diff::{ColumnDiff, DiffSummary, HierarchicalJoinInfo, UnmatchedRows};
use crate::error::Result;
use crate::sql::TableRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Duplicate keys found on one side before the join
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupSide {
    /// Rows minus distinct key tuples
    pub count: u64,
    /// Where the unique-key rows were written, if deduplication ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_table: Option<TableRef>,
}

impl DedupSide {
    pub fn has_duplicates(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupInfo {
    pub x: DedupSide,
    pub y: DedupSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub generated_at: DateTime<Utc>,
    /// Tables as given, before deduplication
    pub x_source: TableRef,
    pub y_source: TableRef,
    /// Tables actually joined
    pub x_table: TableRef,
    pub y_table: TableRef,
    pub join_cols: Vec<String>,
    pub joined_table: TableRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_table: Option<TableRef>,
    /// Rows in the joined table
    pub joined_count: u64,
    pub column_info: ColumnMatchTable,
    pub dedup: DedupInfo,
    pub unmatched: UnmatchedRows,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical: Option<HierarchicalJoinInfo>,
    /// Columns with differences, most differences first
    pub column_diffs: Vec<ColumnDiff>,
    pub diff_summary: DiffSummary,
    /// Output tables were dropped; stored queries against them no longer run
    pub output_tables_dropped: bool,
}

impl DiffReport {
    /// Non-key columns that were compared
    pub fn compared_column_count(&self) -> usize {
        self.column_info.compare_columns(&self.join_cols).len()
    }

    pub fn max_differences(&self) -> u64 {
        self.column_diffs.first().map(|c| c.count).unwrap_or(0)
    }

    pub fn uncomparable_columns(&self) -> Vec<String> {
        self.column_info
            .uncomparable()
            .into_iter()
            .map(|c| c.column_name.clone())
            .collect()
    }

    pub fn has_differences(&self) -> bool {
        !self.column_diffs.is_empty()
            || self.unmatched.x_only.count > 0
            || self.unmatched.y_only.count > 0
    }

    /// One plain sentence per finding
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Joined {} and {} on {}: {} rows.",
            self.x_table,
            self.y_table,
            self.join_cols.join(", "),
            self.joined_count
        )];

        for (side, source) in [(&self.dedup.x, &self.x_source), (&self.dedup.y, &self.y_source)] {
            if side.has_duplicates() {
                lines.push(format!(
                    "{} has {} rows beyond the distinct join keys; duplicated keys were left out of the join.",
                    source, side.count
                ));
            }
        }

        lines.push(format!(
            "{} rows of {} have no match in {}.",
            self.unmatched.x_only.count, self.x_table, self.y_table
        ));
        lines.push(format!(
            "{} rows of {} have no match in {}.",
            self.unmatched.y_only.count, self.y_table, self.x_table
        ));

        lines.push(format!(
            "{} of {} compared columns have differences, {} differing cells in total.",
            self.column_diffs.len(),
            self.compared_column_count(),
            self.diff_summary.total_count
        ));
        if let Some(count) = self.diff_summary.count {
            lines.push(format!("{} joined rows differ in at least one column.", count));
        }

        let uncomparable = self.uncomparable_columns();
        if !uncomparable.is_empty() {
            lines.push(format!(
                "Not compared because of incompatible types: {}.",
                uncomparable.join(", ")
            ));
        }

        lines
    }

    pub fn json_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_diff_summary.json", self.x_table.table))
    }

    /// Write the report as pretty JSON into `dir`, returning the file path
    pub fn save_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = self.json_path(dir);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        log::info!("Saved diff summary to {}", path.display());
        Ok(path)
    }
}
