//! # dbdiff
//!
//! Compares two database tables row by row and column by column. All the
//! heavy lifting (joins, deduplication, aggregation) runs as SQL inside
//! DuckDB; this crate decides which statements to run and folds the results
//! into a [`DiffReport`].

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod frame;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod sql;

pub use config::DiffOptions;
pub use engine::DiffEngine;
pub use error::{DbdiffError, Result};
pub use frame::Frame;
pub use pipeline::run_diff;
pub use report::DiffReport;
