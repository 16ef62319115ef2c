//! Command implementation for the dbdiff CLI

use crate::cli::{Cli, OutputFormat};
use crate::engine::DiffEngine;
use crate::error::Result;
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::pipeline::run_diff;
use crate::progress::ProgressReporter;
use crate::report::DiffReport;
use anyhow::Context;

/// Execute a comparison described by the parsed command line
pub fn execute_command(cli: &Cli) -> Result<DiffReport> {
    let settings = cli.engine_settings();
    let options = cli.diff_options()?;
    let engine = DiffEngine::open(&settings)?;

    let mut progress = if cli.quiet {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new_for_diff()
    };
    let report = run_diff(&engine, &options, &mut progress)?;
    progress.finish_all("Done");
    log::debug!("Diff finished in {:.2?}", progress.elapsed());
    drop(progress);

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::format(&report)?),
        OutputFormat::Pretty if cli.quiet => PrettyPrinter::print_summary_lines(&report),
        OutputFormat::Pretty => PrettyPrinter::print_report(&report),
    }

    if cli.save_json_summary {
        let path = report.save_json(&options.output_dir)?;
        if !cli.quiet {
            println!();
            println!("✅ Saved diff summary to {}", path.display());
        }
    }

    Ok(report)
}

/// Execute the command, naming the compared tables in any error
pub fn run(cli: &Cli) -> anyhow::Result<DiffReport> {
    execute_command(cli).with_context(|| {
        format!(
            "Comparing {}.{} with {} on {}",
            cli.schema, cli.x_table, cli.y_table, cli.join_cols
        )
    })
}
