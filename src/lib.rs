// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod workspace;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{JobGraph, Scheduler};
use crate::errors::Result;
use crate::report::BuildReport;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + validation
/// - output directory preparation
/// - job graph + scheduler
/// - result aggregation
///
/// Returns `None` in `--dry-run` mode; otherwise the final [`BuildReport`],
/// which the caller is responsible for printing.
pub async fn run(args: CliArgs) -> Result<Option<BuildReport>> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(None);
    }

    let output_dir = prepare_output_dir(Path::new(&args.artifacts_dir))?;
    info!(output_dir = %output_dir.display(), "publishing goal artifacts here");

    let graph = JobGraph::from_config(&cfg);
    let goals = graph.goals().clone();

    let scheduler = Scheduler::new(graph, args.max_parallel);
    let results = scheduler.run().await?;

    let report = report::finalize(results, &goals, &output_dir)?;
    Ok(Some(report))
}

/// Create the artifacts directory if needed and resolve it to an absolute
/// path; the aggregator requires an existing, writable directory.
fn prepare_output_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let absolute = fs::canonicalize(dir)?;
    Ok(absolute)
}

/// Simple dry-run output: print jobs, deps, timeouts, commands and goals.
fn print_dry_run(cfg: &ConfigFile) {
    println!("dagforge dry-run");
    println!("  goals: {:?}", cfg.goals);
    println!();

    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        for cmd in &job.commands {
            println!("      cmd: {cmd}");
        }
        if !job.depends_on.is_empty() {
            println!("      depends_on: {:?}", job.depends_on);
        }
        if let Some(timeout) = job.timeout {
            println!("      timeout: {timeout}s");
        }
    }

    debug!("dry-run complete (no execution)");
}
