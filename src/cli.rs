// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dagforge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagforge",
    version,
    about = "Run a DAG of build jobs and publish goal artifacts.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Dagforge.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Dagforge.toml")]
    pub config: String,

    /// Directory goal artifacts are published to. Created if missing.
    #[arg(long, value_name = "PATH", default_value = "artifacts")]
    pub artifacts_dir: String,

    /// Maximum number of jobs running concurrently.
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_parallel: usize,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGFORGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the job graph, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
