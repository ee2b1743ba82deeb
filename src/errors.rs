// src/errors.rs

//! Crate-wide error types.
//!
//! Only *fatal* conditions live here: a malformed job graph aborts the run
//! before any job starts, and a scheduler deadlock aborts it mid-run. Per-job
//! failures are not errors; they are recorded as [`crate::exec::Outcome`]
//! values so the run can always produce a complete report.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagforgeError {
    #[error("config must contain at least one [job.<name>] section")]
    NoJobs,

    #[error("job '{0}' has an empty `commands` list")]
    NoCommands(String),

    #[error("job '{job}' has unknown dependency '{dep}' in `depends_on`")]
    UnknownDependency { job: String, dep: String },

    #[error("job '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("goal '{0}' does not name any job")]
    UnknownGoal(String),

    #[error("cycle detected in job graph involving job '{0}'")]
    Cycle(String),

    /// Internal invariant violation: jobs remain pending but none are ready.
    /// Unreachable for a validated acyclic graph with correct bookkeeping.
    #[error("scheduler deadlock: {pending} job(s) pending but none ready")]
    Deadlock { pending: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DagforgeError>;
