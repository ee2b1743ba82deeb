// src/report.rs

//! Result aggregation: turn per-job outcomes into the final build report and
//! publish goal artifacts.
//!
//! This is the only writer of the output directory, and it runs
//! single-threaded after the scheduler is done.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::dag::scheduler::RunResults;
use crate::errors::Result;
use crate::exec::Outcome;

/// Overall or per-job terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Success,
    Failure,
}

/// One report entry per job, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub state: BuildState,
    /// Published artifact path; present only for successful goal jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Final output of a run. Covers every job exactly once; aborted jobs appear
/// after the jobs that actually ran.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub state: BuildState,
    pub jobs: Vec<JobReport>,
}

/// Build the final report and publish goal artifacts into `output_dir`.
///
/// Each successful goal's artifact is copied to `output_dir/<job-name>`,
/// overwriting any file already there, so re-running a build is idempotent.
/// A single failed job (goal or not) degrades the whole run to `failure`,
/// but every job still gets its own entry. Consuming `RunResults` drops the
/// workspace manager once the copies are done, which releases every
/// remaining workspace.
pub fn finalize(
    results: RunResults,
    goals: &BTreeSet<String>,
    output_dir: &Path,
) -> Result<BuildReport> {
    let mut jobs = Vec::with_capacity(results.outcomes.len());
    let mut any_failure = false;

    for (name, outcome) in &results.outcomes {
        let is_goal = goals.contains(name);
        let mut artifact = None;

        match outcome {
            Outcome::Success { artifact: produced } => {
                if is_goal {
                    let published = output_dir.join(name);
                    fs::copy(produced, &published)?;
                    info!(
                        job = %name,
                        artifact = %published.display(),
                        "published goal artifact"
                    );
                    artifact = Some(published);
                }
            }
            Outcome::Failure { reason } => {
                warn!(job = %name, reason = ?reason, "job did not produce an artifact");
                any_failure = true;
            }
        }

        jobs.push(JobReport {
            name: name.clone(),
            state: if outcome.is_success() {
                BuildState::Success
            } else {
                BuildState::Failure
            },
            artifact,
        });
    }

    Ok(BuildReport {
        state: if any_failure {
            BuildState::Failure
        } else {
            BuildState::Success
        },
        jobs,
    })
}
