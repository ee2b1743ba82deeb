// src/exec/runner.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::dag::scheduler::ScheduledJob;

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The cumulative time budget for the command sequence ran out.
    Timeout,
    /// A command exited with a non-zero status.
    ExitCode(i32),
    /// A command could not be launched, or an unexpected system error occurred.
    ExecutionError(String),
    /// Zero or more than one top-level output file where exactly one was
    /// expected.
    ArtifactAmbiguous,
    /// The job never ran because an earlier job in the same run failed.
    Aborted,
}

/// Terminal result of one job. Recorded once, never overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { artifact: PathBuf },
    Failure { reason: FailureReason },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Outcome::Success { artifact } => Some(artifact),
            Outcome::Failure { .. } => None,
        }
    }
}

/// Run a single job's command sequence inside its workspace.
///
/// The timeout is a budget for the *whole* sequence: the wall-clock time each
/// command consumes is subtracted from the remaining budget, even on success.
/// The first failing command ends the job; later commands never run. All
/// failures are turned into an [`Outcome`], never propagated.
pub async fn run_job(job: ScheduledJob, workspace: PathBuf) -> Outcome {
    info!(job = %job.name, commands = job.commands.len(), "starting job");

    let mut budget = job.timeout;

    for command in &job.commands {
        match run_command(&job.name, command, &workspace, budget).await {
            Ok(consumed) => {
                if let Some(remaining) = budget {
                    budget = Some(remaining.saturating_sub(consumed));
                }
            }
            Err(reason) => return Outcome::Failure { reason },
        }
    }

    match find_artifact(&job.name, &workspace) {
        Ok(artifact) => {
            info!(job = %job.name, artifact = %artifact.display(), "job succeeded");
            Outcome::Success { artifact }
        }
        Err(reason) => Outcome::Failure { reason },
    }
}

/// Run one shell command with at most `budget` of wall-clock time.
///
/// Returns the time the command consumed on success, so the caller can charge
/// it against the job's remaining budget.
async fn run_command(
    job: &str,
    command: &str,
    workspace: &Path,
    budget: Option<Duration>,
) -> Result<Duration, FailureReason> {
    debug!(job = %job, cmd = %command, remaining = ?budget, "running command");

    let mut cmd = shell_command(command);
    cmd.current_dir(workspace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Put the shell in its own process group so a timeout can take down the
    // whole tree, not just the shell.
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|e| FailureReason::ExecutionError(format!("spawning `{command}`: {e}")))?;

    spawn_line_logger(job, "stdout", child.stdout.take());
    spawn_line_logger(job, "stderr", child.stderr.take());

    let waited = match budget {
        None => child.wait().await,
        Some(remaining) => match timeout(remaining, child.wait()).await {
            Ok(res) => res,
            Err(_elapsed) => {
                warn!(
                    job = %job,
                    cmd = %command,
                    "command exceeded the job's remaining time budget; killing process tree"
                );
                kill_process_tree(&mut child).await;
                return Err(FailureReason::Timeout);
            }
        },
    };

    let status = waited
        .map_err(|e| FailureReason::ExecutionError(format!("waiting for `{command}`: {e}")))?;

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        warn!(job = %job, cmd = %command, exit_code = code, "command failed");
        return Err(FailureReason::ExitCode(code));
    }

    Ok(start.elapsed())
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

/// Consume a child output stream, logging each line at debug level.
fn spawn_line_logger<R>(job: &str, stream: &'static str, source: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(source) = source else { return };
    let job = job.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(source).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job = %job, "{stream}: {line}");
        }
    });
}

/// Forcibly terminate a timed-out command and everything it spawned.
async fn kill_process_tree(child: &mut Child) {
    // The shell is its own process group leader (process_group(0) at spawn),
    // so signalling the group takes down grandchildren too.
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }

    // Kill + reap the direct child; on unix this is usually already dead from
    // the group signal.
    if let Err(e) = child.kill().await {
        debug!(error = %e, "killing timed-out child failed (it may have already exited)");
    }
}

/// After a fully successful command sequence, exactly one regular file is
/// expected at the workspace top level; that file is the job's artifact.
///
/// Directories are never artifacts, which also excludes the staged `input/`
/// area.
fn find_artifact(job: &str, workspace: &Path) -> Result<PathBuf, FailureReason> {
    let entries = fs::read_dir(workspace)
        .map_err(|e| FailureReason::ExecutionError(format!("reading workspace: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| FailureReason::ExecutionError(format!("reading workspace: {e}")))?;
        let file_type = entry
            .file_type()
            .map_err(|e| FailureReason::ExecutionError(format!("reading workspace: {e}")))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }

    if files.len() == 1 {
        Ok(files.remove(0))
    } else {
        warn!(
            job = %job,
            found = files.len(),
            "expected exactly one top-level output file"
        );
        Err(FailureReason::ArtifactAmbiguous)
    }
}
