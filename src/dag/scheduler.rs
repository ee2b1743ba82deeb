// src/dag/scheduler.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::graph::JobGraph;
use crate::errors::{DagforgeError, Result};
use crate::exec::{run_job, FailureReason, Outcome};
use crate::workspace::WorkspaceManager;

/// Everything the process runner needs to execute one job.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub commands: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Ordered per-job outcomes of a finished run, plus the still-live workspaces
/// holding goal artifacts.
///
/// Consumed by [`crate::report::finalize`], which publishes the goal
/// artifacts and then drops (and thereby cleans up) the workspaces.
pub struct RunResults {
    pub outcomes: Vec<(String, Outcome)>,
    pub workspaces: WorkspaceManager,
}

/// Mutable run bookkeeping, owned solely by the scheduler.
///
/// Workers never touch this: batch results are merged in only after the whole
/// batch has rejoined, so there is a single writer at all times.
struct RunState {
    pending: BTreeSet<String>,
    completed: HashMap<String, Outcome>,
    /// Outcomes in completion order (the report order).
    order: Vec<(String, Outcome)>,
    workspaces: WorkspaceManager,
}

impl RunState {
    fn record(&mut self, name: String, outcome: Outcome) {
        self.pending.remove(&name);
        self.order.push((name.clone(), outcome.clone()));
        self.completed.insert(name, outcome);
    }

    fn completed_names(&self) -> HashSet<String> {
        self.completed.keys().cloned().collect()
    }
}

/// Batch-at-a-time scheduler over an immutable [`JobGraph`].
///
/// Each round it selects the lexicographically first `max_parallel` pending
/// jobs whose dependencies have completed, stages their inputs, runs them
/// concurrently, and waits for the whole batch (barrier) before merging
/// results. The first failing batch aborts every still-pending job.
pub struct Scheduler {
    graph: JobGraph,
    max_parallel: usize,
    state: RunState,
}

impl Scheduler {
    pub fn new(graph: JobGraph, max_parallel: usize) -> Self {
        let pending: BTreeSet<String> = graph.names().map(str::to_string).collect();
        Self {
            graph,
            max_parallel: max_parallel.max(1),
            state: RunState {
                pending,
                completed: HashMap::new(),
                order: Vec::new(),
                workspaces: WorkspaceManager::new(),
            },
        }
    }

    /// Drive the run to completion.
    ///
    /// Every job in the graph ends in exactly one terminal [`Outcome`]. Only
    /// the deadlock invariant violation is an error; job failures are data.
    pub async fn run(mut self) -> Result<RunResults> {
        info!(
            jobs = self.graph.len(),
            max_parallel = self.max_parallel,
            "build run started"
        );

        while !self.state.pending.is_empty() {
            let batch = self.select_batch()?;
            let results = self.dispatch(&batch).await;

            let mut batch_failed = false;
            for (name, outcome) in results {
                if !outcome.is_success() {
                    batch_failed = true;
                }
                self.state.record(name, outcome);
            }

            if batch_failed {
                self.abort_pending();
                break;
            }

            self.release_consumed();
        }

        self.release_unpublished();
        info!("build run finished");

        Ok(RunResults {
            outcomes: self.state.order,
            workspaces: self.state.workspaces,
        })
    }

    /// Pending jobs whose full dependency set has completed, truncated to the
    /// concurrency cap. Lexicographic, so batch composition is reproducible.
    fn select_batch(&self) -> Result<Vec<String>> {
        let completed = self.state.completed_names();
        let mut ready: Vec<String> = self
            .graph
            .ready(&completed)
            .into_iter()
            .filter(|name| self.state.pending.contains(name))
            .collect();

        if ready.is_empty() {
            // Unreachable for a validated acyclic graph; fail loudly rather
            // than spinning forever.
            return Err(DagforgeError::Deadlock {
                pending: self.state.pending.len(),
            });
        }

        ready.truncate(self.max_parallel);
        debug!(batch = ?ready, "selected batch");
        Ok(ready)
    }

    /// Acquire workspaces, stage inputs, and run the whole batch concurrently.
    ///
    /// Returns one outcome per batch member, in completion order. A job whose
    /// workspace cannot be prepared fails without being dispatched; the rest
    /// of the batch still runs.
    async fn dispatch(&mut self, batch: &[String]) -> Vec<(String, Outcome)> {
        let mut results = Vec::with_capacity(batch.len());
        let mut workers: JoinSet<(String, Outcome)> = JoinSet::new();

        for name in batch {
            match self.prepare(name) {
                Ok((job, workspace)) => {
                    workers.spawn(async move {
                        let name = job.name.clone();
                        let outcome = run_job(job, workspace).await;
                        (name, outcome)
                    });
                }
                Err(e) => {
                    warn!(job = %name, error = %e, "failed to prepare workspace");
                    results.push((
                        name.clone(),
                        Outcome::Failure {
                            reason: FailureReason::ExecutionError(e.to_string()),
                        },
                    ));
                }
            }
        }

        // Barrier: the whole batch finishes before any result is merged back
        // into run state.
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    // run_job converts all failures into outcomes, so this is
                    // a panic or cancellation. The missing entry will trip the
                    // deadlock invariant on the next round.
                    error!(error = %e, "batch worker failed to join");
                }
            }
        }

        results
    }

    /// Workspace + staging for one batch member, happens-before its dispatch.
    fn prepare(&mut self, name: &str) -> Result<(ScheduledJob, PathBuf)> {
        let workspace = self.state.workspaces.acquire(name)?;

        // Every dependency completed successfully, or we would have aborted
        // before selecting this job.
        let deps: Vec<(String, PathBuf)> = self
            .graph
            .dependencies_of(name)
            .iter()
            .filter_map(|dep| {
                self.state
                    .completed
                    .get(dep)
                    .and_then(|outcome| outcome.artifact())
                    .map(|path| (dep.clone(), path.to_path_buf()))
            })
            .collect();

        self.state.workspaces.stage_inputs(name, &deps)?;

        let job = ScheduledJob {
            name: name.to_string(),
            commands: self.graph.commands_of(name).to_vec(),
            timeout: self.graph.timeout_of(name),
        };

        Ok((job, workspace))
    }

    /// Fail-fast: mark every still-pending job as aborted without running it.
    fn abort_pending(&mut self) {
        let skipped: Vec<String> = self.state.pending.iter().cloned().collect();
        for name in skipped {
            warn!(job = %name, "aborting job: an earlier job in this run failed");
            self.state.record(
                name,
                Outcome::Failure {
                    reason: FailureReason::Aborted,
                },
            );
        }
    }

    /// Release workspaces of completed non-goal jobs once every dependent has
    /// completed. Goal workspaces stay until their artifact is published.
    fn release_consumed(&mut self) {
        let releasable: Vec<String> = self
            .state
            .completed
            .keys()
            .filter(|name| {
                !self.graph.goals().contains(*name)
                    && self
                        .graph
                        .dependents_of(name)
                        .iter()
                        .all(|dep| self.state.completed.contains_key(dep))
            })
            .cloned()
            .collect();

        for name in releasable {
            self.state.workspaces.release(&name);
        }
    }

    /// Terminal cleanup: release everything except the workspaces of
    /// successful goal jobs, whose artifacts the aggregator still has to copy
    /// out.
    fn release_unpublished(&mut self) {
        let names: Vec<String> = self.graph.names().map(str::to_string).collect();
        for name in names {
            let publishable = self.graph.goals().contains(&name)
                && self
                    .state
                    .completed
                    .get(&name)
                    .is_some_and(Outcome::is_success);
            if !publishable {
                self.state.workspaces.release(&name);
            }
        }
    }
}
