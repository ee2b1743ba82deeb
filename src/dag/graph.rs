// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use crate::config::model::ConfigFile;

/// Internal node structure: the job's descriptor plus adjacency information.
#[derive(Debug, Clone)]
struct JobNode {
    /// Shell command lines, executed strictly in order.
    commands: Vec<String>,
    /// Time budget for the whole command sequence; `None` means unbounded.
    timeout: Option<Duration>,
    /// Direct dependencies: jobs whose artifacts this one consumes.
    deps: Vec<String>,
    /// Direct dependents: jobs that depend on this one.
    dependents: Vec<String>,
}

/// Immutable in-memory job graph keyed by job name, plus the goal set.
///
/// This is intentionally lightweight; acyclicity and name resolution are
/// already validated in `config::validate`, so here we just keep adjacency
/// information for scheduling and diagnostics. Read-only after construction,
/// so it is safe to share across workers.
#[derive(Debug, Clone)]
pub struct JobGraph {
    nodes: BTreeMap<String, JobNode>,
    goals: BTreeSet<String>,
}

impl JobGraph {
    /// Build a job graph from a validated [`ConfigFile`].
    ///
    /// Assumes that:
    /// - all `depends_on` and goal references are valid
    /// - there are no cycles
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut nodes: BTreeMap<String, JobNode> = BTreeMap::new();

        // First pass: create nodes with their dependency lists.
        for (name, job) in cfg.job.iter() {
            nodes.insert(
                name.clone(),
                JobNode {
                    commands: job.commands.clone(),
                    timeout: job.timeout.map(Duration::from_secs),
                    deps: job.depends_on.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: populate dependents based on deps.
        let names: Vec<String> = nodes.keys().cloned().collect();
        for name in names {
            // clone to avoid borrowing issues while mutating
            let deps = nodes
                .get(&name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        Self {
            nodes,
            goals: cfg.goals.iter().cloned().collect(),
        }
    }

    /// All job names, in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The set of jobs whose artifact must be published.
    pub fn goals(&self) -> &BTreeSet<String> {
        &self.goals
    }

    /// Immediate dependencies of a job (the names in its `depends_on`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a job (jobs that list this one in `depends_on`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Command sequence for a job.
    pub fn commands_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.commands.as_slice())
            .unwrap_or(&[])
    }

    /// Timeout budget for a job, if any.
    pub fn timeout_of(&self, name: &str) -> Option<Duration> {
        self.nodes.get(name).and_then(|n| n.timeout)
    }

    /// All jobs not yet completed whose full dependency set is contained in
    /// `completed`, in lexicographic order.
    ///
    /// Kahn-style readiness via set membership: no recursion, no stack-depth
    /// risk on large graphs.
    pub fn ready(&self, completed: &HashSet<String>) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(name, node)| {
                !completed.contains(name.as_str())
                    && node.deps.iter().all(|d| completed.contains(d))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}
