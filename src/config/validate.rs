// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::errors::{DagforgeError, Result};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one job
/// - every job has at least one command
/// - all `depends_on` entries refer to existing jobs (and not to themselves)
/// - all goals refer to existing jobs
/// - the job graph has no cycles
///
/// It does **not** inspect the command strings themselves; they are opaque
/// shell lines until the process runner executes them.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_commands(cfg)?;
    validate_dependencies(cfg)?;
    validate_goals(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &ConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(DagforgeError::NoJobs);
    }
    Ok(())
}

fn validate_commands(cfg: &ConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if job.commands.is_empty() {
            return Err(DagforgeError::NoCommands(name.clone()));
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        for dep in job.depends_on.iter() {
            if !cfg.job.contains_key(dep) {
                return Err(DagforgeError::UnknownDependency {
                    job: name.clone(),
                    dep: dep.clone(),
                });
            }
            if dep == name {
                return Err(DagforgeError::SelfDependency(name.clone()));
            }
        }
    }
    Ok(())
}

fn validate_goals(cfg: &ConfigFile) -> Result<()> {
    for goal in cfg.goals.iter() {
        if !cfg.job.contains_key(goal) {
            return Err(DagforgeError::UnknownGoal(goal.clone()));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    // Build a petgraph graph from the jobs and their dependencies.
    //
    // Edge direction: dep -> job
    // For:
    //   [job.b]
    //   depends_on = ["a"]
    // we add edge a -> b.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        for dep in job.depends_on.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort fails iff there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DagforgeError::Cycle(cycle.node_id().to_string())),
    }
}
