// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the immutable job graph: commands, timeouts, dependency
//!   edges and the goal set.
//! - [`scheduler`] contains the batch-at-a-time run loop that decides which
//!   jobs are ready, dispatches them under the concurrency cap, and applies
//!   the fail-fast abort rule.

pub mod graph;
pub mod scheduler;

pub use graph::JobGraph;
pub use scheduler::{RunResults, ScheduledJob, Scheduler};
