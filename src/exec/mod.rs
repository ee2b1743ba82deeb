// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs a job's shell commands strictly in order inside its workspace using
//! `tokio::process::Command`, enforcing the job's cumulative time budget and
//! discovering the produced artifact. No dependency or scheduling logic lives
//! here; the scheduler owns that.

pub mod runner;

pub use runner::{run_job, FailureReason, Outcome};
