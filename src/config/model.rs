// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// goals = ["link"]
///
/// [job.compile]
/// commands = ["cc -c ../main.c -o main.o"]
/// timeout = 30
///
/// [job.link]
/// commands = ["cc input/compile -o app"]
/// depends_on = ["compile"]
/// ```
///
/// Keying jobs by table name gives unique names for free and a stable
/// lexicographic iteration order.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Names of the jobs whose artifact must be published to the output
    /// directory. May be empty; every name must resolve to a job.
    #[serde(default)]
    pub goals: Vec<String>,

    /// All jobs from `[job.<name>]`.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Shell command lines executed strictly in order inside the job's
    /// workspace. Must be non-empty.
    pub commands: Vec<String>,

    /// Jobs whose artifacts this one consumes. Each is staged into the
    /// workspace's `input/` area before any command runs.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Time budget in seconds for the *whole* command sequence.
    /// `None` means unbounded.
    #[serde(default)]
    pub timeout: Option<u64>,
}
