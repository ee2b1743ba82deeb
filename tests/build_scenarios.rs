use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Instant;

use tempfile::TempDir;

use dagforge::config::{validate_config, ConfigFile, JobConfig};
use dagforge::dag::{JobGraph, Scheduler};
use dagforge::exec::{FailureReason, Outcome};
use dagforge::report::{finalize, BuildReport, BuildState};

type TestResult = Result<(), Box<dyn Error>>;

fn job(commands: &[&str], depends_on: &[&str], timeout: Option<u64>) -> JobConfig {
    JobConfig {
        commands: commands.iter().map(|s| s.to_string()).collect(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        timeout,
    }
}

fn config(jobs: Vec<(&str, JobConfig)>, goals: &[&str]) -> ConfigFile {
    let mut map = BTreeMap::new();
    for (name, jc) in jobs {
        map.insert(name.to_string(), jc);
    }
    ConfigFile {
        goals: goals.iter().map(|s| s.to_string()).collect(),
        job: map,
    }
}

/// Validate, run the scheduler, finalize. Returns the raw outcomes (for
/// failure-reason assertions) alongside the published report.
async fn run_build(
    cfg: &ConfigFile,
    max_parallel: usize,
    out_dir: &Path,
) -> Result<(Vec<(String, Outcome)>, BuildReport), Box<dyn Error>> {
    validate_config(cfg)?;
    let graph = JobGraph::from_config(cfg);
    let goals = graph.goals().clone();
    let results = Scheduler::new(graph, max_parallel).run().await?;
    let outcomes = results.outcomes.clone();
    let report = finalize(results, &goals, out_dir)?;
    Ok((outcomes, report))
}

fn reason_of<'a>(outcomes: &'a [(String, Outcome)], name: &str) -> &'a FailureReason {
    outcomes
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, o)| match o {
            Outcome::Failure { reason } => Some(reason),
            Outcome::Success { .. } => None,
        })
        .unwrap_or_else(|| panic!("expected a failure outcome for job '{name}'"))
}

#[tokio::test]
async fn single_echo_goal_publishes_artifact() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(vec![("a", job(&["echo x > out.txt"], &[], None))], &["a"]);

    let (_outcomes, report) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(report.state, BuildState::Success);
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].name, "a");
    assert_eq!(report.jobs[0].state, BuildState::Success);

    let artifact = report.jobs[0].artifact.clone().expect("published artifact");
    assert_eq!(artifact, out.path().join("a"));
    assert_eq!(fs::read_to_string(&artifact)?, "x\n");
    Ok(())
}

#[tokio::test]
async fn failed_job_aborts_dependents_without_running_them() -> TestResult {
    let out = TempDir::new()?;
    let marker = out.path().join("b_ran");
    let touch = format!("touch {}", marker.display());

    let cfg = config(
        vec![
            ("a", job(&["exit 1"], &[], None)),
            ("b", job(&[touch.as_str()], &["a"], None)),
            ("c", job(&["true"], &["b"], None)),
        ],
        &["c"],
    );

    let (outcomes, report) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "a"), FailureReason::ExitCode(1));
    assert_eq!(*reason_of(&outcomes, "b"), FailureReason::Aborted);
    assert_eq!(*reason_of(&outcomes, "c"), FailureReason::Aborted);

    // b's command never ran.
    assert!(!marker.exists());

    // Every job appears exactly once; aborted jobs after the real completion.
    let names: Vec<&str> = report.jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    Ok(())
}

#[tokio::test]
async fn timeout_kills_a_sleeping_job() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(vec![("a", job(&["sleep 5"], &[], Some(1)))], &["a"]);

    let start = Instant::now();
    let (outcomes, report) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "a"), FailureReason::Timeout);
    // Killed at the 1s deadline, not after the full 5s sleep.
    assert!(start.elapsed().as_secs() < 4);
    Ok(())
}

#[tokio::test]
async fn timeout_budget_is_cumulative_across_commands() -> TestResult {
    let out = TempDir::new()?;
    // First command consumes ~1.2s of the 2s budget and succeeds; the second
    // needs another 1.2s but only ~0.8s remain.
    let cfg = config(
        vec![(
            "a",
            job(
                &["sleep 1.2; echo one > out.txt", "sleep 1.2"],
                &[],
                Some(2),
            ),
        )],
        &["a"],
    );

    let (outcomes, report) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "a"), FailureReason::Timeout);
    Ok(())
}

#[tokio::test]
async fn multiple_output_files_are_ambiguous() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(
        vec![(
            "a",
            job(&["echo 1 > one.txt", "echo 2 > two.txt"], &[], None),
        )],
        &["a"],
    );

    let (outcomes, report) = run_build(&cfg, 3, out.path()).await?;
    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "a"), FailureReason::ArtifactAmbiguous);
    Ok(())
}

#[tokio::test]
async fn zero_output_files_are_ambiguous_too() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(vec![("a", job(&["true"], &[], None))], &["a"]);

    let (outcomes, report) = run_build(&cfg, 3, out.path()).await?;
    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "a"), FailureReason::ArtifactAmbiguous);
    Ok(())
}

#[tokio::test]
async fn dependency_artifact_is_staged_into_input_area() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(
        vec![
            ("a", job(&["printf payload > out.bin"], &[], None)),
            // Consumes the staged copy under its dependency's name.
            ("b", job(&["cp input/a final.bin"], &["a"], None)),
        ],
        &["b"],
    );

    let (_outcomes, report) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(report.state, BuildState::Success);
    let published = out.path().join("b");
    assert_eq!(fs::read_to_string(&published)?, "payload");
    Ok(())
}

#[tokio::test]
async fn republishing_the_same_goal_overwrites() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(vec![("a", job(&["echo x > out.txt"], &[], None))], &["a"]);

    let (_, first) = run_build(&cfg, 3, out.path()).await?;
    let (_, second) = run_build(&cfg, 3, out.path()).await?;

    assert_eq!(first.state, BuildState::Success);
    assert_eq!(second.state, BuildState::Success);
    assert_eq!(fs::read_to_string(out.path().join("a"))?, "x\n");
    Ok(())
}

#[tokio::test]
async fn concurrency_cap_bounds_each_batch() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(
        vec![
            ("a", job(&["echo a > out.txt"], &[], None)),
            ("b", job(&["echo b > out.txt"], &[], None)),
            ("c", job(&["echo c > out.txt"], &[], None)),
        ],
        &[],
    );

    let (_outcomes, report) = run_build(&cfg, 2, out.path()).await?;

    assert_eq!(report.state, BuildState::Success);
    assert_eq!(report.jobs.len(), 3);

    // With a cap of 2 the first batch is {a, b} (lexicographic); c only runs
    // in the second round, so it completes last.
    let mut first_batch: Vec<&str> = report.jobs[..2].iter().map(|j| j.name.as_str()).collect();
    first_batch.sort();
    assert_eq!(first_batch, vec!["a", "b"]);
    assert_eq!(report.jobs[2].name, "c");

    // No goals: nothing published, vacuous success.
    assert!(report.jobs.iter().all(|j| j.artifact.is_none()));
    Ok(())
}

#[tokio::test]
async fn successful_goal_is_published_even_when_the_run_fails() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(
        vec![
            ("apple", job(&["echo ok > out.txt"], &[], None)),
            ("zfail", job(&["exit 3"], &[], None)),
        ],
        &["apple"],
    );

    let (outcomes, report) = run_build(&cfg, 2, out.path()).await?;

    assert_eq!(report.state, BuildState::Failure);
    assert_eq!(*reason_of(&outcomes, "zfail"), FailureReason::ExitCode(3));

    let apple = report
        .jobs
        .iter()
        .find(|j| j.name == "apple")
        .expect("apple entry");
    assert_eq!(apple.state, BuildState::Success);
    let artifact = apple.artifact.clone().expect("published artifact");
    assert_eq!(fs::read_to_string(&artifact)?, "ok\n");
    Ok(())
}

#[tokio::test]
async fn diamond_runs_to_completion_with_cap_one() -> TestResult {
    let out = TempDir::new()?;
    let cfg = config(
        vec![
            ("a", job(&["echo a > out.txt"], &[], None)),
            ("b", job(&["cp input/a b.txt"], &["a"], None)),
            ("c", job(&["cp input/a c.txt"], &["a"], None)),
            ("d", job(&["cat input/b input/c > d.txt"], &["b", "c"], None)),
        ],
        &["d"],
    );

    let (_outcomes, report) = run_build(&cfg, 1, out.path()).await?;

    assert_eq!(report.state, BuildState::Success);
    assert_eq!(report.jobs.len(), 4);
    assert_eq!(fs::read_to_string(out.path().join("d"))?, "a\na\n");
    Ok(())
}
