// src/main.rs

use dagforge::report::BuildState;
use dagforge::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(overall) => {
            if overall == BuildState::Failure {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("dagforge error: {err:?}");
            std::process::exit(2);
        }
    }
}

async fn run_main() -> anyhow::Result<BuildState> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let Some(report) = run(args).await? else {
        // Dry run: nothing executed, nothing to report.
        return Ok(BuildState::Success);
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.state)
}
