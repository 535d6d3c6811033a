use anyhow::{bail, Context};
use clap::Parser;
use jobs::{SolveJobs, SolvePoll};
use sched_core::{ConstraintWeights, Dataset, EngineConfig, InMemoryProvider};
use solver_cp::CpSolver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::ScheduleId;

/// Solves a school timetable from a JSON dataset and prints the result.
///
/// Engine defaults come from `TIMETABLE__*` environment variables; the flags
/// below override them for this run.
#[derive(Parser)]
#[command(name = "timetable")]
struct Cli {
    /// Dataset file: grid, teachers, subjects, classes, rooms, locked lessons.
    #[arg(long)]
    input: PathBuf,

    #[arg(long, default_value = "default")]
    schedule: String,

    #[arg(long)]
    time_limit_ms: Option<u64>,

    #[arg(long)]
    node_limit: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    workers: Option<usize>,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = EngineConfig::from_env()?;

    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let mut dataset = Dataset::from_json(&text)
        .with_context(|| format!("parsing {}", cli.input.display()))?;
    if dataset.weights.is_none() {
        dataset.weights = Some(ConstraintWeights::recommended());
    }

    let mut params = cfg.solve_params();
    if let Some(ms) = cli.time_limit_ms {
        params.time_limit_ms = ms;
    }
    if cli.node_limit.is_some() {
        params.node_limit = cli.node_limit;
    }
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(workers) = cli.workers {
        params.workers = workers.max(1);
    }

    let jobs = SolveJobs::new(
        Arc::new(InMemoryProvider::new(dataset)),
        Arc::new(CpSolver::new()),
        cfg.jobs.clone(),
    );
    let id = jobs.submit_solve(ScheduleId::new(cli.schedule), params)?;

    let on_interrupt = jobs.clone();
    let interrupted = id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(job = %interrupted, "interrupted, cancelling solve");
            on_interrupt.cancel(&interrupted);
        }
    });

    let result = match jobs.wait(&id, Duration::from_millis(50)).await {
        Some(SolvePoll::Finished(result)) => result,
        Some(SolvePoll::Failed { message }) => bail!("solve failed: {message}"),
        Some(SolvePoll::InProgress { .. }) | None => bail!("job {id} vanished"),
    };

    let out = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{out}");
    Ok(())
}
