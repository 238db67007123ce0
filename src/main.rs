//! Tabular Copilot - Main Entry Point
//!
//! Runs one full workflow: intake, profiling, baseline training, planned
//! experiments, and the final report.

use clap::Parser;
use tabular_copilot::orchestrator::{Orchestrator, RunOutcome};

/// Automated tabular modeling workflow
#[derive(Parser, Debug)]
#[command(name = "tabular-copilot", version, about)]
struct Cli {
    /// Path to the input dataset (CSV or TSV)
    dataset: String,

    /// Name of the column to predict
    target: String,

    /// Session identifier for this run
    #[arg(long, default_value = "run1")]
    session_id: String,

    /// How many planner suggestions to train after the baseline
    #[arg(long, default_value_t = 1)]
    planned_runs: usize,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabular_copilot=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut orchestrator = Orchestrator::new();
    let outcome = orchestrator.run_pipeline(
        &cli.dataset,
        &cli.target,
        &cli.session_id,
        cli.planned_runs,
    )?;

    if let RunOutcome::Aborted { step, message } = outcome {
        eprintln!("Pipeline aborted during {step}: {message}");
        std::process::exit(1);
    }

    Ok(())
}
