//! Insightflow CLI entry point.
//!
//! This binary is the composition root for the whole system:
//!
//! 1. **Parse configuration**: load the TOML file named by `--config` and
//!    validate it.
//! 2. **Wire observability**: install `tracing-subscriber` with a JSON layer
//!    and, when `[telemetry].otlp_endpoint` is set, an OpenTelemetry OTLP
//!    exporter. Every span and event emitted by the workspace flows through
//!    this subscriber.
//! 3. **Construct infrastructure**: the JSON-file catalog, the reasoning
//!    provider, the analytics engine client and the checkpoint store, injected
//!    into `PipelineExecutor`.
//! 4. **Dispatch**: start a run, resume one, or inspect the catalog. Results
//!    are printed to stdout as JSON; logs go to stderr.

mod app;
mod config;
mod telemetry;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pipeline::{ExecutionId, PipelineRunId};
use serde::Serialize;
use tracing::error;

use crate::app::App;
use crate::config::CliConfig;
use crate::telemetry::Telemetry;

#[derive(Parser)]
#[command(name = "insightflow", version, about = "Graph analytics from requirements to reports")]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = "insightflow.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new pipeline run
    Run,
    /// Continue a run from its last checkpoint
    Resume {
        /// Run identifier printed by `run`
        run_id: PipelineRunId,
    },
    /// Print catalog statistics
    Stats,
    /// Print the requirement to execution chain of one execution
    Lineage { execution_id: ExecutionId },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn dispatch(command: Command, app: &App) -> Result<()> {
    match command {
        Command::Run => print_json(&app.run().await?),
        Command::Resume { run_id } => print_json(&app.resume(run_id).await?),
        Command::Stats => print_json(&app.statistics().await?),
        Command::Lineage { execution_id } => print_json(&app.lineage(execution_id).await?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;
    let telemetry = Telemetry::init(&config.telemetry)?;

    let outcome = match App::open(config).await {
        Ok(app) => dispatch(cli.command, &app).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &outcome {
        error!("insightflow failed: {e:#}");
    }
    telemetry.shutdown();
    outcome
}
