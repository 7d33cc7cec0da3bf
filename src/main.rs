use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tycoon_sim::{
    scenario::{Scenario, ScenarioLoader},
    session::Session,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Tick-driven tycoon simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run a scenario headless for a fixed number of ticks
    Run(RunArgs),
    /// Serve a scenario over HTTP, ticking at the session's speed
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/meadow_park.yaml")]
    scenario: PathBuf,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for autosave snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Write the final state as JSON to this file
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl ScenarioArgs {
    fn load(&self) -> Result<Scenario> {
        let mut scenario = ScenarioLoader::new(".").load(&self.scenario)?;
        if let Some(interval) = self.snapshot_interval {
            scenario.snapshot_interval_ticks = interval;
        }
        Ok(scenario)
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("snapshots"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tycoon_sim=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Mode::Run(args) => run(args),
        Mode::Serve(args) => serve(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let scenario = args.scenario.load()?;
    let ticks = scenario.ticks(args.ticks);
    let mut session = Session::from_scenario(&scenario, Some(args.scenario.snapshot_dir()))?;
    session.run(ticks)?;

    let summary = session.summary();
    info!(
        scenario = %scenario.name,
        ticks,
        date = %summary.date,
        balance = summary.balance,
        guests = summary.guests,
        citizens = summary.citizens,
        lives = summary.lives,
        "run complete"
    );
    if let Some(path) = args.export {
        let blob = session.export_state()?;
        std::fs::write(&path, blob)?;
        info!(path = %path.display(), "final state exported");
    }
    Ok(())
}

fn serve(args: ServeArgs) -> Result<()> {
    let scenario = args.scenario.load()?;
    let session = Session::from_scenario(&scenario, Some(args.scenario.snapshot_dir()))?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::run(WebServerConfig {
        session,
        host: args.host,
        port: args.port,
    }))
}
