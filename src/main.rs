//! arcade-pulse: dashboard aggregator for the Arcade contracts
//!
//! Runs the treasury, activity and governance refresh tasks on their own
//! periods against a chain snapshot and serves the results as JSON.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use arcade_pulse::activity::ActivityAggregator;
use arcade_pulse::chain::{ChainReader, InMemoryChain};
use arcade_pulse::config::Config;
use arcade_pulse::dashboard::{create_router, DashboardState};
use arcade_pulse::governance::DeadlineSelector;
use arcade_pulse::scheduler::{
    ActivityTask, GovernanceTask, PollScheduler, RefreshTask, TreasuryTask,
};
use arcade_pulse::state::{self, StatePublisher};
use arcade_pulse::treasury::TreasuryScanner;

#[derive(Parser)]
#[command(name = "arcade-pulse")]
#[command(about = "Activity, leaderboard and governance aggregator for the Arcade contracts")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "arcade-pulse.toml")]
    config: PathBuf,

    /// JSON chain snapshot to read from
    #[arg(short, long, env = "ARCADE_PULSE_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Connected account, labelled "You" (overrides config file)
    #[arg(long, env = "ARCADE_PULSE_VIEWER")]
    viewer: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(long, env = "ARCADE_PULSE_PORT")]
    port: Option<u16>,

    /// Run every task once, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arcade_pulse=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!(config = %cli.config.display(), "Starting arcade-pulse");
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(viewer) = &cli.viewer {
        let viewer: Address = viewer.parse().context("invalid --viewer address")?;
        config.display.viewer = Some(viewer);
    }
    if let Some(port) = cli.port {
        config.api.http_port = port;
    }

    let chain: Arc<dyn ChainReader> = Arc::new(load_chain(cli.fixture.as_deref())?);
    let (publisher, reader) = state::channel();
    let tasks = build_tasks(&config, chain, &publisher);

    if cli.once {
        for task in &tasks {
            if let Err(e) = task.run().await {
                warn!(task = %task.kind(), error = %e, "Refresh failed");
            }
        }
        println!("{}", serde_json::to_string_pretty(&reader.snapshot())?);
        return Ok(());
    }

    let scheduler = Arc::new(PollScheduler::with_publisher(tasks, publisher));
    scheduler.start().await;

    let state = Arc::new(DashboardState::new(
        reader,
        scheduler.clone(),
        config.display.viewer,
    ));
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.http_port));
    info!("Dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
            }
            info!("Shutting down");
        })
        .await?;

    scheduler.stop().await;
    Ok(())
}

fn load_chain(fixture: Option<&Path>) -> anyhow::Result<InMemoryChain> {
    match fixture {
        Some(path) => {
            let chain = InMemoryChain::load(path)
                .with_context(|| format!("loading fixture {}", path.display()))?;
            info!(fixture = %path.display(), "Chain snapshot loaded");
            Ok(chain)
        }
        None => {
            warn!("No chain fixture given, every read will come back empty");
            Ok(InMemoryChain::default())
        }
    }
}

fn build_tasks(
    config: &Config,
    chain: Arc<dyn ChainReader>,
    publisher: &StatePublisher,
) -> Vec<Arc<dyn RefreshTask>> {
    let poll = &config.poll;
    let period = |secs: u64| Duration::from_secs(secs.max(1));

    let treasury: Arc<dyn RefreshTask> = Arc::new(TreasuryTask::new(
        TreasuryScanner::from_config(config),
        chain.clone(),
        publisher.clone(),
        period(poll.treasury_interval_secs),
    ));
    let activity: Arc<dyn RefreshTask> = Arc::new(ActivityTask::new(
        ActivityAggregator::from_config(config),
        chain.clone(),
        publisher.clone(),
        period(poll.activity_interval_secs),
    ));
    let governance: Arc<dyn RefreshTask> = Arc::new(GovernanceTask::new(
        DeadlineSelector::new(config.contracts.council),
        chain,
        publisher.clone(),
        period(poll.governance_interval_secs),
    ));

    vec![treasury, activity, governance]
}
