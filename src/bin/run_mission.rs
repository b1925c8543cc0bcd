use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wet_cleaning_core::config::CleaningConfig;
use wet_cleaning_core::gateway::simulated::register_simulated_robot;
use wet_cleaning_core::gateway::AsyncServiceGateway;
use wet_cleaning_core::mission::{InMemoryMissionStore, MissionFile, MissionOutcome, RoomRef};
use wet_cleaning_core::WetCleaningCore;

/// Run a cleaning mission against simulated actors
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration layered over the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mission file with the plan, rooms, robot and segmentation map
    #[arg(long, default_value = "config/demo_mission.toml")]
    mission: PathBuf,

    /// Clean only this room
    #[arg(long)]
    room: Option<usize>,

    /// Simulated service latency in milliseconds
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CleaningConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mission = MissionFile::load(&args.mission)
        .with_context(|| format!("failed to load mission {}", args.mission.display()))?;
    let (plan, mut store) = InMemoryMissionStore::from_file(mission);

    let mut gateway = AsyncServiceGateway::new(Handle::current(), config.endpoint_map());
    register_simulated_robot(&mut gateway, Duration::from_millis(args.latency_ms));
    let core = Arc::new(WetCleaningCore::new(Arc::new(gateway), config)?);

    let interrupt = core.interrupt();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting mission");
            interrupt.abort();
        }
    });

    // The sequencer blocks on gateway calls, so it runs off the async workers
    let worker = Arc::clone(&core);
    let room = args.room;
    let (report, store) = tokio::task::spawn_blocking(move || {
        let report = match room {
            Some(room) => worker.clean_room(RoomRef(room), &mut store),
            None => worker.run_mission(&plan, &mut store),
        };
        (report, store)
    })
    .await
    .context("mission thread failed")?;

    for record in store.completed_rooms() {
        info!(
            room = record.room.index(),
            status = ?record.status,
            code = record.status.status_code(),
            "room checked out"
        );
    }
    info!(
        dispatched = report.dispatched.len(),
        recoveries = report.recoveries.len(),
        outcome = ?report.outcome,
        "mission finished"
    );

    if report.outcome == MissionOutcome::Aborted {
        anyhow::bail!("mission aborted");
    }
    Ok(())
}
