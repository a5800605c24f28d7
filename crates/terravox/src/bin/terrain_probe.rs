//! # TERRAVOX Terrain Probe
//!
//! Runs a streaming session against procedural terrain with a player
//! walking east until Ctrl-C or the timeout, then logs what the viewer
//! received.
//!
//! ```bash
//! # Defaults, 10 seconds
//! terrain_probe
//!
//! # Custom config and duration
//! RUST_LOG=terravox_streaming=debug terrain_probe config/terravox.toml 30
//! ```

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use terravox::{build_runtime, LocalColumnServer, LoggingViewer, ProbeReport, WalkingPlayer};
use terravox_procedural::{ProceduralTerrain, WorldSeed};
use terravox_shared::{TerrainGenerator, WorldPos};
use terravox_streaming::{TerrainConfig, TerrainResult, TerrainSession};
use tracing_subscriber::EnvFilter;

const DEFAULT_SECONDS: u64 = 10;

/// Pending column messages between the local server and the coordinator.
const OUTBOX_CAPACITY: usize = 256;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&str>) -> TerrainResult<TerrainConfig> {
    match path {
        Some(path) => {
            tracing::info!("loading config from {}", path);
            TerrainConfig::load(path)
        }
        None => Ok(TerrainConfig::default()),
    }
}

async fn probe(config: TerrainConfig, duration: Duration) -> TerrainResult<ProbeReport> {
    let generator: Arc<dyn TerrainGenerator> =
        Arc::new(ProceduralTerrain::new(WorldSeed::new(config.seed)));
    let session = TerrainSession::new(config.clone(), generator)?;

    let start = WorldPos::new(0.5, 0.0, 0.5);
    let height = session.get_ground_height(start.x, start.z).await?;
    tracing::info!("spawn ground at height {}", height);

    let player = Arc::new(WalkingPlayer::new(
        WorldPos::new(start.x, height + 2.0, start.z),
        f64::from(config.patch_size) / 2.0,
    ));
    let viewer = Arc::new(LoggingViewer::new());
    let (outbox, inbox) = tokio::sync::mpsc::channel(OUTBOX_CAPACITY);
    let server = Arc::new(LocalColumnServer::new(
        outbox,
        config.min_chunk_y,
        config.max_chunk_y,
    ));

    let mut coordinator = session.coordinator(player.clone(), viewer.clone(), server.clone());
    let streaming = tokio::spawn(async move { coordinator.run(inbox).await });

    let walk = async {
        let mut steps = tokio::time::interval(config.poll_interval() * 2);
        loop {
            steps.tick().await;
            let position = player.step();
            tracing::debug!("player at {:.1}, {:.1}", position.x, position.z);
        }
    };
    tokio::select! {
        () = tokio::time::sleep(duration) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("ctrl-c handler unavailable: {}", e);
            }
        }
        () = walk => {}
    }

    session.abort();
    match streaming.await {
        Ok(state) => tracing::info!("coordinator finished in state {:?}", state),
        Err(e) => tracing::warn!("coordinator task failed: {}", e),
    }

    let stats = session.pool_stats();
    tracing::info!(
        "worker pool: {} submitted, {} completed, {} failed",
        stats.submitted.load(Ordering::Relaxed),
        stats.completed.load(Ordering::Relaxed),
        stats.failed.load(Ordering::Relaxed)
    );
    tracing::info!(
        "{} patches cached, {} columns served",
        session.patches().patch_count(),
        server.served()
    );

    Ok(viewer.report())
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match load_config(args.first().map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let seconds = args
        .get(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_SECONDS);

    let runtime = match build_runtime(2) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("probing terrain for {} s (seed {})", seconds, config.seed);
    match runtime.block_on(probe(config, Duration::from_secs(seconds))) {
        Ok(report) => {
            tracing::info!("probe finished: {}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("probe failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
