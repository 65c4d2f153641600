use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tickwatch_engine::entity::{ItemKind, Vec3};
use tickwatch_engine::event::WorldId;
use tickwatch_engine::WorldHost;
use tickwatch_engine::world::World;
use tickwatch_engine::world::position::BlockPos;
use tickwatch_server::config::{ServerConfig, WorldConfig};
use tickwatch_server::plugins::{self, EventLogger, EventMetrics, Installed};
use tickwatch_server::simulation::{self, ItemPhysics, ItemSpawner, SandFall, SimulationLayer};
use tickwatch_server::terrain;
use tokio::sync::watch;

/// Items below this height relative to the surface are destroyed.
const VOID_DEPTH: f64 = 64.0;
/// Alive items per world before the spawner despawns the oldest.
const MAX_ITEMS: usize = 256;
/// Sand-fall runs between new falling blocks at spawn.
const SAND_DROP_EVERY: u64 = 20;

/// One running world: its host plus the plugins installed on it.
struct RunningWorld {
    name: String,
    host: Arc<WorldHost>,
    metrics: Arc<EventMetrics>,
    installed: Vec<Installed>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let demo_mode = std::env::args().any(|a| a == "--demo");
    let config_path: Option<PathBuf> = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .map(PathBuf::from);
    let tick_rate: Option<u32> = std::env::args()
        .skip_while(|a| a != "--tick-rate")
        .nth(1)
        .and_then(|s| s.parse().ok());
    let max_ticks: Option<u64> = std::env::args()
        .skip_while(|a| a != "--ticks")
        .nth(1)
        .and_then(|s| s.parse().ok());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::load(config_path.as_deref())?;
    if let Some(rate) = tick_rate {
        config.tick_rate = rate;
        config.validate()?;
    }

    if demo_mode {
        return run_demo(&config);
    }

    tracing::info!("tickwatch -- world change event server");

    let mut worlds = Vec::new();
    for (i, world_config) in config.worlds.iter().enumerate() {
        worlds.push(start_world(WorldId(i as u32), world_config, &config)?);
    }

    // ── Tick loops ──────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let tick_interval = config.tick_interval();
    let mut tasks = Vec::new();
    for world in &worlds {
        let host = Arc::clone(&world.host);
        let metrics = Arc::clone(&world.metrics);
        let mut stop = stop_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop.changed() => break,
                }
                let report = host.tick(tick_interval);
                metrics.record_tick(&report);
                if max_ticks.is_some_and(|n| report.tick >= n) {
                    break;
                }
            }
        }));
    }

    // ── Periodic metrics ───────────────────────────────────────────────
    if config.metrics_interval_secs > 0 {
        let reporters: Vec<_> = worlds
            .iter()
            .map(|w| (Arc::clone(&w.host), Arc::clone(&w.metrics)))
            .collect();
        let period = Duration::from_secs(config.metrics_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick is immediate, skip it
            loop {
                interval.tick().await;
                for (host, metrics) in &reporters {
                    metrics.log_snapshot(host);
                }
            }
        });
    }

    // ── Run until Ctrl+C or every world hits its tick bound ────────────
    let all_done = join_tick_tasks(tasks);
    tokio::pin!(all_done);
    tokio::select! {
        _ = &mut all_done => {
            tracing::info!("Tick bound reached");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
            let _ = stop_tx.send(true);
            all_done.await;
        }
    }

    // ── Teardown ────────────────────────────────────────────────────────
    for world in &worlds {
        world.metrics.log_snapshot(&world.host);
        for installed in &world.installed {
            plugins::uninstall(&world.host, installed);
        }
        world.host.shutdown();
        tracing::info!("World '{}' stopped after {} ticks", world.name, world.host.current_tick());
    }
    Ok(())
}

/// Await every tick task, logging any that panicked.
async fn join_tick_tasks(tasks: Vec<tokio::task::JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Tick task failed: {}", e);
        }
    }
}

fn layers(world_config: &WorldConfig) -> Vec<Box<dyn SimulationLayer>> {
    let spawn_y = world_config.surface_y as f64 + 12.0;
    let mut layers: Vec<Box<dyn SimulationLayer>> = Vec::new();
    // Spawner first so fresh drops get their first physics step the same tick.
    layers.push(Box::new(ItemSpawner::new(
        Vec3::new(0.5, spawn_y, 0.5),
        world_config.spawner_interval_ticks,
        MAX_ITEMS,
        vec![ItemKind(1), ItemKind(2), ItemKind(3)],
    )));
    layers.push(Box::new(ItemPhysics {
        void_y: world_config.surface_y as f64 - VOID_DEPTH,
    }));
    layers.push(Box::new(SandFall::new(
        world_config.sand_interval_ticks,
        BlockPos::new(4, world_config.surface_y + 8, 4),
        SAND_DROP_EVERY,
    )));
    layers
}

fn start_world(id: WorldId, world_config: &WorldConfig, config: &ServerConfig) -> anyhow::Result<RunningWorld> {
    let surface = world_config.surface_block()?;

    tracing::info!("Generating flat world '{}'...", world_config.name);
    let world = World::new();
    terrain::generate_flat(&world, world_config.radius, surface, world_config.surface_y);
    tracing::info!("World '{}' ready: {} chunks", world_config.name, world.chunk_count());

    let builder = WorldHost::builder(id).config(config.watch.clone()).world(world);
    let host = simulation::install(builder, layers(world_config))
        .build()
        .with_context(|| format!("building world '{}'", world_config.name))?;
    let host = Arc::new(host);

    let metrics = Arc::new(EventMetrics::new(world_config.name.clone()));
    let mut installed = vec![plugins::install(&host, Arc::clone(&metrics))];
    if config.log_events {
        installed.push(plugins::install(&host, Arc::new(EventLogger::new(world_config.name.clone()))));
    }

    Ok(RunningWorld {
        name: world_config.name.clone(),
        host,
        metrics,
        installed,
    })
}

/// Bounded single-world run without the async tick loop, with every event
/// logged.
fn run_demo(config: &ServerConfig) -> anyhow::Result<()> {
    const DEMO_TICKS: u64 = 200;

    tracing::info!("tickwatch -- demo");
    let mut config = config.clone();
    config.log_events = true;
    let mut world_config = config.worlds.first().cloned().unwrap_or_default();
    world_config.radius = world_config.radius.min(2);
    world_config.spawner_interval_ticks = world_config.spawner_interval_ticks.clamp(1, 10);

    let running = start_world(WorldId(0), &world_config, &config)?;
    let dt = config.tick_interval();
    for _ in 0..DEMO_TICKS {
        let report = running.host.tick(dt);
        running.metrics.record_tick(&report);
    }

    running.metrics.log_snapshot(&running.host);
    for installed in &running.installed {
        plugins::uninstall(&running.host, installed);
    }
    running.host.shutdown();
    Ok(())
}
