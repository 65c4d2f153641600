//! Server configuration, loaded from TOML.
//!
//! ```toml
//! tick_rate = 20
//! metrics_interval_secs = 30
//! log_events = false
//!
//! [watch]
//! move_threshold = 0.01
//! sweep_interval_ticks = 200
//!
//! [[worlds]]
//! name = "overworld"
//! radius = 4
//! surface = "dirt"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use tickwatch_engine::WatchConfig;
use tickwatch_engine::world::block::BlockId;

use crate::block;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ticks per second for every world.
    pub tick_rate: u32,
    pub worlds: Vec<WorldConfig>,
    pub watch: WatchConfig,
    /// Seconds between metrics log lines. `0` disables them.
    pub metrics_interval_secs: u64,
    /// Install the event logger plugin on every world.
    pub log_events: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            worlds: vec![WorldConfig::default()],
            watch: WatchConfig::default(),
            metrics_interval_secs: 30,
            log_events: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub name: String,
    /// Chunk radius of the generated flat terrain.
    pub radius: i32,
    /// Top terrain layer, by block name.
    pub surface: String,
    pub surface_y: i64,
    /// Ticks between item drops above spawn. `0` disables the spawner.
    pub spawner_interval_ticks: u64,
    /// Ticks between falling-block steps. `0` disables it.
    pub sand_interval_ticks: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "overworld".into(),
            radius: 4,
            surface: "dirt".into(),
            surface_y: 64,
            spawner_interval_ticks: 40,
            sand_interval_ticks: 2,
        }
    }
}

impl WorldConfig {
    pub fn surface_block(&self) -> anyhow::Result<BlockId> {
        block::by_name(&self.surface)
            .with_context(|| format!("world '{}': unknown surface block '{}'", self.name, self.surface))
    }
}

impl ServerConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_rate == 0 {
            bail!("tick_rate must be at least 1");
        }
        if self.worlds.is_empty() {
            bail!("at least one world must be configured");
        }
        self.watch.validate().context("invalid [watch] section")?;
        for (i, world) in self.worlds.iter().enumerate() {
            if self.worlds[..i].iter().any(|w| w.name == world.name) {
                bail!("duplicate world name '{}'", world.name);
            }
            if world.radius < 1 {
                bail!("world '{}': radius must be at least 1", world.name);
            }
            world.surface_block()?;
        }
        Ok(())
    }
}
