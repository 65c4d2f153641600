//! Tunables for the change detectors.

use serde::Deserialize;

use crate::error::ConfigError;

/// Default minimum displacement (in blocks) reported as a move.
pub const DEFAULT_MOVE_THRESHOLD: f64 = 0.01;

/// Default number of ticks between stale tracking-entry sweeps (10 s at 20 Hz).
pub const DEFAULT_SWEEP_INTERVAL: u64 = 200;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Displacements at or below this distance are treated as noise.
    pub move_threshold: f64,
    /// Ticks between sweeps that evict tracking entries of entities no longer
    /// live. `0` disables the sweep.
    pub sweep_interval_ticks: u64,
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.move_threshold.is_finite() || self.move_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.move_threshold));
        }
        Ok(())
    }

    pub fn with_move_threshold(mut self, threshold: f64) -> Self {
        self.move_threshold = threshold;
        self
    }

    pub fn with_sweep_interval(mut self, ticks: u64) -> Self {
        self.sweep_interval_ticks = ticks;
        self
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            move_threshold: DEFAULT_MOVE_THRESHOLD,
            sweep_interval_ticks: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
