use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Engine tuning and initial playback settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between `playbackPosition` events while playing.
    pub position_interval_ms: u64,
    /// Playback rate applied before the first `setPlaybackRate`.
    pub initial_rate: f64,
    /// Volume applied before the first `setPlaybackVolume`.
    pub initial_volume: f64,
    /// Initial loop-all flag.
    pub loop_all: bool,
    /// Unload stream sessions on pause and reload them on resume.
    pub reset_stream_on_pause: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 500,
            initial_rate: 1.0,
            initial_volume: 1.0,
            loop_all: false,
            reset_stream_on_pause: true,
        }
    }
}

impl EngineConfig {
    /// Load an engine config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Parse an engine config from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg = toml::from_str::<EngineConfig>(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the engine would refuse at runtime.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_rate.is_finite() && self.initial_rate > 0.0) {
            anyhow::bail!("initial_rate must be positive, got {}", self.initial_rate);
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            anyhow::bail!("initial_volume must be within [0, 1], got {}", self.initial_volume);
        }
        Ok(())
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }
}

/// Runtime options accepted by `setOptions`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Leaves the current value untouched when absent.
    pub reset_stream_on_pause: Option<bool>,
}
