use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use playlist_engine::{EngineConfig, SimulatedRenderer};
use serde::Deserialize;

use crate::cli::Args;

/// Settings for the clock-driven renderer.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub tick_ms: u64,
    pub default_duration_secs: f64,
    /// Per-locator duration overrides.
    pub durations: HashMap<String, f64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            default_duration_secs: 30.0,
            durations: HashMap::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn build(&self) -> SimulatedRenderer {
        self.durations.iter().fold(
            SimulatedRenderer::new(
                Duration::from_millis(self.tick_ms.max(1)),
                self.default_duration_secs,
            ),
            |renderer, (url, secs)| renderer.with_duration(url.clone(), *secs),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub simulator: SimulatorConfig,
}

impl CliConfig {
    /// Load the config file, if any, then apply command-line overrides.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut cfg = match args.config.as_deref() {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(tick_ms) = args.tick_ms {
            cfg.simulator.tick_ms = tick_ms;
        }
        if let Some(secs) = args.default_duration {
            cfg.simulator.default_duration_secs = secs;
        }
        if let Some(ms) = args.position_interval_ms {
            cfg.engine.position_interval_ms = ms;
        }
        cfg.engine.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<CliConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}
