//! CLI runtime helpers.
//!
//! Builds the engine on top of the simulated renderer, prints listener events as JSON lines,
//! and runs scripts or the demo playlist.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use playlist_engine::PlaylistEngine;
use playlist_engine::dispatch::error_value;
use playlist_types::{EngineEvent, EventName, PlaylistItemOptions, TrackItem};
use serde_json::json;

use crate::config::CliConfig;
use crate::script::{self, Step};

/// Start the engine and register a listener that prints every event to stdout.
///
/// The returned receiver fires once per `queue-ended` event.
pub fn start_engine(cfg: &CliConfig) -> Result<(Arc<PlaylistEngine>, Receiver<()>)> {
    let engine = Arc::new(PlaylistEngine::new(cfg.simulator.build(), cfg.engine.clone()));
    let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
    engine.initialize(move |_: &str, event: &EngineEvent| on_event(event, &ended_tx))?;
    Ok((engine, ended_rx))
}

fn on_event(event: &EngineEvent, ended_tx: &Sender<()>) {
    print_line(&serde_json::to_value(event).unwrap_or_default());
    if event.name == EventName::QueueEnded {
        let _ = ended_tx.send(());
    }
}

fn print_line(value: &serde_json::Value) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{value}");
}

/// Release the engine and exit on Ctrl-C.
pub fn install_ctrlc(engine: Arc<PlaylistEngine>) {
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = engine.release();
        std::process::exit(130);
    }) {
        tracing::warn!("failed to install ctrl-c handler: {e}");
    }
}

/// Execute a script file. Returns the number of calls that failed.
pub fn run_script(engine: &PlaylistEngine, path: &Path) -> Result<usize> {
    let steps = script::load(path)?;
    tracing::info!(steps = steps.len(), path = ?path, "running script");
    Ok(run_steps(engine, steps))
}

pub fn run_steps(engine: &PlaylistEngine, steps: Vec<Step>) -> usize {
    let mut failures = 0;
    for step in steps {
        match step {
            Step::Wait { wait_ms } => std::thread::sleep(Duration::from_millis(wait_ms)),
            Step::Call { method, args } => match engine.dispatch(&method, args) {
                Ok(result) => print_line(&json!({ "method": method, "result": result })),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(method = %method, code = %err.code, "call failed");
                    print_line(&json!({ "method": method, "error": error_value(&err) }));
                }
            },
        }
    }
    failures
}

/// Turn plain locators into catalog entries with generated ids.
pub fn demo_items(assets: &[String]) -> Vec<TrackItem> {
    assets
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let title = Path::new(asset)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(asset)
                .to_string();
            let mut item = TrackItem::new(format!("track-{}", i + 1), asset.clone()).with_title(title);
            item.is_stream = asset.starts_with("http://") || asset.starts_with("https://");
            item
        })
        .collect()
}

/// Play `assets` from the top and wait for the queue to end.
pub fn run_demo(
    engine: &PlaylistEngine,
    ended: &Receiver<()>,
    assets: &[String],
    loop_all: bool,
) -> Result<()> {
    engine.set_loop_all(loop_all)?;
    let options = PlaylistItemOptions {
        start_paused: false,
        ..PlaylistItemOptions::default()
    };
    engine.set_playlist_items(demo_items(assets), options)?;
    tracing::info!(tracks = assets.len(), loop_all, "demo playlist started");
    let _ = ended.recv();
    Ok(())
}
