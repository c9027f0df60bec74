//! Playlist: drive the playlist engine from the command line.
//!
//! Uses the simulated renderer, so no audio is produced; every listener event is printed to
//! stdout as one JSON object per line while logs go to stderr.
//!
//! ## Modes
//! - `run`: execute a JSON-lines script of `{"method", "args"}` calls.
//! - `demo`: play the given locators as a playlist until the queue ends.
//! - `methods`: list the dispatchable method names.

mod cli;
mod config;
mod runtime;
mod script;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,playlist_engine=info")
        }))
        .init();

    if let cli::Command::Methods = args.cmd {
        for method in playlist_engine::dispatch::METHODS {
            println!("{method}");
        }
        return Ok(());
    }

    let cfg = config::CliConfig::resolve(&args)?;
    tracing::debug!(?cfg, "resolved config");
    let (engine, ended) = runtime::start_engine(&cfg)?;
    runtime::install_ctrlc(engine.clone());

    match &args.cmd {
        cli::Command::Run { script } => {
            let failures = runtime::run_script(&engine, script)?;
            engine.release()?;
            if failures > 0 {
                anyhow::bail!("{failures} call(s) failed");
            }
        }
        cli::Command::Demo { assets, loop_all } => {
            runtime::run_demo(&engine, &ended, assets, *loop_all)?;
            engine.release()?;
        }
        cli::Command::Methods => {}
    }
    Ok(())
}
