use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "playlist", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML config with `[engine]` and `[simulator]` tables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Simulated renderer tick in milliseconds (overrides the config file)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Duration reported for every non-stream track, in seconds (overrides the config file)
    #[arg(long)]
    pub default_duration: Option<f64>,

    /// Minimum spacing between position events in milliseconds (overrides the config file)
    #[arg(long)]
    pub position_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a JSON-lines script of method calls against the engine
    Run {
        /// Script path; one `{"method", "args"}` or `{"wait_ms"}` object per line
        script: PathBuf,
    },

    /// Play the given locators as a playlist until the queue ends
    Demo {
        /// Media locators, in playback order
        #[arg(required = true)]
        assets: Vec<String>,

        /// Wrap around at the end of the queue (runs until interrupted)
        #[arg(long)]
        loop_all: bool,
    },

    /// List the method names accepted by `run` scripts
    Methods,
}
