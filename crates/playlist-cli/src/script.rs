//! JSON-lines scripts for driving the engine from the command line.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Step {
    /// Sleep so renderer callbacks can arrive.
    Wait { wait_ms: u64 },
    Call {
        method: String,
        #[serde(default)]
        args: Value,
    },
}

/// Parse a script; blank lines and `#` comments are skipped.
pub fn parse(raw: &str) -> Result<Vec<Step>> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str::<Step>(line).with_context(|| format!("script line {n}"))
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read script {:?}", path))?;
    parse(&raw).with_context(|| format!("parse script {:?}", path))
}
