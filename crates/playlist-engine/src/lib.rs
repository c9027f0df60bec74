//! Host-independent playlist and transport engine.
//!
//! A [`PlaylistEngine`] owns an ordered track catalog, a current-track cursor and a transport
//! state machine, drives a [`Renderer`] for the actual media playback, and reports every
//! change to one registered [`StatusListener`].

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod navigator;
pub mod renderer;
pub mod simulated;
pub mod status;
mod transport;
mod worker;

#[cfg(test)]
mod test_support;

pub use config::{EngineConfig, EngineOptions};
pub use engine::PlaylistEngine;
pub use error::{EngineError, RendererError};
pub use renderer::{Renderer, RendererEvent, RendererHandle, RendererSink, SeekToken};
pub use simulated::SimulatedRenderer;
pub use status::StatusListener;
