//! Renderer abstraction for the actual media playback.
//!
//! A renderer plays one track session at a time. Commands flow in through [`Renderer`];
//! everything the renderer learns later (readiness, position, completion, failures) flows
//! back through the [`RendererSink`] handed to it on attach, tagged with the session handle
//! so the engine can drop callbacks from sessions it already replaced.

use crossbeam_channel::Sender;
use playlist_types::TrackItem;

use crate::error::RendererError;
use crate::worker::Command;

/// Identifies one loaded renderer session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererHandle(pub u64);

/// Correlates a seek request with its completion callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeekToken(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum RendererEvent {
    /// Media is ready to start; `duration` is `None` for open-ended streams.
    Ready {
        handle: RendererHandle,
        duration: Option<f64>,
    },
    PositionTick {
        handle: RendererHandle,
        position: f64,
    },
    SeekCompleted {
        handle: RendererHandle,
        token: SeekToken,
        position: f64,
    },
    BufferingRangeChanged {
        handle: RendererHandle,
        start: f64,
        end: f64,
    },
    /// Natural end of the media.
    Ended { handle: RendererHandle },
    Error {
        handle: RendererHandle,
        error: RendererError,
    },
}

impl RendererEvent {
    pub fn handle(&self) -> RendererHandle {
        match self {
            RendererEvent::Ready { handle, .. }
            | RendererEvent::PositionTick { handle, .. }
            | RendererEvent::SeekCompleted { handle, .. }
            | RendererEvent::BufferingRangeChanged { handle, .. }
            | RendererEvent::Ended { handle }
            | RendererEvent::Error { handle, .. } => *handle,
        }
    }
}

/// Playback backend driven by the engine worker.
///
/// Calls other than `load` never fail synchronously; problems are reported as
/// [`RendererEvent::Error`]. Calls carrying a handle that is no longer loaded are ignored.
pub trait Renderer: Send {
    /// Receive the sink used for all callbacks. Called once, before any other method.
    fn attach(&mut self, sink: RendererSink);
    /// Open `track` positioned at `start_at` seconds, paused. Replaces any loaded session.
    fn load(&mut self, track: &TrackItem, start_at: f64) -> Result<RendererHandle, RendererError>;
    fn start(&mut self, handle: RendererHandle);
    fn pause(&mut self, handle: RendererHandle);
    fn seek(&mut self, handle: RendererHandle, position: f64, token: SeekToken);
    fn set_rate(&mut self, handle: RendererHandle, rate: f64);
    fn set_volume(&mut self, handle: RendererHandle, volume: f64);
    fn unload(&mut self, handle: RendererHandle);
    /// Release everything; no callbacks may follow.
    fn shutdown(&mut self) {}
}

/// Callback channel into the engine worker.
#[derive(Clone)]
pub struct RendererSink {
    tx: Sender<Command>,
}

impl RendererSink {
    pub(crate) fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// Deliver `event` to the engine. Returns `false` once the engine is gone.
    pub fn send(&self, event: RendererEvent) -> bool {
        self.tx.send(Command::Renderer(event)).is_ok()
    }
}

impl std::fmt::Debug for RendererSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSink").finish_non_exhaustive()
    }
}
