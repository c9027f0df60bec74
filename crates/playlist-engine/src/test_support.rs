//! Scriptable renderer double for engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use playlist_types::{RendererErrorKind, TrackItem};

use crate::error::RendererError;
use crate::renderer::{Renderer, RendererEvent, RendererHandle, RendererSink, SeekToken};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Load { track_id: String, start_at: f64 },
    Start(RendererHandle),
    Pause(RendererHandle),
    Seek(RendererHandle, f64, SeekToken),
    SetRate(RendererHandle, f64),
    SetVolume(RendererHandle, f64),
    Unload(RendererHandle),
    Shutdown,
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    sink: Option<RendererSink>,
    last_handle: Option<RendererHandle>,
}

/// Inspection side of a [`ManualRenderer`], usable after the renderer moved into an engine.
#[derive(Clone, Default)]
pub(crate) struct ManualControl {
    shared: Arc<Mutex<Shared>>,
}

impl ManualControl {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub(crate) fn last_handle(&self) -> Option<RendererHandle> {
        self.shared.lock().unwrap().last_handle
    }

    pub(crate) fn loaded_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Load { track_id, .. } => Some(track_id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn seek_tokens(&self) -> Vec<SeekToken> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Seek(_, _, token) => Some(token),
                _ => None,
            })
            .collect()
    }

    /// Inject a callback as if the renderer produced it.
    pub(crate) fn send(&self, event: RendererEvent) {
        let sink = self.shared.lock().unwrap().sink.clone();
        sink.expect("renderer not attached").send(event);
    }

    /// Inject a callback for the most recently loaded session.
    pub(crate) fn send_current(&self, build: impl FnOnce(RendererHandle) -> RendererEvent) {
        let handle = self.last_handle().expect("nothing loaded");
        self.send(build(handle));
    }
}

/// Renderer that records calls and, optionally, reports ready right after load.
pub(crate) struct ManualRenderer {
    control: ManualControl,
    durations: HashMap<String, f64>,
    failures: HashMap<String, RendererErrorKind>,
    auto_ready: bool,
    next_handle: u64,
}

impl ManualRenderer {
    pub(crate) fn new() -> Self {
        Self {
            control: ManualControl::default(),
            durations: HashMap::new(),
            failures: HashMap::new(),
            auto_ready: false,
            next_handle: 0,
        }
    }

    /// Send `Ready` with the configured duration from inside `load`.
    pub(crate) fn auto_ready(mut self) -> Self {
        self.auto_ready = true;
        self
    }

    pub(crate) fn duration(mut self, track_id: &str, seconds: f64) -> Self {
        self.durations.insert(track_id.to_string(), seconds);
        self
    }

    pub(crate) fn failing(mut self, track_id: &str, kind: RendererErrorKind) -> Self {
        self.failures.insert(track_id.to_string(), kind);
        self
    }

    pub(crate) fn control(&self) -> ManualControl {
        self.control.clone()
    }

    fn record(&self, call: Call) {
        self.control.shared.lock().unwrap().calls.push(call);
    }
}

impl Renderer for ManualRenderer {
    fn attach(&mut self, sink: RendererSink) {
        self.control.shared.lock().unwrap().sink = Some(sink);
    }

    fn load(&mut self, track: &TrackItem, start_at: f64) -> Result<RendererHandle, RendererError> {
        self.record(Call::Load {
            track_id: track.track_id.clone(),
            start_at,
        });
        if let Some(kind) = self.failures.get(&track.track_id) {
            return Err(RendererError::new(*kind, "scripted failure"));
        }
        self.next_handle += 1;
        let handle = RendererHandle(self.next_handle);
        let sink = {
            let mut shared = self.control.shared.lock().unwrap();
            shared.last_handle = Some(handle);
            shared.sink.clone()
        };
        if self.auto_ready {
            if let Some(sink) = sink {
                sink.send(RendererEvent::Ready {
                    handle,
                    duration: self.durations.get(&track.track_id).copied(),
                });
            }
        }
        Ok(handle)
    }

    fn start(&mut self, handle: RendererHandle) {
        self.record(Call::Start(handle));
    }

    fn pause(&mut self, handle: RendererHandle) {
        self.record(Call::Pause(handle));
    }

    fn seek(&mut self, handle: RendererHandle, position: f64, token: SeekToken) {
        self.record(Call::Seek(handle, position, token));
    }

    fn set_rate(&mut self, handle: RendererHandle, rate: f64) {
        self.record(Call::SetRate(handle, rate));
    }

    fn set_volume(&mut self, handle: RendererHandle, volume: f64) {
        self.record(Call::SetVolume(handle, volume));
    }

    fn unload(&mut self, handle: RendererHandle) {
        self.record(Call::Unload(handle));
    }

    fn shutdown(&mut self) {
        self.record(Call::Shutdown);
        self.control.shared.lock().unwrap().sink = None;
    }
}
