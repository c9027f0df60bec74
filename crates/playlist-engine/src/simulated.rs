//! Clock-driven renderer that plays no audio.
//!
//! Each loaded track gets its own ticker thread advancing a virtual position by
//! `tick * rate` while playing, reporting position ticks and finally `Ended` at the
//! track duration. Used by the CLI and by integration-style tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playlist_types::{RendererErrorKind, TrackItem};

use crate::error::RendererError;
use crate::renderer::{Renderer, RendererEvent, RendererHandle, RendererSink, SeekToken};

#[derive(Debug)]
struct Clock {
    position: f64,
    duration: Option<f64>,
    rate: f64,
    volume: f64,
}

struct SessionHandle {
    handle: RendererHandle,
    cancel: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    clock: Arc<Mutex<Clock>>,
    join: std::thread::JoinHandle<()>,
}

pub struct SimulatedRenderer {
    sink: Option<RendererSink>,
    tick: Duration,
    default_duration: f64,
    durations: HashMap<String, f64>,
    failures: HashMap<String, RendererErrorKind>,
    next_handle: u64,
    session: Option<SessionHandle>,
}

impl SimulatedRenderer {
    /// `default_duration` applies to every non-stream locator without an override.
    pub fn new(tick: Duration, default_duration: f64) -> Self {
        Self {
            sink: None,
            tick,
            default_duration,
            durations: HashMap::new(),
            failures: HashMap::new(),
            next_handle: 0,
            session: None,
        }
    }

    /// Override the duration reported for `asset_url`.
    pub fn with_duration(mut self, asset_url: impl Into<String>, seconds: f64) -> Self {
        self.durations.insert(asset_url.into(), seconds);
        self
    }

    /// Make every load of `asset_url` fail with `kind`.
    pub fn with_failure(mut self, asset_url: impl Into<String>, kind: RendererErrorKind) -> Self {
        self.failures.insert(asset_url.into(), kind);
        self
    }

    fn duration_for(&self, track: &TrackItem) -> Option<f64> {
        if track.is_stream {
            return None;
        }
        Some(
            self.durations
                .get(&track.asset_url)
                .copied()
                .unwrap_or(self.default_duration),
        )
    }

    fn session_for(&self, handle: RendererHandle) -> Option<&SessionHandle> {
        self.session.as_ref().filter(|s| s.handle == handle)
    }

    fn cancel_session(&mut self) {
        if let Some(sess) = self.session.take() {
            sess.cancel.store(true, Ordering::Relaxed);
            let _ = sess.join.join();
        }
    }

    fn emit(&self, event: RendererEvent) {
        if let Some(sink) = self.sink.as_ref() {
            sink.send(event);
        }
    }
}

impl Renderer for SimulatedRenderer {
    fn attach(&mut self, sink: RendererSink) {
        self.sink = Some(sink);
    }

    fn load(&mut self, track: &TrackItem, start_at: f64) -> Result<RendererHandle, RendererError> {
        self.cancel_session();
        if let Some(kind) = self.failures.get(&track.asset_url) {
            return Err(RendererError::new(
                *kind,
                format!("cannot open {}", track.asset_url),
            ));
        }
        let Some(sink) = self.sink.clone() else {
            return Err(RendererError::new(
                RendererErrorKind::Aborted,
                "renderer is not attached",
            ));
        };

        self.next_handle = self.next_handle.saturating_add(1);
        let handle = RendererHandle(self.next_handle);
        let duration = self.duration_for(track);
        let start = match duration {
            Some(d) => start_at.clamp(0.0, d),
            None => start_at.max(0.0),
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(false));
        let clock = Arc::new(Mutex::new(Clock {
            position: start,
            duration,
            rate: 1.0,
            volume: 1.0,
        }));

        let tick = self.tick;
        let cancel_for_thread = cancel.clone();
        let playing_for_thread = playing.clone();
        let clock_for_thread = clock.clone();
        let join = std::thread::spawn(move || {
            run_clock(
                handle,
                tick,
                sink,
                cancel_for_thread,
                playing_for_thread,
                clock_for_thread,
            )
        });

        tracing::debug!(handle = handle.0, track_id = %track.track_id, start, "simulated load");
        self.session = Some(SessionHandle {
            handle,
            cancel,
            playing,
            clock,
            join,
        });
        self.emit(RendererEvent::Ready { handle, duration });
        self.emit(RendererEvent::BufferingRangeChanged {
            handle,
            start: 0.0,
            end: duration.unwrap_or(start),
        });
        Ok(handle)
    }

    fn start(&mut self, handle: RendererHandle) {
        if let Some(sess) = self.session_for(handle) {
            sess.playing.store(true, Ordering::Relaxed);
        }
    }

    fn pause(&mut self, handle: RendererHandle) {
        if let Some(sess) = self.session_for(handle) {
            sess.playing.store(false, Ordering::Relaxed);
        }
    }

    fn seek(&mut self, handle: RendererHandle, position: f64, token: SeekToken) {
        let Some(sess) = self.session_for(handle) else {
            return;
        };
        let settled = match sess.clock.lock() {
            Ok(mut clock) => {
                clock.position = match clock.duration {
                    Some(d) => position.clamp(0.0, d),
                    None => position.max(0.0),
                };
                clock.position
            }
            Err(_) => return,
        };
        self.emit(RendererEvent::SeekCompleted {
            handle,
            token,
            position: settled,
        });
    }

    fn set_rate(&mut self, handle: RendererHandle, rate: f64) {
        if let Some(Ok(mut clock)) = self.session_for(handle).map(|s| s.clock.lock()) {
            clock.rate = rate;
        }
    }

    fn set_volume(&mut self, handle: RendererHandle, volume: f64) {
        if let Some(Ok(mut clock)) = self.session_for(handle).map(|s| s.clock.lock()) {
            clock.volume = volume;
        }
    }

    fn unload(&mut self, handle: RendererHandle) {
        if self.session_for(handle).is_some() {
            self.cancel_session();
        }
    }

    fn shutdown(&mut self) {
        self.cancel_session();
        self.sink = None;
    }
}

impl Drop for SimulatedRenderer {
    fn drop(&mut self) {
        self.cancel_session();
    }
}

/// Ticker loop for one session.
fn run_clock(
    handle: RendererHandle,
    tick: Duration,
    sink: RendererSink,
    cancel: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    clock: Arc<Mutex<Clock>>,
) {
    let step = tick.as_secs_f64();
    loop {
        std::thread::sleep(tick);
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if !playing.load(Ordering::Relaxed) {
            continue;
        }
        let (position, finished) = {
            let Ok(mut c) = clock.lock() else {
                break;
            };
            c.position += step * c.rate;
            match c.duration {
                Some(d) if c.position >= d => {
                    c.position = d;
                    (d, true)
                }
                _ => (c.position, false),
            }
        };
        if !sink.send(RendererEvent::PositionTick { handle, position }) {
            break;
        }
        if finished {
            sink.send(RendererEvent::Ended { handle });
            break;
        }
    }
}
