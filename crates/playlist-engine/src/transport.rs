//! Transport state machine for the current renderer session.
//!
//! Tracks what the engine believes about playback (state, position, duration, buffer) and
//! turns commands and renderer callbacks into renderer calls plus [`Notice`]s that the worker
//! turns into listener events.

use playlist_types::{PlaybackState, TrackItem};

use crate::error::{EngineError, RendererError, Result};
use crate::renderer::{Renderer, RendererEvent, RendererHandle, SeekToken};

/// Observable change produced by a transport step.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Notice {
    State(PlaybackState),
    CanPlay,
    Duration(f64),
    Buffering,
    Loaded,
    Position,
    SeekSettled(f64),
    Failed(RendererError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayOutcome {
    Handled,
    /// Nothing is loaded; the caller has to pick a track and load it.
    NeedsLoad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EventOutcome {
    Handled,
    /// Callback from a replaced session.
    Stale,
    TrackEnded,
    Failed,
}

struct Session {
    handle: RendererHandle,
    item: TrackItem,
    /// Start playing once the renderer reports ready.
    autoplay: bool,
}

#[derive(Clone, Copy, Debug)]
struct PendingSeek {
    token: SeekToken,
    target: f64,
    /// State to enter once the seek settles.
    resume: PlaybackState,
}

/// One-shot per-track reports.
#[derive(Default)]
struct Reported {
    can_play: bool,
    duration: bool,
    loaded: bool,
}

pub(crate) struct TransportController {
    state: PlaybackState,
    session: Option<Session>,
    /// Stream unloaded on pause, reloaded on the next play.
    suspended: Option<TrackItem>,
    rate: f64,
    volume: f64,
    position: f64,
    duration: Option<f64>,
    buffer: (f64, f64),
    pending_seek: Option<PendingSeek>,
    next_token: u64,
    reset_stream_on_pause: bool,
    reported: Reported,
}

impl TransportController {
    pub(crate) fn new(rate: f64, volume: f64, reset_stream_on_pause: bool) -> Self {
        Self {
            state: PlaybackState::Idle,
            session: None,
            suspended: None,
            rate,
            volume,
            position: 0.0,
            duration: None,
            buffer: (0.0, 0.0),
            pending_seek: None,
            next_token: 0,
            reset_stream_on_pause,
            reported: Reported::default(),
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub(crate) fn buffer(&self) -> (f64, f64) {
        self.buffer
    }

    pub(crate) fn rate(&self) -> f64 {
        self.rate
    }

    pub(crate) fn volume(&self) -> f64 {
        self.volume
    }

    pub(crate) fn set_reset_stream_on_pause(&mut self, value: bool) {
        self.reset_stream_on_pause = value;
    }

    /// Whether the user intends playback to be running, used to carry play/pause across
    /// track changes.
    pub(crate) fn wants_playback(&self) -> bool {
        match self.state {
            PlaybackState::Playing | PlaybackState::Ended => true,
            PlaybackState::Loading => self.session.as_ref().is_some_and(|s| s.autoplay),
            PlaybackState::Seeking => self
                .pending_seek
                .is_some_and(|p| p.resume == PlaybackState::Playing),
            _ => false,
        }
    }

    /// Open `item` at `start_at`, replacing any current session.
    pub(crate) fn load(
        &mut self,
        renderer: &mut dyn Renderer,
        item: &TrackItem,
        start_at: f64,
        autoplay: bool,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        self.release_session(renderer);
        self.suspended = None;
        self.position = if start_at.is_finite() {
            start_at.max(0.0)
        } else {
            0.0
        };
        self.duration = None;
        self.buffer = (0.0, 0.0);
        self.reported = Reported::default();

        match renderer.load(item, self.position) {
            Ok(handle) => {
                renderer.set_rate(handle, self.rate);
                renderer.set_volume(handle, self.volume);
                tracing::debug!(
                    handle = handle.0,
                    track_id = %item.track_id,
                    start_at = self.position,
                    autoplay,
                    "renderer session loaded"
                );
                self.session = Some(Session {
                    handle,
                    item: item.clone(),
                    autoplay,
                });
                self.force_state(PlaybackState::Loading, notices);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(track_id = %item.track_id, error = %err, "renderer load failed");
                self.force_state(PlaybackState::Error, notices);
                notices.push(Notice::Failed(err.clone()));
                Err(EngineError::Renderer(err))
            }
        }
    }

    /// Use a duration learned from an earlier session of the same track until `Ready`
    /// reports one. Streams never get one.
    pub(crate) fn assume_duration(&mut self, duration: Option<f64>) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.item.is_stream || self.duration.is_some() {
            return;
        }
        self.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
    }

    pub(crate) fn play(
        &mut self,
        renderer: &mut dyn Renderer,
        notices: &mut Vec<Notice>,
    ) -> Result<PlayOutcome> {
        match self.state {
            PlaybackState::Playing => Ok(PlayOutcome::Handled),
            PlaybackState::Loading => {
                if let Some(session) = self.session.as_mut() {
                    session.autoplay = true;
                }
                Ok(PlayOutcome::Handled)
            }
            PlaybackState::Seeking => {
                if let Some(pending) = self.pending_seek.as_mut() {
                    pending.resume = PlaybackState::Playing;
                }
                if let Some(session) = self.session.as_ref() {
                    renderer.start(session.handle);
                }
                Ok(PlayOutcome::Handled)
            }
            PlaybackState::Paused => {
                if let Some(session) = self.session.as_ref() {
                    renderer.start(session.handle);
                    self.set_state(PlaybackState::Playing, notices);
                    return Ok(PlayOutcome::Handled);
                }
                if let Some(item) = self.suspended.take() {
                    let resume_at = self.position;
                    tracing::debug!(track_id = %item.track_id, resume_at, "reloading paused stream");
                    self.load(renderer, &item, resume_at, true, notices)?;
                    return Ok(PlayOutcome::Handled);
                }
                Ok(PlayOutcome::NeedsLoad)
            }
            PlaybackState::Idle
            | PlaybackState::Stopped
            | PlaybackState::Ended
            | PlaybackState::Error => Ok(PlayOutcome::NeedsLoad),
        }
    }

    pub(crate) fn pause(&mut self, renderer: &mut dyn Renderer, notices: &mut Vec<Notice>) {
        match self.state {
            PlaybackState::Playing => {
                let reset = self.reset_stream_on_pause
                    && self.session.as_ref().is_some_and(|s| s.item.is_stream);
                if reset {
                    if let Some(session) = self.session.take() {
                        renderer.unload(session.handle);
                        self.suspended = Some(session.item);
                    }
                } else if let Some(session) = self.session.as_ref() {
                    renderer.pause(session.handle);
                }
                self.set_state(PlaybackState::Paused, notices);
            }
            PlaybackState::Loading => {
                if let Some(session) = self.session.as_mut() {
                    session.autoplay = false;
                }
            }
            PlaybackState::Seeking => {
                if let Some(pending) = self.pending_seek.take() {
                    self.position = pending.target;
                }
                if let Some(session) = self.session.as_ref() {
                    renderer.pause(session.handle);
                }
                self.set_state(PlaybackState::Paused, notices);
            }
            _ => {}
        }
    }

    /// Request a seek; returns the clamped target.
    pub(crate) fn seek_to(
        &mut self,
        renderer: &mut dyn Renderer,
        requested: f64,
        notices: &mut Vec<Notice>,
    ) -> Result<f64> {
        if !requested.is_finite() {
            return Err(EngineError::InvalidRange {
                name: "position",
                value: requested,
            });
        }
        let Some(handle) = self.session.as_ref().map(|s| s.handle) else {
            return Err(if self.suspended.is_some() {
                EngineError::DurationUnknown
            } else {
                EngineError::NoCurrentTrack
            });
        };
        let duration = self.duration.ok_or(EngineError::DurationUnknown)?;
        let target = requested.clamp(0.0, duration);

        let resume = match self.state {
            PlaybackState::Seeking => self
                .pending_seek
                .map(|p| p.resume)
                .unwrap_or(PlaybackState::Paused),
            PlaybackState::Playing => PlaybackState::Playing,
            PlaybackState::Loading if self.session.as_ref().is_some_and(|s| s.autoplay) => {
                PlaybackState::Playing
            }
            _ => PlaybackState::Paused,
        };
        self.next_token = self.next_token.saturating_add(1);
        let token = SeekToken(self.next_token);
        if let Some(previous) = self.pending_seek.replace(PendingSeek {
            token,
            target,
            resume,
        }) {
            tracing::debug!(superseded = previous.target, seek_target = target, "seek superseded");
        }
        self.position = target;
        self.force_state(PlaybackState::Seeking, notices);
        renderer.seek(handle, target, token);
        Ok(target)
    }

    pub(crate) fn set_rate(&mut self, renderer: &mut dyn Renderer, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::InvalidRange {
                name: "rate",
                value: rate,
            });
        }
        self.rate = rate;
        if let Some(session) = self.session.as_ref() {
            renderer.set_rate(session.handle, rate);
        }
        Ok(())
    }

    pub(crate) fn set_volume(&mut self, renderer: &mut dyn Renderer, volume: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(EngineError::InvalidRange {
                name: "volume",
                value: volume,
            });
        }
        self.volume = volume;
        if let Some(session) = self.session.as_ref() {
            renderer.set_volume(session.handle, volume);
        }
        Ok(())
    }

    /// Unload and enter `Stopped`.
    pub(crate) fn stop(&mut self, renderer: &mut dyn Renderer, notices: &mut Vec<Notice>) {
        self.release_session(renderer);
        self.suspended = None;
        self.position = 0.0;
        self.set_state(PlaybackState::Stopped, notices);
    }

    /// Unload after the queue ran out; position stays at the end of the last track.
    pub(crate) fn finish(&mut self, renderer: &mut dyn Renderer, notices: &mut Vec<Notice>) {
        self.release_session(renderer);
        self.suspended = None;
        self.set_state(PlaybackState::Ended, notices);
    }

    /// Unload and forget the track entirely.
    pub(crate) fn reset(&mut self, renderer: &mut dyn Renderer, notices: &mut Vec<Notice>) {
        self.release_session(renderer);
        self.suspended = None;
        self.position = 0.0;
        self.duration = None;
        self.buffer = (0.0, 0.0);
        self.reported = Reported::default();
        self.set_state(PlaybackState::Idle, notices);
    }

    /// Final teardown on release; produces no notices.
    pub(crate) fn shutdown(&mut self, renderer: &mut dyn Renderer) {
        self.release_session(renderer);
        self.suspended = None;
        renderer.shutdown();
        self.state = PlaybackState::Stopped;
    }

    pub(crate) fn on_renderer_event(
        &mut self,
        renderer: &mut dyn Renderer,
        event: RendererEvent,
        notices: &mut Vec<Notice>,
    ) -> EventOutcome {
        let Some((handle, autoplay)) = self.session.as_ref().map(|s| (s.handle, s.autoplay))
        else {
            tracing::debug!(handle = event.handle().0, "renderer callback without session");
            return EventOutcome::Stale;
        };
        if event.handle() != handle {
            tracing::debug!(
                handle = event.handle().0,
                current = handle.0,
                "stale renderer callback discarded"
            );
            return EventOutcome::Stale;
        }

        match event {
            RendererEvent::Ready { duration, .. } => {
                if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
                    self.duration = Some(d);
                    if !self.reported.duration {
                        self.reported.duration = true;
                        notices.push(Notice::Duration(d));
                    }
                }
                if !self.reported.can_play {
                    self.reported.can_play = true;
                    notices.push(Notice::CanPlay);
                }
                let resume = if autoplay {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                if let Some(pending) = self.pending_seek.as_mut() {
                    pending.resume = resume;
                } else if self.state == PlaybackState::Loading {
                    if autoplay {
                        renderer.start(handle);
                    }
                    self.set_state(resume, notices);
                }
                EventOutcome::Handled
            }
            RendererEvent::PositionTick { position, .. } => {
                if self.state == PlaybackState::Seeking {
                    return EventOutcome::Handled;
                }
                self.position = position;
                if self.state == PlaybackState::Playing {
                    notices.push(Notice::Position);
                }
                EventOutcome::Handled
            }
            RendererEvent::SeekCompleted { token, position, .. } => {
                match self.pending_seek {
                    Some(pending) if pending.token == token => {
                        self.pending_seek = None;
                        self.position = pending.target;
                        tracing::debug!(seek_target = pending.target, reported = position, "seek settled");
                        notices.push(Notice::SeekSettled(pending.target));
                        if pending.resume == PlaybackState::Playing {
                            renderer.start(handle);
                        }
                        self.set_state(pending.resume, notices);
                    }
                    _ => {
                        tracing::debug!(token = token.0, "superseded seek completion ignored");
                    }
                }
                EventOutcome::Handled
            }
            RendererEvent::BufferingRangeChanged { start, end, .. } => {
                self.buffer = (start, end);
                notices.push(Notice::Buffering);
                if let Some(d) = self.duration {
                    if end >= d && !self.reported.loaded {
                        self.reported.loaded = true;
                        notices.push(Notice::Loaded);
                    }
                }
                EventOutcome::Handled
            }
            RendererEvent::Ended { .. } => {
                self.release_session(renderer);
                if let Some(d) = self.duration {
                    self.position = d;
                }
                EventOutcome::TrackEnded
            }
            RendererEvent::Error { error, .. } => {
                tracing::warn!(error = %error, "renderer reported failure");
                self.release_session(renderer);
                self.force_state(PlaybackState::Error, notices);
                notices.push(Notice::Failed(error));
                EventOutcome::Failed
            }
        }
    }

    fn release_session(&mut self, renderer: &mut dyn Renderer) {
        if let Some(session) = self.session.take() {
            renderer.unload(session.handle);
        }
        self.pending_seek = None;
    }

    fn set_state(&mut self, state: PlaybackState, notices: &mut Vec<Notice>) {
        if self.state != state {
            self.force_state(state, notices);
        }
    }

    fn force_state(&mut self, state: PlaybackState, notices: &mut Vec<Notice>) {
        self.state = state;
        notices.push(Notice::State(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, ManualRenderer};
    use playlist_types::RendererErrorKind;

    fn item(id: &str) -> TrackItem {
        TrackItem::new(id, format!("mem://{id}"))
    }

    fn loaded(
        renderer: &mut ManualRenderer,
        autoplay: bool,
        duration: Option<f64>,
    ) -> (TransportController, RendererHandle) {
        let mut transport = TransportController::new(1.0, 1.0, true);
        let mut notices = Vec::new();
        transport
            .load(renderer, &item("a"), 0.0, autoplay, &mut notices)
            .unwrap();
        let handle = renderer.control().last_handle().unwrap();
        transport.on_renderer_event(
            renderer,
            RendererEvent::Ready { handle, duration },
            &mut notices,
        );
        (transport, handle)
    }

    #[test]
    fn ready_with_autoplay_starts_renderer() {
        let mut renderer = ManualRenderer::new();
        let (transport, handle) = loaded(&mut renderer, true, Some(100.0));
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert_eq!(transport.duration(), Some(100.0));
        assert!(renderer.control().calls().contains(&Call::Start(handle)));
    }

    #[test]
    fn load_reapplies_rate_and_volume() {
        let mut renderer = ManualRenderer::new();
        let mut transport = TransportController::new(1.5, 0.25, true);
        let mut notices = Vec::new();
        transport
            .load(&mut renderer, &item("a"), 0.0, false, &mut notices)
            .unwrap();
        let handle = renderer.control().last_handle().unwrap();
        let calls = renderer.control().calls();
        assert!(calls.contains(&Call::SetRate(handle, 1.5)));
        assert!(calls.contains(&Call::SetVolume(handle, 0.25)));
        assert_eq!(notices, vec![Notice::State(PlaybackState::Loading)]);
    }

    #[test]
    fn load_failure_enters_error_state() {
        let mut renderer = ManualRenderer::new().failing("a", RendererErrorKind::Unsupported);
        let mut transport = TransportController::new(1.0, 1.0, true);
        let mut notices = Vec::new();
        let err = transport
            .load(&mut renderer, &item("a"), 0.0, true, &mut notices)
            .unwrap_err();
        assert_eq!(err.code(), "renderer_error");
        assert_eq!(transport.state(), PlaybackState::Error);
        assert!(matches!(notices.last(), Some(Notice::Failed(_))));
    }

    #[test]
    fn stale_callbacks_are_discarded() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, handle) = loaded(&mut renderer, true, Some(10.0));
        let mut notices = Vec::new();
        let outcome = transport.on_renderer_event(
            &mut renderer,
            RendererEvent::Ended {
                handle: RendererHandle(handle.0 + 40),
            },
            &mut notices,
        );
        assert_eq!(outcome, EventOutcome::Stale);
        assert!(notices.is_empty());
        assert_eq!(transport.state(), PlaybackState::Playing);
    }

    #[test]
    fn seek_clamps_into_duration() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, _) = loaded(&mut renderer, false, Some(100.0));
        let mut notices = Vec::new();
        assert_eq!(transport.seek_to(&mut renderer, -5.0, &mut notices), Ok(0.0));
        assert_eq!(transport.seek_to(&mut renderer, 150.0, &mut notices), Ok(100.0));
        assert_eq!(transport.state(), PlaybackState::Seeking);
    }

    #[test]
    fn known_duration_allows_seek_before_ready() {
        let mut renderer = ManualRenderer::new();
        let mut transport = TransportController::new(1.0, 1.0, true);
        let mut notices = Vec::new();
        transport
            .load(&mut renderer, &item("a"), 0.0, false, &mut notices)
            .unwrap();
        assert_eq!(
            transport.seek_to(&mut renderer, 5.0, &mut notices),
            Err(EngineError::DurationUnknown)
        );
        transport.assume_duration(Some(60.0));
        assert_eq!(transport.seek_to(&mut renderer, 90.0, &mut notices), Ok(60.0));

        let mut stream = item("live");
        stream.is_stream = true;
        transport
            .load(&mut renderer, &stream, 0.0, false, &mut notices)
            .unwrap();
        transport.assume_duration(Some(60.0));
        assert_eq!(transport.duration(), None);
    }

    #[test]
    fn seek_without_duration_is_rejected() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, _) = loaded(&mut renderer, false, None);
        let mut notices = Vec::new();
        assert_eq!(
            transport.seek_to(&mut renderer, 5.0, &mut notices),
            Err(EngineError::DurationUnknown)
        );

        let mut idle = TransportController::new(1.0, 1.0, true);
        assert_eq!(
            idle.seek_to(&mut renderer, 5.0, &mut notices),
            Err(EngineError::NoCurrentTrack)
        );
    }

    #[test]
    fn superseded_seek_settles_on_latest_target() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, handle) = loaded(&mut renderer, true, Some(100.0));
        let mut notices = Vec::new();
        transport.seek_to(&mut renderer, 10.0, &mut notices).unwrap();
        transport.seek_to(&mut renderer, 40.0, &mut notices).unwrap();

        let tokens: Vec<SeekToken> = renderer
            .control()
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Seek(_, _, token) => Some(token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens.len(), 2);

        notices.clear();
        transport.on_renderer_event(
            &mut renderer,
            RendererEvent::SeekCompleted {
                handle,
                token: tokens[0],
                position: 10.0,
            },
            &mut notices,
        );
        assert_eq!(transport.state(), PlaybackState::Seeking);
        assert!(notices.is_empty());

        transport.on_renderer_event(
            &mut renderer,
            RendererEvent::SeekCompleted {
                handle,
                token: tokens[1],
                position: 40.0,
            },
            &mut notices,
        );
        assert_eq!(transport.position(), 40.0);
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert_eq!(
            notices,
            vec![
                Notice::SeekSettled(40.0),
                Notice::State(PlaybackState::Playing)
            ]
        );
    }

    #[test]
    fn position_ticks_are_ignored_while_seeking() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, handle) = loaded(&mut renderer, true, Some(100.0));
        let mut notices = Vec::new();
        transport.seek_to(&mut renderer, 30.0, &mut notices).unwrap();
        transport.on_renderer_event(
            &mut renderer,
            RendererEvent::PositionTick {
                handle,
                position: 3.0,
            },
            &mut notices,
        );
        assert_eq!(transport.position(), 30.0);
    }

    #[test]
    fn pause_supersedes_pending_seek() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, _) = loaded(&mut renderer, true, Some(100.0));
        let mut notices = Vec::new();
        transport.seek_to(&mut renderer, 20.0, &mut notices).unwrap();
        transport.pause(&mut renderer, &mut notices);
        assert_eq!(transport.state(), PlaybackState::Paused);
        assert_eq!(transport.position(), 20.0);
        assert!(!transport.wants_playback());
    }

    #[test]
    fn paused_stream_is_unloaded_and_reloaded_on_play() {
        let mut renderer = ManualRenderer::new();
        let mut transport = TransportController::new(1.0, 1.0, true);
        let mut notices = Vec::new();
        let mut stream = item("radio");
        stream.is_stream = true;
        transport
            .load(&mut renderer, &stream, 0.0, true, &mut notices)
            .unwrap();
        let first = renderer.control().last_handle().unwrap();
        transport.on_renderer_event(
            &mut renderer,
            RendererEvent::Ready {
                handle: first,
                duration: None,
            },
            &mut notices,
        );

        transport.pause(&mut renderer, &mut notices);
        assert_eq!(transport.state(), PlaybackState::Paused);
        assert!(renderer.control().calls().contains(&Call::Unload(first)));

        assert_eq!(
            transport.play(&mut renderer, &mut notices),
            Ok(PlayOutcome::Handled)
        );
        assert_eq!(transport.state(), PlaybackState::Loading);
        assert_ne!(renderer.control().last_handle(), Some(first));
    }

    #[test]
    fn buffer_reaching_duration_reports_loaded_once() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, handle) = loaded(&mut renderer, false, Some(8.0));
        let mut notices = Vec::new();
        for end in [4.0, 8.0, 8.0] {
            transport.on_renderer_event(
                &mut renderer,
                RendererEvent::BufferingRangeChanged {
                    handle,
                    start: 0.0,
                    end,
                },
                &mut notices,
            );
        }
        let loaded = notices.iter().filter(|n| **n == Notice::Loaded).count();
        assert_eq!(loaded, 1);
        assert_eq!(transport.buffer(), (0.0, 8.0));
    }

    #[test]
    fn invalid_rate_and_volume_keep_previous_values() {
        let mut renderer = ManualRenderer::new();
        let (mut transport, _) = loaded(&mut renderer, false, Some(8.0));
        assert!(transport.set_volume(&mut renderer, -0.1).is_err());
        assert!(transport.set_rate(&mut renderer, 0.0).is_err());
        assert_eq!(transport.volume(), 1.0);
        assert_eq!(transport.rate(), 1.0);
        transport.set_volume(&mut renderer, 0.4).unwrap();
        assert_eq!(transport.volume(), 0.4);
    }
}
