//! Engine worker thread.
//!
//! Every command and every renderer callback is funneled through one channel and handled
//! here in arrival order, so catalog, cursor, and transport never race each other.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use playlist_types::{
    PlaybackState, PlaylistItemOptions, StatusMessage, StatusSnapshot, TrackItem, TrackRef,
};
use serde_json::json;

use crate::catalog::Catalog;
use crate::config::{EngineConfig, EngineOptions};
use crate::error::{EngineError, Result};
use crate::navigator::{QueueNavigator, Removal, Step};
use crate::renderer::{Renderer, RendererEvent};
use crate::status::{SharedSnapshot, StatusListener, StatusReporter};
use crate::transport::{EventOutcome, Notice, PlayOutcome, TransportController};

pub(crate) type Reply<T> = Sender<Result<T>>;

/// Messages processed by the worker.
pub(crate) enum Command {
    Initialize {
        listener: Box<dyn StatusListener>,
        reply: Reply<()>,
    },
    SetOptions {
        options: EngineOptions,
        reply: Reply<()>,
    },
    SetPlaylistItems {
        items: Vec<TrackItem>,
        options: PlaylistItemOptions,
        reply: Reply<()>,
    },
    AddItem {
        item: TrackItem,
        index: Option<usize>,
        reply: Reply<()>,
    },
    AddAllItems {
        items: Vec<TrackItem>,
        index: Option<usize>,
        reply: Reply<()>,
    },
    RemoveItem {
        target: TrackRef,
        reply: Reply<Option<TrackItem>>,
    },
    RemoveItems {
        targets: Vec<TrackRef>,
        reply: Reply<usize>,
    },
    ClearAllItems {
        reply: Reply<()>,
    },
    Play {
        reply: Reply<()>,
    },
    PlayByIndex {
        index: usize,
        position: Option<f64>,
        reply: Reply<()>,
    },
    PlayById {
        track_id: String,
        position: Option<f64>,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    SkipForward {
        reply: Reply<()>,
    },
    SkipBack {
        reply: Reply<()>,
    },
    SeekTo {
        position: f64,
        reply: Reply<f64>,
    },
    SeekToQueuePosition {
        index: usize,
        reply: Reply<()>,
    },
    SetRate {
        rate: f64,
        reply: Reply<()>,
    },
    SetVolume {
        volume: f64,
        reply: Reply<()>,
    },
    SetLoopAll {
        enabled: bool,
        reply: Reply<()>,
    },
    /// Replies once the queue is empty, including callbacks raised while draining it.
    Flush {
        reply: Reply<()>,
    },
    Renderer(RendererEvent),
    Release {
        reply: Reply<()>,
    },
}

pub(crate) struct EngineWorker {
    catalog: Catalog,
    navigator: QueueNavigator,
    transport: TransportController,
    reporter: StatusReporter,
    renderer: Box<dyn Renderer>,
    loop_all: bool,
}

impl EngineWorker {
    pub(crate) fn new(
        renderer: Box<dyn Renderer>,
        config: &EngineConfig,
        snapshot: SharedSnapshot,
    ) -> Self {
        let worker = Self {
            catalog: Catalog::default(),
            navigator: QueueNavigator::default(),
            transport: TransportController::new(
                config.initial_rate,
                config.initial_volume,
                config.reset_stream_on_pause,
            ),
            reporter: StatusReporter::new(snapshot, config.position_interval()),
            renderer,
            loop_all: config.loop_all,
        };
        worker.reporter.publish(worker.snapshot());
        worker
    }

    /// Main command loop; returns after `Release` or once every sender is gone.
    pub(crate) fn run(mut self, cmd_rx: Receiver<Command>) {
        while let Ok(cmd) = cmd_rx.recv() {
            if !self.dispatch(cmd, &cmd_rx) {
                return;
            }
        }
        tracing::debug!("command channel closed");
        self.release();
    }

    /// Handle one command. Returns `false` once the engine was released.
    fn dispatch(&mut self, cmd: Command, cmd_rx: &Receiver<Command>) -> bool {
        match cmd {
            Command::Release { reply } => {
                self.release();
                let _ = reply.send(Ok(()));
                false
            }
            Command::Flush { reply } => {
                // Callbacks raised while draining are queued behind us; keep going until empty.
                while let Ok(next) = cmd_rx.try_recv() {
                    if !self.dispatch(next, cmd_rx) {
                        return false;
                    }
                }
                let _ = reply.send(Ok(()));
                true
            }
            cmd => {
                self.handle(cmd);
                true
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Initialize { listener, reply } => {
                self.reporter.set_listener(listener);
                let snap = self.snapshot();
                self.reporter.emit(
                    StatusMessage::Register,
                    None,
                    serde_json::to_value(&snap).unwrap_or_default(),
                );
                let _ = reply.send(Ok(()));
            }
            Command::SetOptions { options, reply } => {
                if let Some(value) = options.reset_stream_on_pause {
                    self.transport.set_reset_stream_on_pause(value);
                }
                let _ = reply.send(Ok(()));
            }
            Command::SetPlaylistItems {
                items,
                options,
                reply,
            } => {
                let _ = reply.send(self.set_playlist_items(items, options));
            }
            Command::AddItem { item, index, reply } => {
                let _ = reply.send(self.add_items(vec![item], index));
            }
            Command::AddAllItems {
                items,
                index,
                reply,
            } => {
                let _ = reply.send(self.add_items(items, index));
            }
            Command::RemoveItem { target, reply } => {
                let removed = self
                    .catalog
                    .resolve(&target)
                    .and_then(|index| self.remove_at(index));
                let _ = reply.send(Ok(removed));
            }
            Command::RemoveItems { targets, reply } => {
                let mut removed = 0;
                for target in &targets {
                    if let Some(index) = self.catalog.resolve(target) {
                        if self.remove_at(index).is_some() {
                            removed += 1;
                        }
                    }
                }
                let _ = reply.send(Ok(removed));
            }
            Command::ClearAllItems { reply } => {
                self.clear_all();
                let _ = reply.send(Ok(()));
            }
            Command::Play { reply } => {
                let _ = reply.send(self.play());
            }
            Command::PlayByIndex {
                index,
                position,
                reply,
            } => {
                let result = QueueNavigator::check_index(index, self.catalog.len())
                    .and_then(|index| self.load_index(index, position.unwrap_or(0.0), true));
                let _ = reply.send(result);
            }
            Command::PlayById {
                track_id,
                position,
                reply,
            } => {
                let result = match self.catalog.position_of(&track_id) {
                    Some(index) => self.load_index(index, position.unwrap_or(0.0), true),
                    None => Err(EngineError::TrackNotFound(track_id)),
                };
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                let mut notices = Vec::new();
                self.transport.pause(self.renderer.as_mut(), &mut notices);
                self.apply(notices);
                let _ = reply.send(Ok(()));
            }
            Command::SkipForward { reply } => {
                let _ = reply.send(self.skip_forward());
            }
            Command::SkipBack { reply } => {
                let _ = reply.send(self.skip_back());
            }
            Command::SeekTo { position, reply } => {
                let mut notices = Vec::new();
                let result =
                    self.transport
                        .seek_to(self.renderer.as_mut(), position, &mut notices);
                self.apply(notices);
                let _ = reply.send(result);
            }
            Command::SeekToQueuePosition { index, reply } => {
                let autoplay = self.transport.wants_playback();
                let result = QueueNavigator::check_index(index, self.catalog.len())
                    .and_then(|index| self.load_index(index, 0.0, autoplay));
                let _ = reply.send(result);
            }
            Command::SetRate { rate, reply } => {
                let result = self.transport.set_rate(self.renderer.as_mut(), rate);
                if result.is_ok() {
                    self.publish_and_emit(StatusMessage::RateChanged);
                }
                let _ = reply.send(result);
            }
            Command::SetVolume { volume, reply } => {
                let result = self.transport.set_volume(self.renderer.as_mut(), volume);
                if result.is_ok() {
                    self.publish_and_emit(StatusMessage::VolumeChanged);
                }
                let _ = reply.send(result);
            }
            Command::SetLoopAll { enabled, reply } => {
                if self.loop_all != enabled {
                    self.loop_all = enabled;
                    self.publish_and_emit(StatusMessage::LoopChanged);
                }
                let _ = reply.send(Ok(()));
            }
            Command::Renderer(event) => self.on_renderer_event(event),
            Command::Flush { .. } | Command::Release { .. } => {}
        }
    }

    fn set_playlist_items(
        &mut self,
        items: Vec<TrackItem>,
        options: PlaylistItemOptions,
    ) -> Result<()> {
        let retained_id = self.current_track_id();
        let retained_position = self.transport.position();

        self.catalog.replace(items)?;
        self.navigator.clear();
        let mut notices = Vec::new();
        self.transport.reset(self.renderer.as_mut(), &mut notices);
        let unloaded = !notices.is_empty();
        self.apply(notices);
        self.reporter.publish(self.snapshot());
        if unloaded {
            // Idle has no state message of its own.
            self.emit_snapshot(StatusMessage::PlaylistCleared);
        }
        tracing::info!(tracks = self.catalog.len(), "playlist replaced");

        let added: Vec<TrackItem> = self.catalog.iter().map(|t| t.item.clone()).collect();
        for item in added {
            self.emit_item(StatusMessage::ItemAdded, &item);
        }
        if self.catalog.is_empty() {
            return Ok(());
        }

        let requested = options
            .play_from_id
            .as_deref()
            .and_then(|id| self.catalog.position_of(id));
        let retained = if options.retain_position {
            retained_id
                .as_deref()
                .and_then(|id| self.catalog.position_of(id))
        } else {
            None
        };
        let (index, start_at) = match (requested, retained) {
            (Some(index), _) => (index, options.play_from_position.unwrap_or(0.0)),
            (None, Some(index)) => (
                index,
                options.play_from_position.unwrap_or(retained_position),
            ),
            (None, None) => (0, options.play_from_position.unwrap_or(0.0)),
        };
        self.load_index(index, start_at, !options.start_paused)
    }

    fn add_items(&mut self, items: Vec<TrackItem>, index: Option<usize>) -> Result<()> {
        let count = items.len();
        let added = items.clone();
        let at = self.catalog.insert_all(items, index)?;
        self.navigator.on_inserted(at, count);
        tracing::debug!(at, count, "items added");
        for item in &added {
            self.emit_item(StatusMessage::ItemAdded, item);
        }
        self.reporter.publish(self.snapshot());
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Option<TrackItem> {
        let intent = self.transport.wants_playback();
        let track = self.catalog.remove(index)?;
        let removal = self.navigator.on_removed(index, self.catalog.len());
        tracing::debug!(index, track_id = %track.item.track_id, "item removed");
        self.emit_item(StatusMessage::ItemRemoved, &track.item);

        match removal {
            Removal::Unaffected => self.reporter.publish(self.snapshot()),
            Removal::CurrentRemoved {
                successor: Some(next),
            } => {
                if let Err(err) = self.load_index(next, 0.0, intent) {
                    tracing::warn!(error = %err, "failed to load successor of removed track");
                }
            }
            Removal::CurrentRemoved { successor: None } => {
                let mut notices = Vec::new();
                self.transport.stop(self.renderer.as_mut(), &mut notices);
                self.apply(notices);
            }
        }
        Some(track.item)
    }

    fn clear_all(&mut self) {
        self.catalog.clear();
        self.navigator.clear();
        let mut notices = Vec::new();
        self.transport.reset(self.renderer.as_mut(), &mut notices);
        self.apply(notices);
        self.publish_and_emit(StatusMessage::PlaylistCleared);
    }

    fn play(&mut self) -> Result<()> {
        if self.catalog.is_empty() {
            return Err(EngineError::NoCurrentTrack);
        }
        let state = self.transport.state();
        let mut notices = Vec::new();
        let outcome = self.transport.play(self.renderer.as_mut(), &mut notices);
        self.apply(notices);
        match outcome? {
            PlayOutcome::Handled => Ok(()),
            PlayOutcome::NeedsLoad => {
                let index = match (state, self.navigator.current()) {
                    (PlaybackState::Ended, _) | (_, None) => 0,
                    (_, Some(index)) => index,
                };
                self.load_index(index, 0.0, true)
            }
        }
    }

    fn skip_forward(&mut self) -> Result<()> {
        let already_ended =
            self.navigator.is_past_end() && self.transport.state() == PlaybackState::Ended;
        match self.navigator.next(self.catalog.len(), self.loop_all) {
            Step::Moved(index) | Step::Wrapped(index) => {
                let autoplay = self.transport.wants_playback();
                self.emit_snapshot(StatusMessage::SkipForward);
                self.load_index(index, 0.0, autoplay)
            }
            Step::QueueEnd if self.navigator.current().is_some() && !already_ended => {
                self.finish_queue();
                Ok(())
            }
            Step::QueueEnd | Step::Stay => Ok(()),
        }
    }

    fn skip_back(&mut self) -> Result<()> {
        match self.navigator.previous(self.catalog.len(), self.loop_all) {
            Step::Moved(index) | Step::Wrapped(index) => {
                let autoplay = self.transport.wants_playback();
                self.emit_snapshot(StatusMessage::SkipBack);
                self.load_index(index, 0.0, autoplay)
            }
            Step::QueueEnd | Step::Stay => Ok(()),
        }
    }

    fn finish_queue(&mut self) {
        self.navigator.mark_past_end();
        let mut notices = Vec::new();
        self.transport.finish(self.renderer.as_mut(), &mut notices);
        self.apply(notices);
        tracing::info!("queue ended");
        self.emit_snapshot(StatusMessage::PlaylistCompleted);
    }

    /// Make `index` current and open it in the renderer.
    fn load_index(&mut self, index: usize, start_at: f64, autoplay: bool) -> Result<()> {
        let Some(item) = self.catalog.get(index).map(|t| t.item.clone()) else {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.catalog.len(),
            });
        };
        let known_duration = self.catalog.get(index).and_then(|t| t.duration);
        self.navigator.select(index);
        let mut notices = Vec::new();
        let result = self.transport.load(
            self.renderer.as_mut(),
            &item,
            start_at,
            autoplay,
            &mut notices,
        );
        if result.is_ok() {
            self.transport.assume_duration(known_duration);
        }
        let snap = self.snapshot();
        self.reporter.publish(snap.clone());
        self.reporter.emit(
            StatusMessage::TrackChanged,
            Some(item.track_id.clone()),
            json!({
                "currentItem": item,
                "currentIndex": index,
                "hasNext": snap.has_next,
                "hasPrevious": snap.has_previous,
                "isAtBeginning": index == 0,
                "isAtEnd": index + 1 == self.catalog.len(),
            }),
        );
        self.apply(notices);
        result
    }

    fn on_renderer_event(&mut self, event: RendererEvent) {
        let mut notices = Vec::new();
        let outcome =
            self.transport
                .on_renderer_event(self.renderer.as_mut(), event, &mut notices);
        self.apply(notices);
        if outcome == EventOutcome::TrackEnded {
            self.on_track_ended();
        }
    }

    fn on_track_ended(&mut self) {
        self.emit_snapshot(StatusMessage::Completed);
        match self.navigator.next(self.catalog.len(), self.loop_all) {
            Step::Moved(index) | Step::Wrapped(index) => {
                if let Err(err) = self.load_index(index, 0.0, true) {
                    tracing::warn!(error = %err, index, "auto-advance failed");
                }
            }
            Step::QueueEnd | Step::Stay => self.finish_queue(),
        }
    }

    fn release(&mut self) {
        self.transport.shutdown(self.renderer.as_mut());
        self.reporter.publish(self.snapshot());
        self.reporter.close();
        tracing::info!("engine released");
    }

    /// Publish the snapshot and turn transport notices into listener events.
    fn apply(&mut self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let snap = self.snapshot();
        self.reporter.publish(snap.clone());
        let now = Instant::now();
        for notice in notices {
            match notice {
                Notice::State(state) => {
                    if let Some(msg) = state_message(state) {
                        self.reporter.emit_status(msg, &snap);
                    }
                }
                Notice::CanPlay => self.reporter.emit_status(StatusMessage::CanPlay, &snap),
                Notice::Duration(duration) => {
                    if let Some(index) = self.navigator.current() {
                        self.catalog.set_duration(index, duration);
                    }
                    self.reporter.emit_status(StatusMessage::Duration, &snap);
                }
                Notice::Buffering => self.reporter.emit_status(StatusMessage::Buffering, &snap),
                Notice::Loaded => self.reporter.emit_status(StatusMessage::Loaded, &snap),
                Notice::Position => {
                    if snap.status == PlaybackState::Playing {
                        self.reporter.emit_position(&snap, now);
                    }
                }
                Notice::SeekSettled(_) => self.reporter.force_position(&snap, now),
                Notice::Failed(error) => {
                    self.reporter.emit(
                        StatusMessage::Error,
                        snap.track_id.clone(),
                        json!({
                            "code": "renderer_error",
                            "kind": error.kind.as_str(),
                            "message": error.message,
                        }),
                    );
                }
            }
        }
    }

    fn publish_and_emit(&mut self, msg: StatusMessage) {
        let snap = self.snapshot();
        self.reporter.publish(snap.clone());
        self.reporter.emit_status(msg, &snap);
    }

    fn emit_snapshot(&self, msg: StatusMessage) {
        self.reporter.emit_status(msg, &self.snapshot());
    }

    fn emit_item(&self, msg: StatusMessage, item: &TrackItem) {
        self.reporter.emit(
            msg,
            Some(item.track_id.clone()),
            serde_json::to_value(item).unwrap_or_default(),
        );
    }

    fn current_track_id(&self) -> Option<String> {
        self.navigator
            .current()
            .and_then(|i| self.catalog.get(i))
            .map(|t| t.item.track_id.clone())
    }

    fn snapshot(&self) -> StatusSnapshot {
        let len = self.catalog.len();
        let current = self.navigator.current();
        let track = current.and_then(|i| self.catalog.get(i));
        let position = self.transport.position();
        let duration = self.transport.duration();
        let (buffer_start, buffer_end) = self.transport.buffer();
        let (playback_percent, buffer_percent) = match duration {
            Some(d) if d > 0.0 => (
                (position / d * 100.0).clamp(0.0, 100.0),
                ((buffer_end - buffer_start) / d * 100.0).clamp(0.0, 100.0),
            ),
            _ => (0.0, 0.0),
        };
        StatusSnapshot {
            status: self.transport.state(),
            track_id: track.map(|t| t.item.track_id.clone()),
            is_stream: track.is_some_and(|t| t.item.is_stream),
            current_index: current,
            queue_length: len,
            current_position: position,
            duration,
            playback_percent,
            buffer_percent,
            buffer_start,
            buffer_end,
            rate: self.transport.rate(),
            volume: self.transport.volume(),
            loop_all: self.loop_all,
            has_next: self.navigator.has_next(len, self.loop_all),
            has_previous: self.navigator.has_previous(len, self.loop_all),
        }
    }
}

fn state_message(state: PlaybackState) -> Option<StatusMessage> {
    match state {
        PlaybackState::Loading => Some(StatusMessage::Loading),
        PlaybackState::Playing => Some(StatusMessage::Playing),
        PlaybackState::Paused => Some(StatusMessage::Pause),
        PlaybackState::Seeking => Some(StatusMessage::Seek),
        PlaybackState::Stopped => Some(StatusMessage::Stopped),
        // Idle, Ended and Error are announced by PlaylistCleared, PlaylistCompleted and Error.
        PlaybackState::Idle | PlaybackState::Ended | PlaybackState::Error => None,
    }
}
