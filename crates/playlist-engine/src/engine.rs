//! Public command surface.
//!
//! [`PlaylistEngine`] is a handle to a worker thread. Mutating operations are queued and
//! block until the worker has validated and applied them; accessors read the last published
//! snapshot directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::Sender;
use playlist_types::{BufferStatus, PlaylistItemOptions, StatusSnapshot, TrackItem, TrackRef};

use crate::config::{EngineConfig, EngineOptions};
use crate::error::{EngineError, Result};
use crate::renderer::{Renderer, RendererSink};
use crate::status::{SharedSnapshot, StatusListener};
use crate::worker::{Command, EngineWorker, Reply};

pub struct PlaylistEngine {
    cmd_tx: Sender<Command>,
    snapshot: SharedSnapshot,
    released: AtomicBool,
    join: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PlaylistEngine {
    /// Spawn the engine worker driving `renderer`.
    pub fn new<R>(mut renderer: R, config: EngineConfig) -> Self
    where
        R: Renderer + 'static,
    {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        renderer.attach(RendererSink::new(cmd_tx.clone()));
        let snapshot: SharedSnapshot = Arc::new(RwLock::new(StatusSnapshot::default()));
        let worker = EngineWorker::new(Box::new(renderer), &config, snapshot.clone());
        let join = std::thread::spawn(move || worker.run(cmd_rx));
        tracing::debug!(?config, "engine started");
        Self {
            cmd_tx,
            snapshot,
            released: AtomicBool::new(false),
            join: Mutex::new(Some(join)),
        }
    }

    /// Register the status listener (replacing any previous one) and emit `register`.
    ///
    /// The listener runs on the worker thread. It must not call mutating operations or
    /// `flush` on this engine: those wait for the worker and would never return.
    /// Accessors such as [`PlaylistEngine::status`] are safe to call from it.
    pub fn initialize<L>(&self, listener: L) -> Result<()>
    where
        L: StatusListener + 'static,
    {
        let listener: Box<dyn StatusListener> = Box::new(listener);
        self.request(|reply| Command::Initialize { listener, reply })
    }

    pub fn set_options(&self, options: EngineOptions) -> Result<()> {
        self.request(|reply| Command::SetOptions { options, reply })
    }

    /// Replace the whole playlist and load its starting track.
    pub fn set_playlist_items(
        &self,
        items: Vec<TrackItem>,
        options: PlaylistItemOptions,
    ) -> Result<()> {
        self.request(|reply| Command::SetPlaylistItems {
            items,
            options,
            reply,
        })
    }

    pub fn add_item(&self, item: TrackItem, index: Option<usize>) -> Result<()> {
        self.request(|reply| Command::AddItem { item, index, reply })
    }

    /// Insert several items; nothing is added if any of them is rejected.
    pub fn add_all_items(&self, items: Vec<TrackItem>, index: Option<usize>) -> Result<()> {
        self.request(|reply| Command::AddAllItems {
            items,
            index,
            reply,
        })
    }

    /// Remove one item. Returns `None` when nothing matched.
    pub fn remove_item(&self, target: TrackRef) -> Result<Option<TrackItem>> {
        self.request(|reply| Command::RemoveItem { target, reply })
    }

    /// Remove several items, resolving each reference in turn. Returns the removed count.
    pub fn remove_items(&self, targets: Vec<TrackRef>) -> Result<usize> {
        self.request(|reply| Command::RemoveItems { targets, reply })
    }

    pub fn clear_all_items(&self) -> Result<()> {
        self.request(|reply| Command::ClearAllItems { reply })
    }

    pub fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply })
    }

    pub fn play_track_by_index(&self, index: usize, position: Option<f64>) -> Result<()> {
        self.request(|reply| Command::PlayByIndex {
            index,
            position,
            reply,
        })
    }

    pub fn play_track_by_id(&self, track_id: &str, position: Option<f64>) -> Result<()> {
        let track_id = track_id.to_string();
        self.request(|reply| Command::PlayById {
            track_id,
            position,
            reply,
        })
    }

    pub fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply })
    }

    pub fn skip_forward(&self) -> Result<()> {
        self.request(|reply| Command::SkipForward { reply })
    }

    pub fn skip_back(&self) -> Result<()> {
        self.request(|reply| Command::SkipBack { reply })
    }

    /// Seek within the current track. Returns the clamped target.
    pub fn seek_to(&self, position: f64) -> Result<f64> {
        self.request(|reply| Command::SeekTo { position, reply })
    }

    /// Jump to the track at `index`, keeping the current play/pause intent.
    pub fn seek_to_queue_position(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::SeekToQueuePosition { index, reply })
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.request(|reply| Command::SetRate { rate, reply })
    }

    pub fn set_playback_volume(&self, volume: f64) -> Result<()> {
        self.request(|reply| Command::SetVolume { volume, reply })
    }

    pub fn set_loop_all(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetLoopAll { enabled, reply })
    }

    /// Wait until the worker has drained its queue, including renderer callbacks raised on the way.
    pub fn flush(&self) -> Result<()> {
        self.request(|reply| Command::Flush { reply })
    }

    /// Stop playback, drop the listener and join the worker. Safe to call more than once.
    pub fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (reply, done) = crossbeam_channel::bounded(1);
        if self.cmd_tx.send(Command::Release { reply }).is_ok() {
            let _ = done.recv();
        }
        let join = self.join.lock().ok().and_then(|mut j| j.take());
        if let Some(join) = join {
            if join.join().is_err() {
                tracing::warn!("engine worker panicked");
            }
        }
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Result<StatusSnapshot> {
        self.read(|s| s.clone())
    }

    pub fn get_playback_rate(&self) -> Result<f64> {
        self.read(|s| s.rate)
    }

    pub fn get_playback_volume(&self) -> Result<f64> {
        self.read(|s| s.volume)
    }

    pub fn get_playback_position(&self) -> Result<f64> {
        self.read(|s| s.current_position)
    }

    pub fn get_current_buffer(&self) -> Result<BufferStatus> {
        self.read(|s| BufferStatus {
            buffer_start: s.buffer_start,
            buffer_end: s.buffer_end,
            buffer_percent: s.buffer_percent,
        })
    }

    pub fn get_total_duration(&self) -> Result<Option<f64>> {
        self.read(|s| s.duration)
    }

    pub fn get_queue_position(&self) -> Result<Option<usize>> {
        self.read(|s| s.current_index)
    }

    pub fn get_loop_all(&self) -> Result<bool> {
        self.read(|s| s.loop_all)
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        if self.is_released() {
            return Err(EngineError::Disposed);
        }
        let (reply, response) = crossbeam_channel::bounded(1);
        self.cmd_tx
            .send(build(reply))
            .map_err(|_| EngineError::Disposed)?;
        response.recv().map_err(|_| EngineError::Disposed)?
    }

    fn read<T>(&self, f: impl FnOnce(&StatusSnapshot) -> T) -> Result<T> {
        if self.is_released() {
            return Err(EngineError::Disposed);
        }
        let guard = self.snapshot.read().map_err(|_| EngineError::Disposed)?;
        Ok(f(&guard))
    }
}

impl Drop for PlaylistEngine {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
