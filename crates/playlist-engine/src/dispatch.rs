//! Method-name dispatch for host bridges.
//!
//! Hosts talk to the engine with `(method, args)` pairs using the camelCase method names of
//! the plugin surface. Listener registration is not dispatchable; hosts call
//! [`PlaylistEngine::initialize`] directly.

use playlist_types::{ErrorDescriptor, PlaylistItemOptions, TrackItem, TrackRef};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::EngineOptions;
use crate::engine::PlaylistEngine;
use crate::error::Result;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPlaylistItemsArgs {
    items: Vec<TrackItem>,
    #[serde(default)]
    options: PlaylistItemOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemArgs {
    item: TrackItem,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddAllItemsArgs {
    items: Vec<TrackItem>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayByIndexArgs {
    index: usize,
    #[serde(default)]
    position: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayByIdArgs {
    track_id: String,
    #[serde(default)]
    position: Option<f64>,
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> std::result::Result<T, ErrorDescriptor> {
    serde_json::from_value(args).map_err(|e| ErrorDescriptor {
        code: "invalid_arguments".to_string(),
        message: format!("{method}: {e}"),
    })
}

fn done(result: Result<()>) -> std::result::Result<Value, ErrorDescriptor> {
    result.map(|_| Value::Null).map_err(|e| e.descriptor())
}

fn value<T: serde::Serialize>(result: Result<T>) -> std::result::Result<Value, ErrorDescriptor> {
    result
        .map(|v| serde_json::to_value(v).unwrap_or_default())
        .map_err(|e| e.descriptor())
}

impl PlaylistEngine {
    /// Invoke an operation by its host method name.
    pub fn dispatch(&self, method: &str, args: Value) -> std::result::Result<Value, ErrorDescriptor> {
        tracing::debug!(method, "dispatch");
        match method {
            "setOptions" => done(self.set_options(parse::<EngineOptions>(method, args)?)),
            "setPlaylistItems" => {
                let a: SetPlaylistItemsArgs = parse(method, args)?;
                done(self.set_playlist_items(a.items, a.options))
            }
            "addItem" => {
                let a: AddItemArgs = parse(method, args)?;
                done(self.add_item(a.item, a.index))
            }
            "addAllItems" => {
                let a: AddAllItemsArgs = parse(method, args)?;
                done(self.add_all_items(a.items, a.index))
            }
            "removeItem" => {
                let target: TrackRef = parse(method, args)?;
                value(self.remove_item(target).map(|removed| removed.is_some()))
            }
            "removeItems" => {
                let targets: Vec<TrackRef> = parse(method, args)?;
                value(self.remove_items(targets))
            }
            "clearAllItems" => done(self.clear_all_items()),
            "play" => done(self.play()),
            "playTrackByIndex" => {
                let a: PlayByIndexArgs = parse(method, args)?;
                done(self.play_track_by_index(a.index, a.position))
            }
            "playTrackById" => {
                let a: PlayByIdArgs = parse(method, args)?;
                done(self.play_track_by_id(&a.track_id, a.position))
            }
            "pause" => done(self.pause()),
            "skipForward" => done(self.skip_forward()),
            "skipBack" => done(self.skip_back()),
            "seekTo" => value(self.seek_to(parse(method, args)?)),
            "seekToQueuePosition" => done(self.seek_to_queue_position(parse(method, args)?)),
            "setPlaybackRate" => done(self.set_playback_rate(parse(method, args)?)),
            "setPlaybackVolume" => done(self.set_playback_volume(parse(method, args)?)),
            "setLoopAll" => done(self.set_loop_all(parse(method, args)?)),
            "getPlaybackRate" => value(self.get_playback_rate()),
            "getPlaybackVolume" => value(self.get_playback_volume()),
            "getPlaybackPosition" => value(self.get_playback_position()),
            "getCurrentBuffer" => value(self.get_current_buffer()),
            "getTotalDuration" => value(self.get_total_duration()),
            "getQueuePosition" => value(self.get_queue_position()),
            "getStatus" => value(self.status()),
            "release" => done(self.release()),
            other => Err(ErrorDescriptor {
                code: "unknown_method".to_string(),
                message: format!("no such method: {other}"),
            }),
        }
    }
}

/// Method names accepted by [`PlaylistEngine::dispatch`].
pub const METHODS: &[&str] = &[
    "setOptions",
    "setPlaylistItems",
    "addItem",
    "addAllItems",
    "removeItem",
    "removeItems",
    "clearAllItems",
    "play",
    "playTrackByIndex",
    "playTrackById",
    "pause",
    "skipForward",
    "skipBack",
    "seekTo",
    "seekToQueuePosition",
    "setPlaybackRate",
    "setPlaybackVolume",
    "setLoopAll",
    "getPlaybackRate",
    "getPlaybackVolume",
    "getPlaybackPosition",
    "getCurrentBuffer",
    "getTotalDuration",
    "getQueuePosition",
    "getStatus",
    "release",
];

/// Render an error descriptor the way hosts receive it.
pub fn error_value(err: &ErrorDescriptor) -> Value {
    json!({ "code": err.code, "message": err.message })
}
