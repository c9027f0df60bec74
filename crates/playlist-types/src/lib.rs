use serde::{Deserialize, Serialize};

/// A playable entry as supplied by the host.
///
/// Field names follow the host payloads (`trackId`, `assetUrl`, `albumArt`, ...), so an item
/// map can be deserialized directly.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackItem {
    /// Stable unique identifier within the playlist.
    pub track_id: String,
    /// Media locator handed to the renderer (URI or opaque handle).
    pub asset_url: String,
    /// `true` for live or progressive streams.
    pub is_stream: bool,
    /// Display title.
    pub title: String,
    /// Display artist.
    pub artist: String,
    /// Display album.
    pub album: String,
    /// Artwork reference, if any.
    pub album_art: Option<String>,
}

impl TrackItem {
    /// Build an item with just an id and locator.
    pub fn new(track_id: impl Into<String>, asset_url: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            asset_url: asset_url.into(),
            ..Self::default()
        }
    }

    /// Builder-style title setter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder-style artist setter.
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }
}

/// Options accompanying a full playlist replacement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItemOptions {
    /// Load the first track paused instead of playing it.
    pub start_paused: bool,
    /// Keep the current track (and position) when it survives the replacement.
    pub retain_position: bool,
    /// Start offset in seconds for the first loaded track.
    pub play_from_position: Option<f64>,
    /// Track id to start from instead of index 0.
    pub play_from_id: Option<String>,
}

impl Default for PlaylistItemOptions {
    fn default() -> Self {
        Self {
            start_paused: true,
            retain_position: false,
            play_from_position: None,
            play_from_id: None,
        }
    }
}

/// Reference to a catalog entry for removal.
///
/// A valid index wins over the id.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackRef {
    pub track_id: Option<String>,
    pub track_index: Option<usize>,
}

impl TrackRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            track_id: Some(id.into()),
            track_index: None,
        }
    }

    pub fn index(index: usize) -> Self {
        Self {
            track_id: None,
            track_index: Some(index),
        }
    }
}

/// Transport state of the engine.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Seeking,
    Stopped,
    Ended,
    Error,
}

impl PlaybackState {
    /// Lowercase label used in status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Seeking => "seeking",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Ended => "ended",
            PlaybackState::Error => "error",
        }
    }
}

/// Point-in-time engine status.
///
/// Each change produces a new snapshot; consumers never see one mutate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Transport state.
    pub status: PlaybackState,
    /// Current track id, if any.
    pub track_id: Option<String>,
    /// Whether the current track is a stream.
    pub is_stream: bool,
    /// Queue position of the current track.
    pub current_index: Option<usize>,
    /// Number of tracks in the catalog.
    pub queue_length: usize,
    /// Elapsed time in seconds.
    pub current_position: f64,
    /// Track duration in seconds, once the renderer reports it.
    pub duration: Option<f64>,
    /// `current_position / duration` in percent (0 when duration is unknown).
    pub playback_percent: f64,
    /// Buffered portion of the track in percent.
    pub buffer_percent: f64,
    /// Start of the buffered range in seconds.
    pub buffer_start: f64,
    /// End of the buffered range in seconds.
    pub buffer_end: f64,
    /// Playback rate.
    pub rate: f64,
    /// Output volume in `[0, 1]`.
    pub volume: f64,
    /// Wrap at the queue boundaries.
    pub loop_all: bool,
    /// A later track is reachable with `skipForward`.
    pub has_next: bool,
    /// An earlier track is reachable with `skipBack`.
    pub has_previous: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: PlaybackState::Idle,
            track_id: None,
            is_stream: false,
            current_index: None,
            queue_length: 0,
            current_position: 0.0,
            duration: None,
            playback_percent: 0.0,
            buffer_percent: 0.0,
            buffer_start: 0.0,
            buffer_end: 0.0,
            rate: 1.0,
            volume: 1.0,
            loop_all: false,
            has_next: false,
            has_previous: false,
        }
    }
}

/// Buffered range reported by `getCurrentBuffer`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BufferStatus {
    pub buffer_start: f64,
    pub buffer_end: f64,
    pub buffer_percent: f64,
}

/// Kind of status message carried by an event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StatusMessage {
    Register,
    ItemAdded,
    ItemRemoved,
    PlaylistCleared,
    TrackChanged,
    Loading,
    CanPlay,
    Loaded,
    Duration,
    Buffering,
    PlaybackPosition,
    Playing,
    Pause,
    Seek,
    Completed,
    PlaylistCompleted,
    Stopped,
    SkipForward,
    SkipBack,
    RateChanged,
    VolumeChanged,
    LoopChanged,
    Error,
}

impl StatusMessage {
    /// Listener channel this message is delivered on.
    pub fn event_name(&self) -> EventName {
        match self {
            StatusMessage::TrackChanged => EventName::ItemChanged,
            StatusMessage::PlaylistCompleted => EventName::QueueEnded,
            StatusMessage::Error => EventName::Error,
            _ => EventName::Status,
        }
    }
}

/// Top-level event names seen by the listener.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    Status,
    QueueEnded,
    ItemChanged,
    Error,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Status => "status",
            EventName::QueueEnded => "queue-ended",
            EventName::ItemChanged => "item-changed",
            EventName::Error => "error",
        }
    }
}

/// One notification pushed to the registered listener.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvent {
    pub name: EventName,
    pub msg_type: StatusMessage,
    pub track_id: Option<String>,
    /// Message-specific payload; usually the serialized [`StatusSnapshot`].
    pub value: serde_json::Value,
}

/// Category of a renderer failure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RendererErrorKind {
    /// Loading was aborted before the media became ready.
    Aborted,
    /// Locator could not be fetched.
    Network,
    /// Media could not be decoded.
    Decode,
    /// Media type or locator scheme is not supported.
    Unsupported,
}

impl RendererErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererErrorKind::Aborted => "aborted",
            RendererErrorKind::Network => "network",
            RendererErrorKind::Decode => "decode",
            RendererErrorKind::Unsupported => "unsupported",
        }
    }
}

/// Caller-facing error payload returned by method dispatch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_item_reads_host_field_names() {
        let item: TrackItem = serde_json::from_value(serde_json::json!({
            "trackId": "a1",
            "assetUrl": "https://example.com/a.mp3",
            "isStream": true,
            "title": "Song",
            "albumArt": "https://example.com/a.jpg"
        }))
        .unwrap();
        assert_eq!(item.track_id, "a1");
        assert!(item.is_stream);
        assert_eq!(item.album_art.as_deref(), Some("https://example.com/a.jpg"));
        assert_eq!(item.artist, "");
    }

    #[test]
    fn playlist_options_default_to_start_paused() {
        let opts: PlaylistItemOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(opts.start_paused);
        assert!(!opts.retain_position);
        assert_eq!(opts, PlaylistItemOptions::default());
    }

    #[test]
    fn status_messages_map_to_listener_channels() {
        assert_eq!(StatusMessage::TrackChanged.event_name(), EventName::ItemChanged);
        assert_eq!(StatusMessage::PlaylistCompleted.event_name(), EventName::QueueEnded);
        assert_eq!(StatusMessage::Error.event_name(), EventName::Error);
        assert_eq!(StatusMessage::Playing.event_name(), EventName::Status);
        assert_eq!(EventName::QueueEnded.as_str(), "queue-ended");
    }

    #[test]
    fn snapshot_serializes_status_label() {
        let snap = StatusSnapshot {
            status: PlaybackState::Playing,
            ..StatusSnapshot::default()
        };
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["status"], "playing");
        assert_eq!(value["currentPosition"], 0.0);
    }
}
