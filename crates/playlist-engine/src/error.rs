//! Engine error kinds and their caller-facing codes.

use playlist_types::{ErrorDescriptor, RendererErrorKind};
use thiserror::Error;

/// Failure reported by a renderer, either from a synchronous call or a callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct RendererError {
    pub kind: RendererErrorKind,
    pub message: String,
}

impl RendererError {
    pub fn new(kind: RendererErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Track descriptor is missing an id or a locator.
    #[error("invalid track: {0}")]
    InvalidTrack(String),

    #[error("duplicate track id: {0}")]
    DuplicateId(String),

    #[error("track not found: {0}")]
    TrackNotFound(String),

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Nothing to play: the catalog is empty or no track is selected.
    #[error("no current track")]
    NoCurrentTrack,

    #[error("duration of the current track is not known yet")]
    DurationUnknown,

    #[error("{name} out of range: {value}")]
    InvalidRange { name: &'static str, value: f64 },

    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),

    /// The engine was released.
    #[error("engine has been released")]
    Disposed,
}

impl EngineError {
    /// Stable code exposed to hosts.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidTrack(_) => "invalid_track",
            EngineError::DuplicateId(_) => "duplicate_id",
            EngineError::TrackNotFound(_) => "track_not_found",
            EngineError::IndexOutOfRange { .. } => "index_out_of_range",
            EngineError::NoCurrentTrack => "no_current_track",
            EngineError::DurationUnknown => "duration_unknown",
            EngineError::InvalidRange { .. } => "invalid_range",
            EngineError::Renderer(_) => "renderer_error",
            EngineError::Disposed => "disposed",
        }
    }

    /// Convert into the payload returned by method dispatch.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
