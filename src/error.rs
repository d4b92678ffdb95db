//! Error types for tubejay
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Validation rejections carry the configured limit that was
//! hit so the message shown to the viewer is self-explanatory.

use thiserror::Error;

/// Main error type for tubejay
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] sqlx::Error),

    /// Metadata or playlist lookup failures from the YouTube API
    #[error("{0}")]
    Lookup(String),

    /// Video owner has disabled embedding or the video is not public
    #[error("video is not available for playback")]
    NotEmbeddable,

    /// Track exceeds the configured duration ceiling
    #[error("track too long (max {max_minutes} minutes)")]
    TrackTooLong { max_minutes: u32 },

    /// Track is below the configured view-count floor
    #[error("insufficient views (min {min_views})")]
    InsufficientViews { min_views: u64 },

    /// Same video already played too recently
    #[error("track recently played (repeat limit reached)")]
    RepeatLimit,

    /// Pending queue plus current track is at the configured cap
    #[error("queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    /// Nothing to play from any source
    #[error("queue is empty")]
    QueueEmpty,

    /// History is empty, nothing to go back to
    #[error("no previous track available")]
    NoPreviousTrack,

    /// Queue or playlist index outside the valid range
    #[error("index out of range")]
    IndexOutOfRange,

    /// Playlist operation requested before any playlist was loaded
    #[error("no playlist loaded")]
    NoPlaylistLoaded,

    /// Playlist URL/ID did not parse
    #[error("invalid playlist URL")]
    InvalidPlaylistUrl,

    /// Video URL/ID did not parse
    #[error("invalid YouTube URL")]
    InvalidVideoUrl,

    /// Playlist resolved but nothing in it was playable
    #[error("no valid tracks found in playlist")]
    EmptyPlaylist,

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a user-facing rejection (HTTP 400) rather
    /// than an internal failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Cache(_) | Error::Io(_))
    }
}

/// Convenience Result type using tubejay Error
pub type Result<T> = std::result::Result<T, Error>;
