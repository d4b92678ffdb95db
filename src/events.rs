//! Wire-facing state projections
//!
//! Every observable change to the player produces a [`PlayerSnapshot`]
//! which is broadcast to WebSocket subscribers and also returned from the
//! read-only endpoints. These are concrete structs rather than loose JSON
//! maps so the response shapes are checked at compile time.

use crate::player::queue::Track;
use serde::Serialize;

/// Play state tag carried in every snapshot.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayState::Stopped => write!(f, "stopped"),
            PlayState::Playing => write!(f, "playing"),
            PlayState::Paused => write!(f, "paused"),
        }
    }
}

/// Fallback playlist status projection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaylistStatus {
    pub loaded: bool,
    pub enabled: bool,
    pub shuffled: bool,
    pub playlist_id: String,
    pub total_tracks: usize,
    pub current_index: usize,
}

/// Full state snapshot pushed to every subscriber on each change.
///
/// `queue` is the merged ordered view: history, then the current track,
/// then the pending queue. `position` is the index of the current track in
/// that view (equal to the history length).
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub action: PlayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub position: usize,
    pub playlist: PlaylistStatus,
}

/// Compact status summary for `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub state: PlayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Track>,
    /// 1-based play position counted from process start of the visible history
    pub position: usize,
    /// Pending tracks plus the currently playing one
    pub queue_length: usize,
}

/// Overlay-friendly now-playing projection for `GET /api/nowplaying`.
///
/// `artist`/`title` come from splitting the full title on the first " - ";
/// both are empty strings when nothing is playing.
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub status: PlayState,
    pub artist: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_title: Option<String>,
    pub url: String,
}

/// Merged queue view for `GET /api/queue`.
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub queue: Vec<Track>,
    /// Index of the current track within `queue`
    pub current: usize,
    pub state: PlayState,
    pub total: usize,
}

/// Playlist browsing payload for `GET /api/playlist/tracks`.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistTracks {
    pub tracks: Vec<Track>,
    pub current_index: usize,
    pub total: usize,
}
