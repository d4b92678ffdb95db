//! HTTP request handlers
//!
//! Thin wrappers over the player: parse the request, call one player or
//! playlist operation, wrap the result in the response envelope. All the
//! sequencing rules live in the core, none here.

use crate::api::{ApiError, ApiResponse, AppState};
use crate::error::Error;
use crate::events::{NowPlaying, PlaylistStatus, PlaylistTracks, QueueView, StatusSummary};
use crate::player::queue::Track;
use crate::youtube::extract_video_id;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct AddParams {
    url: Option<String>,
    id: Option<String>,
    user: Option<String>,
    paid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    index: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistSetParams {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DonationStatus {
    pub enabled: bool,
}

/// POST /api/add — admit a viewer-submitted track.
pub async fn add(
    State(state): State<AppState>,
    Query(params): Query<AddParams>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let raw = params
        .url
        .or(params.id)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing video URL"))?;
    let added_by = params.user.filter(|s| !s.is_empty()).unwrap_or_else(|| "User".to_string());
    let paid = params.paid.as_deref() == Some("true");

    let video_id = extract_video_id(&raw).ok_or(Error::InvalidVideoUrl)?;
    state.player.validate_and_add(&video_id, &added_by, paid).await?;
    Ok(ApiResponse::message("Track added to queue"))
}

/// POST /api/play
pub async fn play(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.player.play()?;
    Ok(ApiResponse::message("Playback started"))
}

/// POST /api/pause
pub async fn pause(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    state.player.pause();
    ApiResponse::message("Playback paused")
}

/// POST /api/stop
pub async fn stop(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    state.player.stop();
    ApiResponse::message("Playback stopped")
}

/// POST /api/next
pub async fn next(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    state.player.next();
    ApiResponse::message("Skipped to next track")
}

/// POST /api/previous
pub async fn previous(State(state): State<AppState>) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.player.previous()?;
    Ok(ApiResponse::message("Returned to previous track"))
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<ApiResponse<StatusSummary>> {
    ApiResponse::data(state.player.status())
}

/// GET /api/queue — merged history + current + pending view.
pub async fn queue(State(state): State<AppState>) -> Json<ApiResponse<QueueView>> {
    ApiResponse::data(state.player.queue_view())
}

/// GET /api/nowplaying — overlay projection.
pub async fn now_playing(State(state): State<AppState>) -> Json<ApiResponse<NowPlaying>> {
    ApiResponse::data(state.player.now_playing())
}

/// POST|DELETE /api/remove?index=N — drop one pending entry.
pub async fn remove(
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<Json<ApiResponse<Track>>, ApiError> {
    let index = parse_index(params)?;
    let track = state.player.remove(index)?;
    Ok(ApiResponse::message_with_data("Track removed from queue", track))
}

/// POST /api/clear
pub async fn clear(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    let count = state.player.clear();
    ApiResponse::message(format!("Queue cleared ({count} tracks removed)"))
}

/// POST /api/playlist/set?url=… — load (or replace) the fallback playlist.
pub async fn playlist_set(
    State(state): State<AppState>,
    Query(params): Query<PlaylistSetParams>,
) -> Result<Json<ApiResponse<PlaylistStatus>>, ApiError> {
    let url = params
        .url
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing playlist URL"))?;
    state.player.playlist().load(&url).await?;
    state.player.broadcast_update();
    Ok(ApiResponse::message_with_data(
        "Playlist loaded successfully",
        state.player.playlist().status(),
    ))
}

/// POST /api/playlist/enable — also kicks playback if the queue is idle.
pub async fn playlist_enable(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PlaylistStatus>>, ApiError> {
    let playlist = state.player.playlist();
    if !playlist.loaded() {
        return Err(Error::NoPlaylistLoaded.into());
    }
    playlist.enable();
    state.player.broadcast_update();
    if let Err(e) = state.player.play() {
        debug!("Play after playlist enable: {e}");
    }
    Ok(ApiResponse::message_with_data("Playlist enabled", playlist.status()))
}

/// POST /api/playlist/disable
pub async fn playlist_disable(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PlaylistStatus>>, ApiError> {
    let playlist = state.player.playlist();
    if !playlist.loaded() {
        return Err(Error::NoPlaylistLoaded.into());
    }
    playlist.disable();
    state.player.broadcast_update();
    Ok(ApiResponse::message_with_data("Playlist disabled", playlist.status()))
}

/// GET /api/playlist/status
pub async fn playlist_status(State(state): State<AppState>) -> Json<ApiResponse<PlaylistStatus>> {
    ApiResponse::data(state.player.playlist().status())
}

/// POST /api/playlist/reload — refetch the loaded playlist, bypassing cache.
pub async fn playlist_reload(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PlaylistStatus>>, ApiError> {
    state.player.playlist().reload().await?;
    state.player.broadcast_update();
    Ok(ApiResponse::message_with_data(
        "Playlist reloaded successfully",
        state.player.playlist().status(),
    ))
}

/// GET /api/playlist/tracks — browse the loaded playlist.
pub async fn playlist_tracks(State(state): State<AppState>) -> Json<ApiResponse<PlaylistTracks>> {
    let playlist = state.player.playlist();
    let tracks = playlist.tracks();
    ApiResponse::data(PlaylistTracks {
        current_index: playlist.current_index(),
        total: tracks.len(),
        tracks,
    })
}

/// POST /api/playlist/jump?index=N
pub async fn playlist_jump(
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let index = parse_index(params)?;
    state.player.playlist_jump(index)?;
    Ok(ApiResponse::message("Jumped to track"))
}

/// POST /api/playlist/shuffle
pub async fn playlist_shuffle(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PlaylistStatus>>, ApiError> {
    let playlist = state.player.playlist();
    if !playlist.loaded() {
        return Err(Error::NoPlaylistLoaded.into());
    }
    playlist.toggle_shuffle();
    state.player.broadcast_update();
    Ok(ApiResponse::message_with_data(
        "Playlist shuffle toggled",
        playlist.status(),
    ))
}

/// GET /api/donation/status
pub async fn donation_status(State(state): State<AppState>) -> Json<ApiResponse<DonationStatus>> {
    ApiResponse::data(DonationStatus {
        enabled: state.donation_enabled,
    })
}

fn parse_index(params: IndexParams) -> Result<usize, ApiError> {
    params
        .index
        .as_deref()
        .and_then(|raw| raw.parse::<usize>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid index parameter"))
}
