//! YouTube metadata lookups
//!
//! [`MetadataResolver`] is the seam between the player core and the YouTube
//! Data API: the core only ever sees resolved metadata or an error, never
//! the transport. [`YouTubeClient`] is the production implementation, with
//! an on-disk TTL cache consulted before any network call. Every call is
//! treated as slow and fallible; failures are surfaced, not retried.

pub mod cache;

use crate::error::{Error, Result};
use async_trait::async_trait;
use cache::LookupCache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// YouTube Data API base URL.
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Timeout applied to every lookup request.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolved metadata for a single video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_secs: u32,
    pub views: u64,
    pub embeddable: bool,
}

/// One entry of a resolved playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistVideo {
    pub video_id: String,
    pub title: String,
    pub duration_secs: u32,
    pub views: u64,
    pub embeddable: bool,
}

/// Metadata lookup seam consumed by the player and the fallback playlist.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve one video's metadata.
    async fn resolve(&self, video_id: &str) -> Result<VideoInfo>;

    /// Resolve a whole playlist to its playable entries, paginating
    /// internally. Unresolvable entries are skipped and summarized as
    /// counts; zero playable entries is a terminal error.
    async fn resolve_all(&self, playlist_id: &str) -> Result<Vec<PlaylistVideo>>;

    /// Drop any cached resolution for `playlist_id` so the next
    /// `resolve_all` hits the source again.
    async fn forget_playlist(&self, _playlist_id: &str) {}
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})").unwrap()
    })
}

fn bare_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap())
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").unwrap())
}

/// Pull an 11-character video ID out of a watch URL, a short URL, or a
/// bare ID. Returns `None` when nothing in the text looks like one.
pub fn extract_video_id(text: &str) -> Option<String> {
    if let Some(caps) = video_id_regex().captures(text) {
        return Some(caps[1].to_string());
    }
    if bare_id_regex().is_match(text) {
        return Some(text.to_string());
    }
    None
}

/// Pull a `PL…` playlist ID out of a playlist URL or a bare ID.
pub fn extract_playlist_id(raw: &str) -> Option<String> {
    if let Ok(url) = reqwest::Url::parse(raw) {
        if let Some((_, pid)) = url.query_pairs().find(|(k, _)| k == "list") {
            if pid.len() >= 2 && pid.starts_with("PL") {
                return Some(pid.into_owned());
            }
        }
    }
    if raw.len() >= 34 && raw.starts_with("PL") {
        return Some(raw[..34].to_string());
    }
    None
}

/// Parse an ISO-8601 duration of the `PT#H#M#S` shape into seconds.
pub fn parse_iso8601_duration(iso: &str) -> Result<u32> {
    let caps = duration_regex()
        .captures(iso)
        .ok_or_else(|| Error::Lookup("invalid duration format".to_string()))?;
    let part = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Ok(part(1) * 3600 + part(2) * 60 + part(3))
}

// Response shapes for the two API endpoints, trimmed to the fields used.

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
    status: VideoStatus,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount", default)]
    view_count: String,
}

#[derive(Debug, Deserialize)]
struct VideoStatus {
    #[serde(default)]
    embeddable: bool,
    #[serde(rename = "privacyStatus", default)]
    privacy_status: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId", default)]
    video_id: String,
}

/// YouTube Data API v3 client with an on-disk TTL cache.
pub struct YouTubeClient {
    api_key: String,
    http: reqwest::Client,
    cache: LookupCache,
}

impl YouTubeClient {
    pub fn new(api_key: String, cache: LookupCache) -> Self {
        Self {
            api_key,
            http: reqwest::Client::builder()
                .timeout(LOOKUP_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            cache,
        }
    }

    async fn fetch_video(&self, video_id: &str) -> Result<VideoInfo> {
        if self.api_key.is_empty() {
            return Err(Error::Lookup("YouTube API key not configured".to_string()));
        }
        let url = format!(
            "{API_BASE}/videos?part=snippet,contentDetails,statistics,status&id={video_id}&key={}",
            self.api_key
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Lookup(format!("failed to fetch video info: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Lookup(format!(
                "youtube API returned status: {}",
                resp.status().as_u16()
            )));
        }
        let body: VideoListResponse = resp
            .json()
            .await
            .map_err(|e| Error::Lookup(format!("failed to parse API response: {e}")))?;
        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::Lookup("video not found".to_string()))?;

        Ok(VideoInfo {
            duration_secs: parse_iso8601_duration(&item.content_details.duration)?,
            views: item.statistics.view_count.parse().unwrap_or(0),
            embeddable: item.status.embeddable && item.status.privacy_status == "public",
            title: item.snippet.title,
        })
    }

    /// Collect every video ID in the playlist, following page tokens.
    async fn fetch_playlist_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        if self.api_key.is_empty() {
            return Err(Error::Lookup("YouTube API key not configured".to_string()));
        }
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!(
                "{API_BASE}/playlistItems?part=snippet&playlistId={playlist_id}&maxResults=50&key={}",
                self.api_key
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::Lookup(format!("failed to fetch playlist: {e}")))?;
            if !resp.status().is_success() {
                return Err(Error::Lookup(format!(
                    "youtube API returned status: {}",
                    resp.status().as_u16()
                )));
            }
            let page: PlaylistItemsResponse = resp
                .json()
                .await
                .map_err(|e| Error::Lookup(format!("failed to parse API response: {e}")))?;
            ids.extend(
                page.items
                    .into_iter()
                    .map(|i| i.snippet.resource_id.video_id)
                    .filter(|id| !id.is_empty()),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl MetadataResolver for YouTubeClient {
    async fn resolve(&self, video_id: &str) -> Result<VideoInfo> {
        if let Some(info) = self.cache.get_video(video_id).await {
            debug!("Video cache hit: {video_id}");
            return Ok(info);
        }
        let info = self.fetch_video(video_id).await?;
        self.cache.put_video(video_id, &info).await;
        Ok(info)
    }

    async fn resolve_all(&self, playlist_id: &str) -> Result<Vec<PlaylistVideo>> {
        if let Some(tracks) = self.cache.get_playlist(playlist_id).await {
            info!("Playlist loaded from cache: {} tracks", tracks.len());
            return Ok(tracks);
        }

        let ids = self.fetch_playlist_ids(playlist_id).await?;
        let mut tracks = Vec::new();
        let mut skipped = 0usize;
        for video_id in ids {
            match self.resolve(&video_id).await {
                Ok(info) if info.embeddable => tracks.push(PlaylistVideo {
                    video_id,
                    title: info.title,
                    duration_secs: info.duration_secs,
                    views: info.views,
                    embeddable: true,
                }),
                Ok(_) => skipped += 1,
                Err(e) => {
                    debug!("Skipping playlist entry {video_id}: {e}");
                    skipped += 1;
                }
            }
        }
        if tracks.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        info!("Loaded playlist: {} tracks ({skipped} skipped)", tracks.len());
        self.cache.put_playlist(playlist_id, &tracks).await;
        Ok(tracks)
    }

    async fn forget_playlist(&self, playlist_id: &str) {
        self.cache.delete_playlist(playlist_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn extracts_id_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn extracts_bare_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn rejects_wrong_length_id() {
        assert!(extract_video_id("tooshort").is_none());
        assert!(extract_video_id("this is definitely not a video").is_none());
    }

    #[test]
    fn extracts_id_from_chat_message() {
        let msg = "play this one https://youtu.be/dQw4w9WgXcQ please!";
        assert_eq!(extract_video_id(msg).as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn extracts_playlist_id_from_url() {
        let url = "https://www.youtube.com/playlist?list=PLabcdefghijklmnopqrstuvwxyz01234567";
        assert_eq!(
            extract_playlist_id(url).as_deref(),
            Some("PLabcdefghijklmnopqrstuvwxyz01234567")
        );
    }

    #[test]
    fn extracts_bare_playlist_id() {
        let pid = "PLabcdefghijklmnopqrstuvwxyz012345";
        assert_eq!(extract_playlist_id(pid).as_deref(), Some(pid));
    }

    #[test]
    fn rejects_non_playlist_url() {
        assert!(extract_playlist_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_none());
        assert!(extract_playlist_id("XX123").is_none());
    }

    #[test]
    fn parses_full_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S").unwrap(), 3723);
    }

    #[test]
    fn parses_partial_durations() {
        assert_eq!(parse_iso8601_duration("PT9M").unwrap(), 540);
        assert_eq!(parse_iso8601_duration("PT601S").unwrap(), 601);
        assert_eq!(parse_iso8601_duration("PT2H").unwrap(), 7200);
    }
}
