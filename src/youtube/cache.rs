//! On-disk lookup cache
//!
//! SQLite-backed TTL cache for video metadata and resolved playlists, so
//! restarting the bot does not re-burn API quota on tracks it has already
//! seen. Entries past their TTL are treated as misses and overwritten on
//! the next successful lookup. Cache writes are best-effort: a store that
//! fails must never fail a lookup that succeeded upstream.

use crate::error::Result;
use crate::youtube::{PlaylistVideo, VideoInfo};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, warn};

/// TTL-bounded cache over a small SQLite database.
#[derive(Clone)]
pub struct LookupCache {
    pool: Pool<Sqlite>,
    ttl: Option<Duration>,
}

impl LookupCache {
    /// Open (or create) the cache database at `path`.
    ///
    /// `ttl_hours == 0` disables expiry.
    pub async fn open(path: impl AsRef<Path>, ttl_hours: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let cache = Self {
            pool,
            ttl: (ttl_hours > 0).then(|| Duration::hours(ttl_hours as i64)),
        };
        cache.init_schema().await?;
        Ok(cache)
    }

    /// In-memory cache for tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let cache = Self {
            pool,
            ttl: Some(Duration::hours(24)),
        };
        cache.init_schema().await?;
        Ok(cache)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                video_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                views INTEGER NOT NULL,
                embeddable INTEGER NOT NULL,
                cached_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS playlists (
                playlist_id TEXT PRIMARY KEY,
                tracks_json TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn is_fresh(&self, cached_at: &str) -> bool {
        let Some(ttl) = self.ttl else { return true };
        match DateTime::parse_from_rfc3339(cached_at) {
            Ok(t) => Utc::now().signed_duration_since(t.with_timezone(&Utc)) <= ttl,
            Err(_) => false,
        }
    }

    /// Fetch a cached video entry, honoring the TTL.
    pub async fn get_video(&self, video_id: &str) -> Option<VideoInfo> {
        let row: (String, i64, i64, i64, String) = sqlx::query_as(
            "SELECT title, duration_secs, views, embeddable, cached_at FROM videos WHERE video_id = ?",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| warn!("Video cache read failed: {e}"))
        .ok()
        .flatten()?;

        let (title, duration_secs, views, embeddable, cached_at) = row;
        if !self.is_fresh(&cached_at) {
            debug!("Video cache entry expired: {video_id}");
            return None;
        }
        Some(VideoInfo {
            title,
            duration_secs: duration_secs as u32,
            views: views as u64,
            embeddable: embeddable != 0,
        })
    }

    /// Store a video entry; failures are logged and swallowed.
    pub async fn put_video(&self, video_id: &str, info: &VideoInfo) {
        let result = sqlx::query(
            r#"
            INSERT INTO videos (video_id, title, duration_secs, views, embeddable, cached_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                duration_secs = excluded.duration_secs,
                views = excluded.views,
                embeddable = excluded.embeddable,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(video_id)
        .bind(&info.title)
        .bind(info.duration_secs as i64)
        .bind(info.views as i64)
        .bind(info.embeddable as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("Video cache write failed for {video_id}: {e}");
        }
    }

    /// Fetch a cached playlist resolution, honoring the TTL.
    pub async fn get_playlist(&self, playlist_id: &str) -> Option<Vec<PlaylistVideo>> {
        let row: (String, String) = sqlx::query_as(
            "SELECT tracks_json, cached_at FROM playlists WHERE playlist_id = ?",
        )
        .bind(playlist_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| warn!("Playlist cache read failed: {e}"))
        .ok()
        .flatten()?;

        let (tracks_json, cached_at) = row;
        if !self.is_fresh(&cached_at) {
            debug!("Playlist cache entry expired: {playlist_id}");
            return None;
        }
        match serde_json::from_str::<Vec<PlaylistVideo>>(&tracks_json) {
            Ok(tracks) if !tracks.is_empty() => Some(tracks),
            Ok(_) => None,
            Err(e) => {
                warn!("Playlist cache entry corrupt for {playlist_id}: {e}");
                None
            }
        }
    }

    /// Store a resolved playlist; failures are logged and swallowed.
    pub async fn put_playlist(&self, playlist_id: &str, tracks: &[PlaylistVideo]) {
        let tracks_json = match serde_json::to_string(tracks) {
            Ok(json) => json,
            Err(e) => {
                warn!("Playlist cache encode failed for {playlist_id}: {e}");
                return;
            }
        };
        let result = sqlx::query(
            r#"
            INSERT INTO playlists (playlist_id, tracks_json, cached_at)
            VALUES (?, ?, ?)
            ON CONFLICT(playlist_id) DO UPDATE SET
                tracks_json = excluded.tracks_json,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(playlist_id)
        .bind(tracks_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("Playlist cache write failed for {playlist_id}: {e}");
        }
    }

    /// Drop a cached playlist (used by reload to force a fresh fetch).
    pub async fn delete_playlist(&self, playlist_id: &str) {
        if let Err(e) = sqlx::query("DELETE FROM playlists WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await
        {
            warn!("Playlist cache delete failed for {playlist_id}: {e}");
        }
    }
}
