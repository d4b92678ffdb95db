//! Fallback playlist
//!
//! Cyclic, optionally shuffled backup content played when the request queue
//! runs dry. The track list is replaced wholesale on load/reload and a
//! cursor walks it; advancing past the end wraps to the start and, when
//! shuffled, regenerates the permutation so consecutive passes differ.
//!
//! Browsing is read-heavy and logically separate from play control, so the
//! playlist carries its own reader/writer lock and exposes read-only status
//! accessors directly.

use crate::error::{Error, Result};
use crate::events::PlaylistStatus;
use crate::player::queue::{Track, PLAYLIST_SUBMITTER};
use crate::youtube::{extract_playlist_id, MetadataResolver};
use chrono::Utc;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct PlaylistInner {
    playlist_id: String,
    tracks: Vec<Track>,
    /// Logical index -> physical index; regenerated on wrap and on
    /// shuffle-on. Empty when never shuffled.
    shuffle_order: Vec<usize>,
    current_index: usize,
    shuffled: bool,
    enabled: bool,
}

impl PlaylistInner {
    fn reshuffle(&mut self) {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(&mut rand::thread_rng());
        self.shuffle_order = order;
    }

    /// Fresh playable copy of the template at `physical`: playlist tracks
    /// are replayable, so each pull gets a new added_at.
    fn fresh_track(&self, physical: usize) -> Track {
        let src = &self.tracks[physical];
        Track {
            video_id: src.video_id.clone(),
            title: src.title.clone(),
            duration_secs: src.duration_secs,
            views: src.views,
            added_at: Utc::now(),
            added_by: PLAYLIST_SUBMITTER.to_string(),
            is_paid: false,
        }
    }
}

/// Externally sourced cyclic playlist with enable/shuffle state.
pub struct Playlist {
    resolver: Arc<dyn MetadataResolver>,
    inner: RwLock<PlaylistInner>,
}

impl Playlist {
    pub fn new(resolver: Arc<dyn MetadataResolver>) -> Self {
        Self {
            resolver,
            inner: RwLock::new(PlaylistInner::default()),
        }
    }

    /// Resolve `url_or_id` and replace the loaded tracks wholesale,
    /// resetting the cursor. State is untouched when resolution fails.
    pub async fn load(&self, url_or_id: &str) -> Result<usize> {
        let pid = extract_playlist_id(url_or_id).ok_or(Error::InvalidPlaylistUrl)?;
        let resolved = self.resolver.resolve_all(&pid).await?;

        let tracks: Vec<Track> = resolved
            .into_iter()
            .filter(|v| v.embeddable)
            .map(|v| Track {
                video_id: v.video_id,
                title: v.title,
                duration_secs: v.duration_secs,
                views: v.views,
                added_at: Utc::now(),
                added_by: PLAYLIST_SUBMITTER.to_string(),
                is_paid: false,
            })
            .collect();
        if tracks.is_empty() {
            return Err(Error::EmptyPlaylist);
        }

        let mut inner = self.inner.write();
        inner.playlist_id = pid;
        inner.tracks = tracks;
        inner.current_index = 0;
        if inner.shuffled {
            inner.reshuffle();
        }
        info!(
            "Playlist {} loaded with {} tracks",
            inner.playlist_id,
            inner.tracks.len()
        );
        Ok(inner.tracks.len())
    }

    /// Drop the cached resolution and load the current playlist again.
    pub async fn reload(&self) -> Result<usize> {
        let pid = {
            let inner = self.inner.read();
            if inner.playlist_id.is_empty() {
                return Err(Error::NoPlaylistLoaded);
            }
            inner.playlist_id.clone()
        };
        self.resolver.forget_playlist(&pid).await;
        self.load(&pid).await
    }

    /// Peek the track at the cursor without advancing it. Returns a fresh
    /// track value, or `None` when disabled or empty.
    pub fn get_next(&self) -> Option<Track> {
        let inner = self.inner.read();
        if !inner.enabled || inner.tracks.is_empty() {
            return None;
        }
        let mut idx = inner.current_index;
        if inner.shuffled {
            idx = inner.shuffle_order.get(idx).copied().unwrap_or(idx);
        }
        if idx >= inner.tracks.len() {
            idx = 0;
        }
        Some(inner.fresh_track(idx))
    }

    /// Fresh track at logical (unshuffled) `index`.
    pub fn get_at(&self, index: usize) -> Option<Track> {
        let inner = self.inner.read();
        if index >= inner.tracks.len() {
            return None;
        }
        Some(inner.fresh_track(index))
    }

    /// Step the cursor forward, wrapping (and reshuffling when shuffled)
    /// at the end.
    pub fn advance_to_next(&self) {
        let mut inner = self.inner.write();
        if inner.tracks.is_empty() {
            return;
        }
        inner.current_index += 1;
        if inner.current_index >= inner.tracks.len() {
            inner.current_index = 0;
            if inner.shuffled {
                inner.reshuffle();
            }
        }
    }

    /// Step the cursor backward, wrapping at the bottom. Does not attempt
    /// to un-advance a wrap-triggered reshuffle: going backward across a
    /// wrap may land on a different track than literally "previous".
    pub fn go_to_previous(&self) {
        let mut inner = self.inner.write();
        if inner.tracks.is_empty() {
            return;
        }
        if inner.current_index == 0 {
            inner.current_index = inner.tracks.len() - 1;
        } else {
            inner.current_index -= 1;
        }
    }

    /// Move the cursor to logical `index`, bypassing the shuffle mapping.
    pub fn jump_to_index(&self, index: usize) -> Result<()> {
        let mut inner = self.inner.write();
        if index >= inner.tracks.len() {
            return Err(Error::IndexOutOfRange);
        }
        inner.current_index = index;
        Ok(())
    }

    /// Flip shuffle, regenerating the permutation when turning it on.
    pub fn toggle_shuffle(&self) -> bool {
        let mut inner = self.inner.write();
        inner.shuffled = !inner.shuffled;
        if inner.shuffled {
            inner.reshuffle();
        }
        info!("Playlist shuffle {}", inner.shuffled);
        inner.shuffled
    }

    pub fn enable(&self) {
        self.inner.write().enabled = true;
    }

    pub fn disable(&self) {
        self.inner.write().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    pub fn loaded(&self) -> bool {
        !self.inner.read().tracks.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.inner.read().current_index
    }

    /// Ordered copy of the loaded templates, for browsing.
    pub fn tracks(&self) -> Vec<Track> {
        self.inner.read().tracks.clone()
    }

    pub fn status(&self) -> PlaylistStatus {
        let inner = self.inner.read();
        PlaylistStatus {
            loaded: !inner.tracks.is_empty(),
            enabled: inner.enabled,
            shuffled: inner.shuffled,
            playlist_id: inner.playlist_id.clone(),
            total_tracks: inner.tracks.len(),
            current_index: inner.current_index,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::youtube::{PlaylistVideo, VideoInfo};
    use async_trait::async_trait;

    /// Resolver serving a canned playlist, for tests.
    pub(crate) struct StaticResolver {
        pub videos: Vec<PlaylistVideo>,
    }

    #[async_trait]
    impl MetadataResolver for StaticResolver {
        async fn resolve(&self, video_id: &str) -> crate::error::Result<VideoInfo> {
            self.videos
                .iter()
                .find(|v| v.video_id == video_id)
                .map(|v| VideoInfo {
                    title: v.title.clone(),
                    duration_secs: v.duration_secs,
                    views: v.views,
                    embeddable: v.embeddable,
                })
                .ok_or_else(|| Error::Lookup("video not found".to_string()))
        }

        async fn resolve_all(&self, _playlist_id: &str) -> crate::error::Result<Vec<PlaylistVideo>> {
            if self.videos.is_empty() {
                return Err(Error::EmptyPlaylist);
            }
            Ok(self.videos.clone())
        }
    }

    pub(crate) fn canned_videos(n: usize) -> Vec<PlaylistVideo> {
        (0..n)
            .map(|i| PlaylistVideo {
                video_id: format!("vid{i:08}xyz")[..11].to_string(),
                title: format!("Song {i}"),
                duration_secs: 200,
                views: 100,
                embeddable: true,
            })
            .collect()
    }

    async fn loaded_playlist(n: usize) -> Playlist {
        let pl = Playlist::new(Arc::new(StaticResolver {
            videos: canned_videos(n),
        }));
        pl.load("PLabcdefghijklmnopqrstuvwxyz012345").await.unwrap();
        pl
    }

    #[tokio::test]
    async fn load_resets_cursor() {
        let pl = loaded_playlist(3).await;
        assert!(pl.loaded());
        assert_eq!(pl.current_index(), 0);
        assert_eq!(pl.status().total_tracks, 3);
    }

    #[tokio::test]
    async fn load_rejects_bad_url() {
        let pl = Playlist::new(Arc::new(StaticResolver {
            videos: canned_videos(1),
        }));
        assert!(matches!(
            pl.load("not a playlist").await,
            Err(Error::InvalidPlaylistUrl)
        ));
        assert!(!pl.loaded());
    }

    #[tokio::test]
    async fn failed_load_leaves_state_untouched() {
        let pl = loaded_playlist(2).await;
        pl.jump_to_index(1).unwrap();
        assert!(matches!(
            pl.load("garbage").await,
            Err(Error::InvalidPlaylistUrl)
        ));
        // the previously loaded list and cursor survive the failed load
        assert_eq!(pl.status().total_tracks, 2);
        assert_eq!(pl.current_index(), 1);
    }

    #[tokio::test]
    async fn advance_wraps_to_zero() {
        let pl = loaded_playlist(3).await;
        for _ in 0..3 {
            pl.advance_to_next();
        }
        assert_eq!(pl.current_index(), 0);
    }

    #[tokio::test]
    async fn previous_wraps_to_end() {
        let pl = loaded_playlist(3).await;
        pl.go_to_previous();
        assert_eq!(pl.current_index(), 2);
        pl.go_to_previous();
        assert_eq!(pl.current_index(), 1);
    }

    #[tokio::test]
    async fn get_next_peeks_without_advancing() {
        let pl = loaded_playlist(3).await;
        pl.enable();
        let a = pl.get_next().unwrap();
        let b = pl.get_next().unwrap();
        assert_eq!(a.video_id, b.video_id);
        assert_eq!(pl.current_index(), 0);
        // fresh value every call, not the stored template
        assert_eq!(a.added_by, PLAYLIST_SUBMITTER);
        assert!(!a.is_paid);
    }

    #[tokio::test]
    async fn get_next_requires_enabled() {
        let pl = loaded_playlist(3).await;
        assert!(pl.get_next().is_none());
        pl.enable();
        assert!(pl.get_next().is_some());
        pl.disable();
        assert!(pl.get_next().is_none());
    }

    #[tokio::test]
    async fn shuffle_permutation_is_bijection() {
        let pl = loaded_playlist(20).await;
        pl.toggle_shuffle();
        let inner = pl.inner.read();
        let mut seen = inner.shuffle_order.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn double_toggle_restores_original_order() {
        let pl = loaded_playlist(5).await;
        pl.enable();
        let before: Vec<String> = pl.tracks().iter().map(|t| t.video_id.clone()).collect();
        pl.toggle_shuffle();
        pl.toggle_shuffle();
        assert!(!pl.status().shuffled);
        // walking the cursor yields the pre-shuffle order again
        let mut order = Vec::new();
        for _ in 0..5 {
            order.push(pl.get_next().unwrap().video_id);
            pl.advance_to_next();
        }
        assert_eq!(order, before);
    }

    #[tokio::test]
    async fn jump_bypasses_shuffle_mapping() {
        let pl = loaded_playlist(5).await;
        pl.enable();
        pl.toggle_shuffle();
        pl.jump_to_index(3).unwrap();
        assert_eq!(pl.current_index(), 3);
        // logical addressing: get_at(3) is always the fourth loaded track
        assert_eq!(pl.get_at(3).unwrap().title, "Song 3");
        assert!(pl.jump_to_index(5).is_err());
    }

    #[tokio::test]
    async fn wrap_reshuffles_when_shuffled() {
        let pl = loaded_playlist(8).await;
        pl.toggle_shuffle();
        let before = pl.inner.read().shuffle_order.clone();
        for _ in 0..8 {
            pl.advance_to_next();
        }
        let after = pl.inner.read().shuffle_order.clone();
        // still a bijection; cursor wrapped home
        assert_eq!(pl.current_index(), 0);
        let mut sorted = after.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
        // not asserting inequality with `before`: an 8-element shuffle can
        // legitimately repeat, so only the structural properties are checked
        let _ = before;
    }
}
