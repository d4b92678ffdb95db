//! Player core
//!
//! One always-on queue: viewer requests, donation-paid requests and the
//! fallback playlist merge into a single deterministic "now playing"
//! sequence. All mutation funnels through one exclusive critical section,
//! so every operation is atomic from the outside and no caller observes a
//! torn queue/history/playlist combination. Metadata resolution is awaited
//! *before* the section is entered; a slow lookup never stalls concurrent
//! play-control requests.
//!
//! Every successful state-changing operation ends by publishing a full
//! snapshot to the update channel. Either an operation fully applies and
//! broadcasts, or it fails validation and changes nothing.

pub mod playlist;
pub mod queue;

use crate::config::ConfigManager;
use crate::error::{Error, Result};
use crate::events::{NowPlaying, PlayState, PlayerSnapshot, QueueView, StatusSummary};
use crate::youtube::MetadataResolver;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use playlist::Playlist;
use queue::{HistoryRing, PriorityQueue, Track};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// How many played tracks "previous" and repeat-limiting can see.
pub const HISTORY_CAPACITY: usize = 100;

/// Update channel depth. Sending never blocks; a subscriber that falls
/// this far behind skips ahead to newer snapshots. A missed intermediate
/// snapshot is fine, the next mutation publishes a fresher one.
const UPDATE_CHANNEL_CAPACITY: usize = 100;

struct PlayerInner {
    queue: PriorityQueue,
    history: HistoryRing,
    current: Option<Track>,
    state: PlayState,
}

/// The one player instance for the process.
///
/// Constructed once at startup and passed by `Arc` to every collaborator
/// (HTTP handlers, donation feed, cleanup timer).
pub struct Player {
    config: Arc<ConfigManager>,
    resolver: Arc<dyn MetadataResolver>,
    playlist: Arc<Playlist>,
    inner: Mutex<PlayerInner>,
    update_tx: broadcast::Sender<PlayerSnapshot>,
}

impl Player {
    pub fn new(
        config: Arc<ConfigManager>,
        resolver: Arc<dyn MetadataResolver>,
        playlist: Arc<Playlist>,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            config,
            resolver,
            playlist,
            inner: Mutex::new(PlayerInner {
                queue: PriorityQueue::new(),
                history: HistoryRing::new(HISTORY_CAPACITY),
                current: None,
                state: PlayState::Stopped,
            }),
            update_tx,
        }
    }

    /// Subscribe to state snapshots. Each observable change produces one.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerSnapshot> {
        self.update_tx.subscribe()
    }

    pub fn playlist(&self) -> &Arc<Playlist> {
        &self.playlist
    }

    /// Validate a submission and enqueue it.
    ///
    /// Resolution happens before the critical section; only the in-memory
    /// bookkeeping is serialized. If the player was idle (stopped, nothing
    /// current, nothing pending) the new track starts playing immediately.
    pub async fn validate_and_add(
        &self,
        video_id: &str,
        added_by: &str,
        is_paid: bool,
    ) -> Result<()> {
        let info = self.resolver.resolve(video_id).await?;
        if !info.embeddable {
            return Err(Error::NotEmbeddable);
        }

        let cfg = self.config.get();
        if cfg.max_duration_minutes > 0 && info.duration_secs > cfg.max_duration_minutes * 60 {
            return Err(Error::TrackTooLong {
                max_minutes: cfg.max_duration_minutes,
            });
        }
        if cfg.min_views > 0 && info.views < cfg.min_views {
            return Err(Error::InsufficientViews {
                min_views: cfg.min_views,
            });
        }

        let track = Track {
            video_id: video_id.to_string(),
            title: info.title,
            duration_secs: info.duration_secs,
            views: info.views,
            added_at: Utc::now(),
            added_by: added_by.to_string(),
            is_paid,
        };

        let mut inner = self.inner.lock();
        if !self.can_repeat(&inner, video_id, cfg.repeat_limit) {
            return Err(Error::RepeatLimit);
        }
        if cfg.max_queue_size > 0 {
            let total = inner.queue.len() + usize::from(inner.current.is_some());
            if total >= cfg.max_queue_size {
                return Err(Error::QueueFull {
                    max: cfg.max_queue_size,
                });
            }
        }

        let was_empty = inner.queue.is_empty() && inner.current.is_none();
        info!(
            "Added: {} by {} (paid={})",
            track.title, track.added_by, track.is_paid
        );
        inner.queue.add(track);
        if inner.state == PlayState::Stopped && was_empty {
            self.play_next(&mut inner);
        }
        self.publish(&inner);
        Ok(())
    }

    /// Start or resume playback.
    ///
    /// Fails with "queue is empty" only when no source can supply a track;
    /// an enabled fallback playlist counts as a source.
    pub fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.queue.is_empty() && inner.current.is_none() {
            if self.playlist.is_enabled() {
                self.play_next(&mut inner);
            }
            if inner.current.is_none() {
                // playlist disabled, or enabled but empty
                return Err(Error::QueueEmpty);
            }
            info!("Playing");
            self.publish(&inner);
            return Ok(());
        }
        if inner.current.is_none() {
            self.play_next(&mut inner);
        } else {
            inner.state = PlayState::Playing;
        }
        info!("Playing");
        self.publish(&inner);
        Ok(())
    }

    /// Pause playback. No-op when already paused.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.state != PlayState::Paused {
            inner.state = PlayState::Paused;
            info!("Paused");
            self.publish(&inner);
        }
    }

    /// Stop playback and disable the fallback playlist, so playback does
    /// not silently resume from the playlist on the next `play`.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != PlayState::Stopped {
            inner.state = PlayState::Stopped;
            self.playlist.disable();
            info!("Stopped");
            self.publish(&inner);
        }
    }

    /// Skip to the next track. The outgoing track is pushed to history;
    /// if it came from the playlist the playlist cursor advances.
    pub fn next(&self) {
        let mut inner = self.inner.lock();
        if let Some(cur) = inner.current.take() {
            let from_playlist = cur.is_playlist_origin();
            inner.history.push(cur);
            if from_playlist {
                self.playlist.advance_to_next();
            }
        }
        self.play_next(&mut inner);
        self.publish(&inner);
    }

    /// Return to the most recent history entry.
    ///
    /// The outgoing current track is put back where it came from: playlist
    /// tracks step the cursor back, request tracks go to the front of the
    /// queue so they replay right after the restored one. The playlist
    /// cursor moves at most one step per call, even when both the outgoing
    /// and the restored track are playlist-origin.
    pub fn previous(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.history.is_empty() {
            return Err(Error::NoPreviousTrack);
        }
        let mut cursor_stepped = false;
        if let Some(cur) = inner.current.take() {
            if cur.is_playlist_origin() {
                self.playlist.go_to_previous();
                cursor_stepped = true;
            } else {
                inner.queue.add_front(cur);
            }
        }
        let Some(prev) = inner.history.pop() else {
            return Err(Error::NoPreviousTrack);
        };
        if prev.is_playlist_origin() && !cursor_stepped {
            self.playlist.go_to_previous();
        }
        info!("Previous track: {}", prev.title);
        inner.current = Some(prev);
        inner.state = PlayState::Playing;
        self.publish(&inner);
        Ok(())
    }

    /// Play the playlist track at logical `index` immediately.
    ///
    /// The cursor is advanced to `index + 1` on a best-effort basis: that
    /// advance can only fail when a concurrent reload shrank the list (or
    /// the jump target was the final entry), and the jump itself still
    /// stands.
    pub fn playlist_jump(&self, index: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        if !self.playlist.loaded() {
            return Err(Error::NoPlaylistLoaded);
        }
        let track = self.playlist.get_at(index).ok_or(Error::IndexOutOfRange)?;
        if let Err(e) = self.playlist.jump_to_index(index + 1) {
            debug!("Cursor advance after playlist jump skipped: {e}");
        }
        if let Some(cur) = inner.current.take() {
            inner.history.push(cur);
        }
        info!("Playlist jump to: {}", track.title);
        inner.current = Some(track);
        inner.state = PlayState::Playing;
        self.publish(&inner);
        Ok(())
    }

    /// Remove the pending entry at `index` and return it.
    pub fn remove(&self, index: usize) -> Result<Track> {
        let mut inner = self.inner.lock();
        let track = inner.queue.remove_at(index).ok_or(Error::IndexOutOfRange)?;
        info!("Removed: {}", track.title);
        self.publish(&inner);
        Ok(track)
    }

    /// Drop everything pending plus the current track and stop. Returns
    /// how many tracks were discarded.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.queue.len() + usize::from(inner.current.is_some());
        inner.queue.clear();
        inner.current = None;
        inner.state = PlayState::Stopped;
        info!("Queue cleared ({count} tracks removed)");
        self.publish(&inner);
        count
    }

    /// Evict pending entries older than the configured age. Never touches
    /// the current track or history. Returns the eviction count.
    pub fn cleanup_old(&self) -> usize {
        let hours = self.config.get().cleanup_after_hours;
        if hours == 0 {
            return 0;
        }
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        let mut inner = self.inner.lock();
        let items = inner.queue.snapshot();
        let keep: Vec<Track> = items
            .iter()
            .filter(|t| t.added_at > cutoff)
            .cloned()
            .collect();
        let removed = items.len() - keep.len();
        if removed > 0 {
            inner.queue.clear();
            for track in keep {
                inner.queue.add(track);
            }
            if inner.queue.is_empty() && inner.current.is_none() {
                inner.state = PlayState::Stopped;
            }
            info!("Cleanup: removed {removed} old tracks");
            self.publish(&inner);
        }
        removed
    }

    /// Point-in-time full snapshot, as broadcast to subscribers.
    pub fn snapshot(&self) -> PlayerSnapshot {
        let inner = self.inner.lock();
        self.build_snapshot(&inner)
    }

    /// Publish a snapshot outside any player mutation, for playlist-only
    /// changes (enable/disable/shuffle) that alter the projected state.
    pub fn broadcast_update(&self) {
        let inner = self.inner.lock();
        self.publish(&inner);
    }

    /// Compact summary for the status endpoint.
    pub fn status(&self) -> StatusSummary {
        let inner = self.inner.lock();
        let queue_length = inner.queue.len() + usize::from(inner.current.is_some());
        StatusSummary {
            state: inner.state,
            current: inner.current.clone(),
            position: inner.history.len() + 1,
            queue_length,
        }
    }

    /// Overlay projection: artist/title split on the first " - ".
    pub fn now_playing(&self) -> NowPlaying {
        let inner = self.inner.lock();
        let Some(cur) = &inner.current else {
            return NowPlaying {
                status: inner.state,
                artist: String::new(),
                title: String::new(),
                full_title: None,
                url: String::new(),
            };
        };
        let (artist, title) = match cur.title.split_once(" - ") {
            Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
            None => (String::new(), cur.title.clone()),
        };
        NowPlaying {
            status: inner.state,
            artist,
            title,
            full_title: Some(cur.title.clone()),
            url: format!("https://www.youtube.com/watch?v={}", cur.video_id),
        }
    }

    /// Merged history + current + pending view.
    pub fn queue_view(&self) -> QueueView {
        let snapshot = self.snapshot();
        QueueView {
            current: snapshot.position,
            state: snapshot.action,
            total: snapshot.queue.len(),
            queue: snapshot.queue,
        }
    }

    /// Pull the next track: request queue first, then the playlist when
    /// enabled, else stop. Pulling from the playlist is a peek; the cursor
    /// only advances when that track later completes or is skipped.
    fn play_next(&self, inner: &mut PlayerInner) {
        if let Some(track) = inner.queue.next() {
            info!("Next track: {}", track.title);
            inner.current = Some(track);
            inner.state = PlayState::Playing;
            return;
        }
        if let Some(track) = self.playlist.get_next() {
            info!("Next track (playlist): {}", track.title);
            inner.current = Some(track);
            inner.state = PlayState::Playing;
            return;
        }
        inner.current = None;
        inner.state = PlayState::Stopped;
        info!("Queue finished");
    }

    /// Scan history newest-to-oldest: has this video already played
    /// `limit` times within the visible window?
    fn can_repeat(&self, inner: &PlayerInner, video_id: &str, limit: u32) -> bool {
        if limit == 0 {
            return true;
        }
        let hist = inner.history.snapshot();
        let mut count = 0u32;
        for track in hist.iter().rev() {
            if track.video_id == video_id {
                count += 1;
                if count >= limit {
                    return false;
                }
            }
        }
        true
    }

    fn build_snapshot(&self, inner: &PlayerInner) -> PlayerSnapshot {
        let hist = inner.history.snapshot();
        let position = hist.len();
        let pending = inner.queue.snapshot();
        let mut queue = Vec::with_capacity(hist.len() + 1 + pending.len());
        queue.extend(hist);
        queue.extend(inner.current.clone());
        queue.extend(pending);
        PlayerSnapshot {
            action: inner.state,
            current: inner.current.clone(),
            queue,
            position,
            playlist: self.playlist.status(),
        }
    }

    /// Non-blocking offer to the update channel. With no subscribers, or
    /// with subscribers that cannot keep up, the send outcome is ignored:
    /// a playback-control request is never held hostage by a slow consumer.
    fn publish(&self, inner: &PlayerInner) {
        let _ = self.update_tx.send(self.build_snapshot(inner));
    }

    /// Push a track straight into the pending queue, bypassing admission.
    #[cfg(test)]
    fn inject_pending(&self, track: Track) {
        let mut inner = self.inner.lock();
        inner.queue.add(track);
    }
}
