//! Request queue and playback history
//!
//! The pending queue keeps paid (donation) tracks in a contiguous prefix,
//! FIFO within each class. History is a fixed-size ring so "go back" and
//! repeat-limiting only ever see the most recent hundred plays.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Submitter name stamped on tracks that came from the fallback playlist.
pub const PLAYLIST_SUBMITTER: &str = "Playlist";

/// One playable queue entry. Immutable once constructed; replaced, never
/// mutated in place. Duplicate video IDs added at different times are
/// distinct tracks.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub video_id: String,
    pub title: String,
    pub duration_secs: u32,
    pub views: u64,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub added_by: String,
    pub is_paid: bool,
}

impl Track {
    /// Whether this track was pulled from the fallback playlist.
    pub fn is_playlist_origin(&self) -> bool {
        self.added_by == PLAYLIST_SUBMITTER
    }
}

/// Pending-request queue with donation priority.
///
/// Invariant: paid tracks form a contiguous prefix in insertion order,
/// followed by unpaid tracks in insertion order. `add_front` is the one
/// deliberate exception, used only to restore a track during "previous":
/// restored entries stay at the head (counted by `pinned`) and later paid
/// arrivals slot in behind them, never ahead.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    items: Vec<Track>,
    /// Leading entries placed by `add_front`; the paid/unpaid partition
    /// applies to everything after them.
    pinned: usize,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            pinned: 0,
        }
    }

    /// Insert by the paid/unpaid partition rule: paid tracks go after the
    /// paid prefix, unpaid tracks append. Queue sizes are capped in the
    /// low hundreds, so the linear scan is fine.
    pub fn add(&mut self, track: Track) {
        if track.is_paid {
            let pos = self.pinned
                + self.items[self.pinned..]
                    .iter()
                    .take_while(|t| t.is_paid)
                    .count();
            self.items.insert(pos, track);
        } else {
            self.items.push(track);
        }
    }

    /// Insert at absolute position 0, bypassing the partition rule.
    pub fn add_front(&mut self, track: Track) {
        self.items.insert(0, track);
        self.pinned += 1;
    }

    /// Remove and return the head of the queue.
    pub fn next(&mut self) -> Option<Track> {
        if self.items.is_empty() {
            return None;
        }
        self.pinned = self.pinned.saturating_sub(1);
        Some(self.items.remove(0))
    }

    /// Remove the entry at `index` (0-based from the pending head).
    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.items.len() {
            return None;
        }
        if index < self.pinned {
            self.pinned -= 1;
        }
        Some(self.items.remove(index))
    }

    /// Ordered copy of the pending entries.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.clone()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.pinned = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fixed-capacity circular log of played tracks.
///
/// Oldest entries are silently overwritten once full. `pop` is LIFO so
/// "previous" walks backwards through playback order.
#[derive(Debug)]
pub struct HistoryRing {
    buf: Vec<Option<Track>>,
    head: usize,
    size: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![None; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Append a track, overwriting the oldest slot if at capacity.
    pub fn push(&mut self, track: Track) {
        let cap = self.buf.len();
        self.buf[self.head] = Some(track);
        self.head = (self.head + 1) % cap;
        if self.size < cap {
            self.size += 1;
        }
    }

    /// Remove and return the most recently pushed track.
    pub fn pop(&mut self) -> Option<Track> {
        if self.size == 0 {
            return None;
        }
        let cap = self.buf.len();
        self.head = (self.head + cap - 1) % cap;
        self.size -= 1;
        self.buf[self.head].take()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Oldest-to-newest copy of the retained history.
    pub fn snapshot(&self) -> Vec<Track> {
        let cap = self.buf.len();
        let start = (self.head + cap - self.size) % cap;
        (0..self.size)
            .filter_map(|i| self.buf[(start + i) % cap].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_track(id: &str, paid: bool) -> Track {
        Track {
            video_id: id.to_string(),
            title: format!("title-{id}"),
            duration_secs: 180,
            views: 1000,
            added_at: Utc::now(),
            added_by: "User".to_string(),
            is_paid: paid,
        }
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.video_id.as_str()).collect()
    }

    #[test]
    fn paid_tracks_form_contiguous_prefix() {
        let mut q = PriorityQueue::new();
        q.add(test_track("u1", false));
        q.add(test_track("p1", true));
        q.add(test_track("u2", false));
        q.add(test_track("p2", true));
        q.add(test_track("u3", false));
        q.add(test_track("p3", true));

        let snap = q.snapshot();
        assert_eq!(ids(&snap), vec!["p1", "p2", "p3", "u1", "u2", "u3"]);
        // the partition must hold at every boundary
        let first_unpaid = snap.iter().position(|t| !t.is_paid).unwrap();
        assert!(snap[..first_unpaid].iter().all(|t| t.is_paid));
        assert!(snap[first_unpaid..].iter().all(|t| !t.is_paid));
    }

    #[test]
    fn add_front_bypasses_partition() {
        let mut q = PriorityQueue::new();
        q.add(test_track("p1", true));
        let restored = test_track("u1", false);
        q.add_front(restored.clone());
        // another paid arrival must not displace the restored track
        q.add(test_track("p2", true));
        let head = q.next().unwrap();
        assert_eq!(head.video_id, "u1");
    }

    #[test]
    fn next_add_front_round_trip() {
        let mut q = PriorityQueue::new();
        q.add(test_track("a", false));
        q.add(test_track("b", false));
        let a = q.next().unwrap();
        q.add_front(a);
        assert_eq!(q.next().unwrap().video_id, "a");
        assert_eq!(q.next().unwrap().video_id, "b");
        assert!(q.next().is_none());
    }

    #[test]
    fn partition_resumes_after_pinned_head_is_consumed() {
        let mut q = PriorityQueue::new();
        q.add(test_track("u1", false));
        q.add_front(test_track("x", false));
        assert_eq!(q.next().unwrap().video_id, "x");
        // with the restored head gone, paid tracks lead again
        q.add(test_track("p1", true));
        assert_eq!(ids(&q.snapshot()), vec!["p1", "u1"]);
    }

    #[test]
    fn remove_at_bounds() {
        let mut q = PriorityQueue::new();
        q.add(test_track("a", false));
        q.add(test_track("b", false));
        assert!(q.remove_at(2).is_none());
        assert_eq!(q.remove_at(1).unwrap().video_id, "b");
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = PriorityQueue::new();
        q.add(test_track("a", false));
        q.clear();
        assert!(q.is_empty());
        assert!(q.next().is_none());
    }

    #[test]
    fn ring_overwrites_oldest_at_capacity() {
        let mut ring = HistoryRing::new(3);
        for i in 0..5 {
            ring.push(test_track(&format!("t{i}"), false));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ids(&ring.snapshot()), vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn ring_pop_is_lifo() {
        let mut ring = HistoryRing::new(4);
        ring.push(test_track("a", false));
        ring.push(test_track("b", false));
        assert_eq!(ring.pop().unwrap().video_id, "b");
        assert_eq!(ring.pop().unwrap().video_id, "a");
        assert!(ring.pop().is_none());
    }

    #[test]
    fn ring_pop_after_wrap() {
        let mut ring = HistoryRing::new(2);
        ring.push(test_track("a", false));
        ring.push(test_track("b", false));
        ring.push(test_track("c", false));
        assert_eq!(ring.pop().unwrap().video_id, "c");
        assert_eq!(ring.pop().unwrap().video_id, "b");
        assert!(ring.pop().is_none());
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn ring_push_pop_push_keeps_order() {
        let mut ring = HistoryRing::new(3);
        ring.push(test_track("a", false));
        ring.push(test_track("b", false));
        ring.pop();
        ring.push(test_track("c", false));
        assert_eq!(ids(&ring.snapshot()), vec!["a", "c"]);
    }
}
