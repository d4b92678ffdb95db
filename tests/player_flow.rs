//! End-to-end player scenarios
//!
//! Drives the player through realistic request/playlist sequences with a
//! canned resolver standing in for the YouTube API.

use async_trait::async_trait;
use std::sync::Arc;
use tubejay::config::{Config, ConfigManager};
use tubejay::error::Error;
use tubejay::events::PlayState;
use tubejay::player::playlist::Playlist;
use tubejay::player::Player;
use tubejay::youtube::{MetadataResolver, PlaylistVideo, VideoInfo};

struct CannedResolver {
    videos: Vec<PlaylistVideo>,
}

#[async_trait]
impl MetadataResolver for CannedResolver {
    async fn resolve(&self, video_id: &str) -> tubejay::Result<VideoInfo> {
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

    async fn resolve_all(&self, _playlist_id: &str) -> tubejay::Result<Vec<PlaylistVideo>> {
        if self.videos.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        Ok(self.videos.clone())
    }
}

fn video(id: &str, title: &str) -> PlaylistVideo {
    PlaylistVideo {
        video_id: id.to_string(),
        title: title.to_string(),
        duration_secs: 180,
        views: 50_000,
        embeddable: true,
    }
}

fn build_player(cfg: Config, videos: Vec<PlaylistVideo>) -> (Arc<Player>, Arc<Playlist>) {
    let resolver = Arc::new(CannedResolver { videos });
    let playlist = Arc::new(Playlist::new(resolver.clone()));
    let player = Arc::new(Player::new(
        Arc::new(ConfigManager::from_config(cfg)),
        resolver,
        playlist.clone(),
    ));
    (player, playlist)
}

#[tokio::test]
async fn stream_session_with_requests_and_fallback() {
    let catalogue = vec![
        video("requestaaaa", "Band A - First Request"),
        video("requestbbbb", "Band B - Second Request"),
        video("donationccc", "Band C - Donation Pick"),
        video("fallbackddd", "Chill - Background One"),
        video("fallbackeee", "Chill - Background Two"),
    ];
    let (player, playlist) = build_player(Config::default(), catalogue);

    // fallback playlist comes up before any viewer requests arrive
    playlist.load("PLabcdefghijklmnopqrstuvwxyz012345").await.unwrap();
    playlist.enable();
    player.play().unwrap();
    assert!(player.status().current.unwrap().is_playlist_origin());

    // a viewer request queues behind the playing fallback track
    player.validate_and_add("requestaaaa", "alice", false).await.unwrap();
    player.validate_and_add("requestbbbb", "bob", false).await.unwrap();
    // a donation jumps the unpaid requests
    player.validate_and_add("donationccc", "carol", true).await.unwrap();

    // skipping the fallback track advances its cursor and plays the paid pick
    player.next();
    assert_eq!(player.status().current.unwrap().video_id, "donationccc");
    assert_eq!(playlist.current_index(), 1);

    player.next();
    assert_eq!(player.status().current.unwrap().video_id, "requestaaaa");
    player.next();
    assert_eq!(player.status().current.unwrap().video_id, "requestbbbb");

    // queue drained: playback falls back to the playlist again
    player.next();
    assert!(player.status().current.unwrap().is_playlist_origin());
    assert_eq!(player.status().state, PlayState::Playing);
}

#[tokio::test]
async fn previous_walks_back_through_history() {
    let (player, _) = build_player(
        Config::default(),
        vec![
            video("trackoneaaa", "One"),
            video("tracktwobbb", "Two"),
            video("trackthrccc", "Three"),
        ],
    );
    player.validate_and_add("trackoneaaa", "alice", false).await.unwrap();
    player.validate_and_add("tracktwobbb", "alice", false).await.unwrap();
    player.validate_and_add("trackthrccc", "alice", false).await.unwrap();

    player.next();
    player.next(); // current = Three, history = [One, Two]

    player.previous().unwrap();
    assert_eq!(player.status().current.unwrap().video_id, "tracktwobbb");
    player.previous().unwrap();
    assert_eq!(player.status().current.unwrap().video_id, "trackoneaaa");
    assert!(matches!(player.previous(), Err(Error::NoPreviousTrack)));

    // the displaced tracks replay in their original order
    player.next();
    assert_eq!(player.status().current.unwrap().video_id, "tracktwobbb");
    player.next();
    assert_eq!(player.status().current.unwrap().video_id, "trackthrccc");
}

#[tokio::test]
async fn admission_limits_enforced_in_order() {
    let cfg = Config {
        max_duration_minutes: 3,
        min_views: 10_000,
        max_queue_size: 2,
        ..Config::default()
    };
    let videos = vec![
        PlaylistVideo {
            video_id: "toolongvide".to_string(),
            title: "Too Long".to_string(),
            duration_secs: 181,
            views: 50_000,
            embeddable: true,
        },
        PlaylistVideo {
            video_id: "unpopularvd".to_string(),
            title: "Unpopular".to_string(),
            duration_secs: 100,
            views: 9_999,
            embeddable: true,
        },
        video("acceptedaaa", "Fine A"),
        video("acceptedbbb", "Fine B"),
        video("acceptedccc", "Fine C"),
    ];
    let (player, _) = build_player(cfg, videos);

    assert!(matches!(
        player.validate_and_add("toolongvide", "alice", false).await,
        Err(Error::TrackTooLong { max_minutes: 3 })
    ));
    assert!(matches!(
        player.validate_and_add("unpopularvd", "alice", false).await,
        Err(Error::InsufficientViews { min_views: 10_000 })
    ));

    player.validate_and_add("acceptedaaa", "alice", false).await.unwrap();
    player.validate_and_add("acceptedbbb", "alice", false).await.unwrap();
    assert!(matches!(
        player.validate_and_add("acceptedccc", "alice", false).await,
        Err(Error::QueueFull { max: 2 })
    ));
}

#[tokio::test]
async fn snapshots_flow_to_subscribers() {
    let (player, _) = build_player(Config::default(), vec![video("watchedvida", "Watched")]);
    let mut rx = player.subscribe();

    player.validate_and_add("watchedvida", "alice", false).await.unwrap();
    let snap = rx.recv().await.unwrap();
    assert_eq!(snap.action, PlayState::Playing);
    assert_eq!(snap.queue.len(), 1);
    assert_eq!(snap.position, 0);

    player.pause();
    let snap = rx.recv().await.unwrap();
    assert_eq!(snap.action, PlayState::Paused);

    player.stop();
    let snap = rx.recv().await.unwrap();
    assert_eq!(snap.action, PlayState::Stopped);
}
