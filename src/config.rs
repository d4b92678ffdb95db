//! Configuration loading and hot reload
//!
//! The config file is TOML and is re-read by the player on every admission
//! and cleanup tick via [`ConfigManager::get`], so edits take effect without
//! a restart. A background task polls the file's mtime and swaps the
//! snapshot in place; a file that fails to parse leaves the previous
//! snapshot active.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// How often the reload task checks the config file for changes.
const RELOAD_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Runtime configuration, all limits optional (0 disables a limit).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Reject tracks longer than this many minutes (0 = no limit)
    pub max_duration_minutes: u32,
    /// Reject tracks with fewer views than this (0 = no limit)
    pub min_views: u64,
    /// Reject a video that already played this many times within visible
    /// history (0 = unlimited repeats)
    pub repeat_limit: u32,
    /// Evict pending tracks older than this many hours (0 = never)
    pub cleanup_after_hours: u32,
    /// Cap on pending queue + currently playing track (0 = default 100)
    pub max_queue_size: usize,
    /// Donation widget URL; empty disables the donation monitor
    pub donation_widget_url: String,
    /// Minimum donation amount that queues a track
    pub donation_min_amount: i64,
    /// YouTube Data API v3 key
    pub youtube_api_key: String,
    /// Playlist to fall back to when the request queue is empty
    pub fallback_playlist_url: String,
    /// SQLite file for the lookup cache
    pub cache_path: String,
    /// Lookup cache entry lifetime in hours (0 = never expires)
    pub cache_ttl_hours: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            max_duration_minutes: 0,
            min_views: 0,
            repeat_limit: 0,
            cleanup_after_hours: 0,
            max_queue_size: 100,
            donation_widget_url: String::new(),
            donation_min_amount: 0,
            youtube_api_key: String::new(),
            fallback_playlist_url: String::new(),
            cache_path: "tubejay-cache.db".to_string(),
            cache_ttl_hours: 24,
        }
    }
}

impl Config {
    fn parse(raw: &str) -> Result<Self> {
        let mut cfg: Config =
            toml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        if cfg.max_queue_size == 0 {
            cfg.max_queue_size = 100;
        }
        Ok(cfg)
    }
}

/// Shared, hot-reloadable configuration snapshot.
pub struct ConfigManager {
    path: Option<PathBuf>,
    current: RwLock<Config>,
}

impl ConfigManager {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let cfg = Config::parse(&raw)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(cfg),
        })
    }

    /// Wrap an in-memory configuration; used by tests and defaults.
    pub fn from_config(cfg: Config) -> Self {
        Self {
            path: None,
            current: RwLock::new(cfg),
        }
    }

    /// Point-in-time snapshot of the current configuration.
    pub fn get(&self) -> Config {
        self.current.read().clone()
    }

    /// Re-read the config file, keeping the old snapshot on any failure.
    pub fn reload(&self) {
        let Some(path) = &self.path else { return };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Config reload failed to read file: {e}");
                return;
            }
        };
        match Config::parse(&raw) {
            Ok(cfg) => {
                *self.current.write() = cfg;
                info!("Config reloaded");
            }
            Err(e) => warn!("Config reload ignored: {e}"),
        }
    }

    /// Watch the config file for modification and reload on change.
    ///
    /// Runs until the process exits. Spawn with `tokio::spawn`.
    pub async fn watch(self: Arc<Self>) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let mut last_mtime = file_mtime(&path);
        let mut tick = tokio::time::interval(RELOAD_POLL_INTERVAL);
        loop {
            tick.tick().await;
            let mtime = file_mtime(&path);
            if mtime != last_mtime {
                debug!("Config file changed on disk");
                last_mtime = mtime;
                self.reload();
            }
        }
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_applies_defaults() {
        let cfg = Config::parse("port = 9000\n").unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.max_queue_size, 100);
        assert_eq!(cfg.cache_ttl_hours, 24);
        assert_eq!(cfg.repeat_limit, 0);
        assert!(cfg.youtube_api_key.is_empty());
    }

    #[test]
    fn parse_zero_queue_size_becomes_default() {
        let cfg = Config::parse("max_queue_size = 0\n").unwrap();
        assert_eq!(cfg.max_queue_size, 100);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Config::parse("port = \"not a number\"").is_err());
    }

    #[test]
    fn manager_snapshot_is_detached() {
        let mgr = ConfigManager::from_config(Config {
            repeat_limit: 3,
            ..Config::default()
        });
        let snap = mgr.get();
        assert_eq!(snap.repeat_limit, 3);
    }
}
