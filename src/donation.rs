//! Donation feed monitor
//!
//! Consumes the donation widget's SSE stream and admits one paid track per
//! qualifying donation: amount at or above the configured minimum, not seen
//! before, and carrying a YouTube link in its message. De-duplication and
//! amount filtering happen here; the player only sees clean admissions.
//!
//! The connection loop reconnects forever with exponential backoff (10s
//! base, doubled per failure, capped at 5 minutes, reset on a successful
//! connect).

use crate::error::{Error, Result};
use crate::player::Player;
use crate::youtube::extract_video_id;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const BACKOFF_BASE: Duration = Duration::from_secs(10);
const BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Upper bound on remembered donation IDs; oldest evicted beyond this.
const MAX_SEEN_DONATIONS: usize = 500;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    response: AuthTokens,
}

#[derive(Debug, Deserialize)]
struct AuthTokens {
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(default)]
    action: String,
    #[serde(default)]
    data: SseEventData,
}

#[derive(Debug, Default, Deserialize)]
struct SseEventData {
    #[serde(rename = "streamEventType", default)]
    stream_event_type: String,
    #[serde(rename = "streamEventData", default)]
    stream_event_data: String,
}

#[derive(Debug, Deserialize)]
struct Donation {
    #[serde(rename = "refId", default)]
    ref_id: String,
    #[serde(default)]
    amount: i64,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(default)]
    message: String,
}

/// Watches the donation SSE stream and feeds paid tracks to the player.
pub struct DonationMonitor {
    widget_id: String,
    widget_token: String,
    min_amount: i64,
    player: Arc<Player>,
    http: reqwest::Client,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DonationMonitor {
    /// Parse the widget URL (must carry `ref` and `token` query params).
    pub fn new(widget_url: &str, min_amount: i64, player: Arc<Player>) -> Result<Self> {
        let url = reqwest::Url::parse(widget_url)
            .map_err(|e| Error::Config(format!("invalid donation widget URL: {e}")))?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };
        let (widget_id, widget_token) = match (param("ref"), param("token")) {
            (Some(id), Some(token)) => (id, token),
            _ => {
                return Err(Error::Config(
                    "missing ref or token in donation widget URL".to_string(),
                ))
            }
        };
        Ok(Self {
            widget_id,
            widget_token,
            min_amount,
            player,
            http: reqwest::Client::new(),
            seen: Mutex::new(HashMap::new()),
        })
    }

    /// Reconnect loop; runs for the process lifetime.
    pub async fn run(self: Arc<Self>) {
        info!("Starting donation monitor (min: {})", self.min_amount);
        let mut backoff = BACKOFF_BASE;
        loop {
            let token = match self.fetch_access_token().await {
                Ok(token) => token,
                Err(e) => {
                    warn!("Failed to get donation access token: {e}");
                    tokio::time::sleep(backoff).await;
                    backoff = increase_backoff(backoff);
                    continue;
                }
            };
            if let Err(e) = self.consume_stream(&token, &mut backoff).await {
                warn!("Donation SSE connection error: {e}");
            }
            tokio::time::sleep(backoff).await;
            backoff = increase_backoff(backoff);
        }
    }

    async fn fetch_access_token(&self) -> Result<String> {
        let url = format!("https://api.donatty.com/auth/tokens/{}", self.widget_token);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Lookup(format!("token request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Lookup(format!(
                "failed to get access token: {}",
                resp.status().as_u16()
            )));
        }
        let auth: AuthResponse = resp
            .json()
            .await
            .map_err(|e| Error::Lookup(format!("failed to parse token response: {e}")))?;
        info!("Donation monitor: access token obtained");
        Ok(auth.response.access_token)
    }

    /// Read the SSE stream line by line until it drops.
    async fn consume_stream(&self, token: &str, backoff: &mut Duration) -> Result<()> {
        let url = format!(
            "https://api.donatty.com/widgets/{}/sse?jwt={token}",
            self.widget_id
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Lookup(format!("SSE connect failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Lookup(format!(
                "SSE connection failed: {}",
                resp.status().as_u16()
            )));
        }
        info!("Connected to donation SSE stream");
        *backoff = BACKOFF_BASE;

        let mut stream = resp.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Lookup(format!("SSE read failed: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if let Some(payload) = line.strip_prefix("data:") {
                    self.process_event(payload.trim());
                }
            }
        }
        Err(Error::Lookup("SSE stream closed".to_string()))
    }

    fn process_event(&self, payload: &str) {
        let Ok(event) = serde_json::from_str::<SseEvent>(payload) else {
            return;
        };
        if event.action != "DATA" || event.data.stream_event_type != "DONATTY_DONATION" {
            return;
        }
        let Ok(donation) = serde_json::from_str::<Donation>(&event.data.stream_event_data) else {
            return;
        };
        info!(
            "Donation received: {} donated {} - {}",
            donation.display_name, donation.amount, donation.message
        );
        if donation.amount < self.min_amount {
            debug!(
                "Skipping donation ({} < {} min)",
                donation.amount, self.min_amount
            );
            return;
        }
        if !self.mark_seen(&donation.ref_id) {
            debug!("Donation already processed: {}", donation.ref_id);
            return;
        }
        let Some(video_id) = extract_video_id(&donation.message) else {
            debug!("No YouTube link in donation from {}", donation.display_name);
            return;
        };

        info!(
            "Adding donation track from {}: {video_id}",
            donation.display_name
        );
        // admission does a metadata lookup; run it off the stream loop so a
        // slow resolve does not stall event processing
        let player = self.player.clone();
        let display_name = donation.display_name.clone();
        tokio::spawn(async move {
            if let Err(e) = player.validate_and_add(&video_id, &display_name, true).await {
                warn!("Failed to add donation track: {e}");
            }
        });
    }

    /// Record the donation ID; returns false when it was already seen.
    fn mark_seen(&self, ref_id: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains_key(ref_id) {
            return false;
        }
        seen.insert(ref_id.to_string(), Utc::now());
        if seen.len() > MAX_SEEN_DONATIONS {
            if let Some(oldest) = seen
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(k, _)| k.clone())
            {
                seen.remove(&oldest);
            }
        }
        true
    }
}

fn increase_backoff(current: Duration) -> Duration {
    (current * 2).min(BACKOFF_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigManager};
    use crate::player::playlist::Playlist;

    fn dummy_player() -> Arc<Player> {
        let resolver = Arc::new(crate::player::playlist::tests::StaticResolver { videos: vec![] });
        let playlist = Arc::new(Playlist::new(resolver.clone()));
        Arc::new(Player::new(
            Arc::new(ConfigManager::from_config(Config::default())),
            resolver,
            playlist,
        ))
    }

    #[test]
    fn widget_url_must_carry_ref_and_token() {
        let player = dummy_player();
        assert!(DonationMonitor::new(
            "https://widgets.donatty.com/x?ref=abc&token=def",
            100,
            player.clone(),
        )
        .is_ok());
        assert!(DonationMonitor::new("https://widgets.donatty.com/x?ref=abc", 100, player.clone()).is_err());
        assert!(DonationMonitor::new("not a url", 100, player).is_err());
    }

    #[test]
    fn duplicate_donations_are_dropped() {
        let monitor =
            DonationMonitor::new("https://w.example/x?ref=abc&token=def", 0, dummy_player())
                .unwrap();
        assert!(monitor.mark_seen("don-1"));
        assert!(!monitor.mark_seen("don-1"));
        assert!(monitor.mark_seen("don-2"));
    }

    #[test]
    fn seen_set_is_bounded() {
        let monitor =
            DonationMonitor::new("https://w.example/x?ref=abc&token=def", 0, dummy_player())
                .unwrap();
        for i in 0..(MAX_SEEN_DONATIONS + 10) {
            assert!(monitor.mark_seen(&format!("don-{i}")));
        }
        assert!(monitor.seen.lock().len() <= MAX_SEEN_DONATIONS);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = BACKOFF_BASE;
        b = increase_backoff(b);
        assert_eq!(b, Duration::from_secs(20));
        for _ in 0..10 {
            b = increase_backoff(b);
        }
        assert_eq!(b, BACKOFF_MAX);
    }
}
