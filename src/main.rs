//! tubejay - main entry point
//!
//! Wires the player core to its collaborators (config, lookup cache,
//! fallback playlist, donation feed, cleanup timer) and serves the HTTP
//! API with WebSocket state updates.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubejay::api::{self, AppState};
use tubejay::config::ConfigManager;
use tubejay::donation::DonationMonitor;
use tubejay::player::playlist::Playlist;
use tubejay::player::Player;
use tubejay::youtube::cache::LookupCache;
use tubejay::youtube::{MetadataResolver, YouTubeClient};

/// Command-line arguments for tubejay
#[derive(Parser, Debug)]
#[command(name = "tubejay")]
#[command(about = "Live-stream music request bot")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml", env = "TUBEJAY_CONFIG")]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TUBEJAY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubejay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Arc::new(
        ConfigManager::load(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?,
    );
    let cfg = config.get();
    let port = args.port.unwrap_or(cfg.port);

    info!("Starting tubejay on port {}", port);

    let cache = LookupCache::open(&cfg.cache_path, cfg.cache_ttl_hours)
        .await
        .context("Failed to open lookup cache")?;
    let resolver: Arc<dyn MetadataResolver> =
        Arc::new(YouTubeClient::new(cfg.youtube_api_key.clone(), cache));
    let playlist = Arc::new(Playlist::new(resolver.clone()));
    let player = Arc::new(Player::new(config.clone(), resolver, playlist.clone()));

    // hot reload of the config file
    tokio::spawn(config.clone().watch());

    // hourly eviction of stale pending requests
    {
        let player = player.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(3600));
            tick.tick().await; // the first tick fires immediately; skip it
            loop {
                tick.tick().await;
                player.cleanup_old();
            }
        });
    }

    // load and enable the fallback playlist in the background
    if !cfg.fallback_playlist_url.is_empty() {
        let playlist = playlist.clone();
        let player = player.clone();
        let url = cfg.fallback_playlist_url.clone();
        tokio::spawn(async move {
            match playlist.load(&url).await {
                Ok(count) => {
                    playlist.enable();
                    player.broadcast_update();
                    info!("Fallback playlist ready ({count} tracks)");
                }
                Err(e) => warn!("Failed to load fallback playlist: {e}"),
            }
        });
    }

    // donation feed
    let mut donation_enabled = false;
    if !cfg.donation_widget_url.is_empty() {
        match DonationMonitor::new(&cfg.donation_widget_url, cfg.donation_min_amount, player.clone())
        {
            Ok(monitor) => {
                tokio::spawn(Arc::new(monitor).run());
                donation_enabled = true;
            }
            Err(e) => warn!("Donation monitor disabled: {e}"),
        }
    }

    let state = AppState {
        player,
        config,
        donation_enabled,
    };
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
