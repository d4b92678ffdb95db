//! HTTP API for playback control
//!
//! REST endpoints plus the `/ws` WebSocket feed, mirroring what the
//! dashboard, the OBS overlay and chat-bot integrations call. All bodies
//! share the `{success, message?, data?}` envelope with typed payloads.

pub mod handlers;
pub mod ws;

use crate::config::ConfigManager;
use crate::error::Error;
use crate::player::Player;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub player: Arc<Player>,
    pub config: Arc<ConfigManager>,
    /// Whether a donation monitor was started for this process
    pub donation_enabled: bool,
}

/// Response envelope used by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    pub fn message_with_data(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: None,
        })
    }
}

/// Error wrapper that renders as the failure envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_rejection() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()> {
            success: false,
            message: Some(self.message),
            data: None,
        });
        (self.status, body).into_response()
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/add", post(handlers::add))
        .route("/api/add-url", post(handlers::add))
        .route("/api/play", post(handlers::play))
        .route("/api/pause", post(handlers::pause))
        .route("/api/stop", post(handlers::stop))
        .route("/api/next", post(handlers::next))
        .route("/api/previous", post(handlers::previous))
        .route("/api/status", get(handlers::status))
        .route("/api/queue", get(handlers::queue))
        .route("/api/nowplaying", get(handlers::now_playing))
        .route("/api/remove", post(handlers::remove).delete(handlers::remove))
        .route("/api/clear", post(handlers::clear))
        .route("/api/playlist/set", post(handlers::playlist_set))
        .route("/api/playlist/enable", post(handlers::playlist_enable))
        .route("/api/playlist/disable", post(handlers::playlist_disable))
        .route("/api/playlist/status", get(handlers::playlist_status))
        .route("/api/playlist/reload", post(handlers::playlist_reload))
        .route("/api/playlist/tracks", get(handlers::playlist_tracks))
        .route("/api/playlist/jump", post(handlers::playlist_jump))
        .route("/api/playlist/shuffle", post(handlers::playlist_shuffle))
        .route("/api/donation/status", get(handlers::donation_status))
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "module": "tubejay",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.config.get().port,
    }))
}
