//! WebSocket state feed
//!
//! Each connection gets the current snapshot immediately, then every
//! snapshot the player publishes. The underlying channel drops the oldest
//! undelivered snapshots for subscribers that fall behind — a lagged
//! client resumes with the newest state instead of stalling the player.

use crate::api::AppState;
use crate::events::PlayerSnapshot;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// GET /ws — upgrade and attach to the update feed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.player.subscribe();

    // seed the client with current state before streaming changes
    if send_snapshot(&mut sender, &state.player.snapshot()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if send_snapshot(&mut sender, &snapshot).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WebSocket client lagged, skipped {skipped} snapshots");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                // clients only listen; inbound frames are drained to detect close
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("WebSocket client disconnected");
}

async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    snapshot: &PlayerSnapshot,
) -> Result<(), ()> {
    let payload = serde_json::to_string(snapshot).map_err(|_| ())?;
    sender.send(Message::Text(payload)).await.map_err(|_| ())
}
