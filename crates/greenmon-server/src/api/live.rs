use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use greenmon_notify::channels::broadcast::RoomHub;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Joins the greenhouse room and streams its events as JSON text frames.
pub async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(greenhouse_id): Path<String>,
) -> Response {
    let rooms = state.rooms.clone();
    ws.on_upgrade(move |socket| stream_room(socket, rooms, greenhouse_id))
}

async fn stream_room(mut socket: WebSocket, rooms: Arc<RoomHub>, greenhouse_id: String) {
    let mut rx = rooms.subscribe(&greenhouse_id);
    tracing::info!(greenhouse_id = %greenhouse_id, "Live subscriber joined");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode live event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(greenhouse_id = %greenhouse_id, skipped, "Live subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(greenhouse_id = %greenhouse_id, "Live subscriber left");
}
