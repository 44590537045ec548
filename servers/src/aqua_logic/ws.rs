use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::aqua_logic::state::AppState;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One live-view session. The subscription is registered with the
/// service (which queues the bootstrap frame when history is non-empty),
/// then frames are pumped into the socket until either side goes away.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let client_id = format!("ws-{}", NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed));
    let mut frames = state.service.subscribe(&client_id);
    log::info!("Live client '{}' connected", client_id);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&*frame) {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    Err(e) => log::error!("Failed to encode stream frame: {}", e),
                }
            }
            msg = socket.next() => {
                match msg {
                    // The live channel carries no client payload; only
                    // life-cycle frames matter here.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.service.unsubscribe(&client_id);
    log::info!("Live client '{}' disconnected", client_id);
}
