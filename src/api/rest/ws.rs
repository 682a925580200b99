use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::geo::ingest_agent_location;
use crate::live::ClientEvent;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(subject_id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, subject_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subject_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = state.registry.register(subject_id);

    state.metrics.live_connections.inc();
    info!(%subject_id, "live socket connected");

    let send_task = tokio::spawn(async move {
        let mut events = ReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize live event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::UpdateLocation {
                    latitude,
                    longitude,
                }) => {
                    if let Err(error) =
                        ingest_agent_location(&recv_state, subject_id, latitude, longitude)
                    {
                        warn!(%subject_id, %error, "ignored location sample");
                    }
                }
                Err(err) => {
                    warn!(%subject_id, error = %err, "unreadable client event");
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.registry.deregister(subject_id, &tx);
    state.metrics.live_connections.dec();
    info!(%subject_id, "live socket disconnected");
}
