use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::AppState;
use crate::hub::{BroadcastHub, ChannelObserver};
use crate::models::LiveMessage;

/// Messages a socket may fall behind by before the hub drops it.
const OBSERVER_BUFFER: usize = 256;

pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state.hub))
}

async fn serve_socket(socket: WebSocket, hub: BroadcastHub) {
    let (tx, mut rx) = mpsc::channel::<Arc<LiveMessage>>(OBSERVER_BUFFER);
    let id = hub.register(Box::new(ChannelObserver::new(tx)));
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&*message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode live message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; the reader only watches for the close.
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    hub.unregister(id);
    debug!("Live socket {} closed", id);
}
