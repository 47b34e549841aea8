//! WebSocket Handler
//!
//! Streams the presentation surface to viewers. A viewer first receives a
//! snapshot, then every surface message after it. Viewers that fall behind
//! skip ahead.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::presentation::SurfaceMessage;
use crate::state::AppState;

/// WebSocket handler
pub struct WebSocketHandler;

impl WebSocketHandler {
    /// Handle WebSocket upgrade
    pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
        ws.on_upgrade(move |socket| Self::handle_socket(socket, state))
    }

    async fn handle_socket(socket: WebSocket, state: AppState) {
        let (mut sender, mut receiver) = socket.split();
        let (snapshot, mut updates) = state.surface.subscribe();
        let closed = snapshot.closed;

        tracing::debug!(viewers = state.surface.viewers(), "Viewer connected");

        if !send(&mut sender, &SurfaceMessage::Snapshot { snapshot }).await || closed {
            let _ = sender.close().await;
            return;
        }

        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Ok(message) => {
                        let last = message == SurfaceMessage::Closed;
                        if !send(&mut sender, &message).await || last {
                            break;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Viewer lagging, skipping ahead");
                    },
                    Err(RecvError::Closed) => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Viewer socket error");
                        break;
                    },
                    // Viewers are read-only
                    Some(Ok(_)) => {},
                },
            }
        }

        let _ = sender.close().await;
        tracing::debug!("Viewer disconnected");
    }
}

/// Returns `false` once the viewer is gone
async fn send<S>(sender: &mut S, message: &SurfaceMessage) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode surface message");
            return true;
        },
    };
    sender.send(Message::Text(text)).await.is_ok()
}
