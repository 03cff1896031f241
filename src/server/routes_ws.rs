//! `GET /ws`: live event channel.
//!
//! Every connected socket gets its own [`crate::events::Listener`]. The only
//! message read from clients is `{"type":"abort"}`.

use crate::conversion::JobCoordinator;
use crate::server::AppContext;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use vidladder_common::ClientMessage;

pub fn ws_routes() -> Router<AppContext> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let listener = ctx.events.connect();
    let listener_id = listener.id;
    let mut events = listener.events;
    tracing::info!(listener = %listener_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let ping_every = Duration::from_secs(ctx.config.server.ws_ping_interval_secs.max(1));

    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_every);
        // The first tick completes immediately
        ping.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&*event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Failed to serialize {} event: {}", event.kind(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let coordinator = ctx.coordinator.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_message(&coordinator, &text);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    ctx.events.disconnect(listener_id);
    tracing::info!(listener = %listener_id, "WebSocket client disconnected");
}

/// Act on a text frame from a client. Returns true if it cancelled a job.
pub fn handle_client_message(coordinator: &JobCoordinator, text: &str) -> bool {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Abort) => {
            tracing::info!("Abort requested by client");
            coordinator.cancel()
        }
        Err(e) => {
            tracing::warn!("Ignoring client message {:?}: {}", text, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::TranscodeRunner;
    use crate::events::Broadcaster;
    use std::sync::Arc;

    fn idle_coordinator() -> (JobCoordinator, Arc<Broadcaster>) {
        let events = Arc::new(Broadcaster::default());
        let runner = TranscodeRunner::new("bash", "tool.bash");
        (JobCoordinator::new(runner, Arc::clone(&events)), events)
    }

    #[test]
    fn malformed_messages_are_ignored() {
        let (coordinator, events) = idle_coordinator();
        let mut listener = events.connect();

        for text in ["", "abort", "{}", r#"{"type":"pause"}"#, r#"{"kind":"abort"}"#] {
            assert!(!handle_client_message(&coordinator, text));
        }
        assert!(listener.events.try_recv().is_err());
    }

    #[test]
    fn abort_when_idle_does_nothing() {
        let (coordinator, events) = idle_coordinator();
        let mut listener = events.connect();

        assert!(!handle_client_message(&coordinator, r#"{"type":"abort"}"#));
        assert!(listener.events.try_recv().is_err());
    }
}
