//! WebSocket channel handling.
//!
//! A session identifies itself with an optional `userId` query parameter at
//! connect time; without one the channel is anonymous and only receives
//! broadcasts. Inbound events are point-to-point relays with no
//! persistence; outbound events come from the hub. On disconnect the
//! channel unregisters under its own id, so a stale close racing a
//! reconnect cannot take the newer session offline.

use crate::handlers::AppState;
use crate::metrics::{self, ConnectionMetricsGuard};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use courier_protocol::{ClientEvent, ServerEvent, UserId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId")]
    user_id: Option<UserId>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state, params.user_id))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, user: Option<UserId>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Registers the session (identified or anonymous) and rebroadcasts the
    // online snapshot to every channel, this one included.
    let (channel, mut events) = state.hub.connect(user);
    debug!(channel = %channel, user = ?user, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Events pushed to this channel by the hub.
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                metrics::record_event("outbound");
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }

            // Traffic from the client.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                metrics::record_event("inbound");
                                relay_client_event(&state, user, event);
                            }
                            Err(e) => {
                                debug!(channel = %channel, error = %e, "Ignoring malformed client event");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_))) => {
                        // Ignored; the channel speaks JSON text frames.
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(channel = %channel, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(channel = %channel, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(channel = %channel, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Channel-scoped unregister plus snapshot rebroadcast.
    state.hub.disconnect(channel, user);
    debug!(channel = %channel, "WebSocket disconnected");
}

/// Relay an inbound client event to its single target channel.
///
/// Nothing here is persisted; an offline target simply means the event is
/// dropped.
fn relay_client_event(state: &Arc<AppState>, user: Option<UserId>, event: ClientEvent) {
    match event {
        ClientEvent::Typing {
            receiver_id,
            is_typing,
        } => {
            // Anonymous channels have no sender identity to attribute.
            let Some(sender_id) = user else { return };
            state.hub.send_to_user(
                receiver_id,
                ServerEvent::UserTyping {
                    sender_id,
                    is_typing,
                },
            );
        }
        ClientEvent::MessageRead {
            sender_id,
            message_id,
        } => {
            // Optimistic read receipt to the message's sender; independent
            // of (and additional to) the REST acknowledgement path.
            state
                .hub
                .send_to_user(sender_id, ServerEvent::read_receipt(message_id));
        }
    }
}
