//! REST handlers for the Courier server.
//!
//! Identity comes from the bearer credential on every route; authorization
//! and validation run before any mutation, so a rejected request leaves no
//! partial writes. Success of a send is decided solely by persistence, push
//! outcome never bleeds into the response.

use crate::config::Config;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::{metrics, ws};
use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use courier_core::{Hub, MediaResolver, PassthroughResolver};
use courier_protocol::{MessageRecord, NotificationRecord, NotificationView, UserId, UserProfile};
use courier_store::{NewMessage, Store};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

/// Shared server state.
pub struct AppState {
    /// Durable storage.
    pub store: Store,
    /// Realtime hub and presence registry.
    pub hub: Hub,
    /// Media collaborator seam.
    pub media: Arc<dyn MediaResolver>,
    /// Server configuration.
    pub config: Config,
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the server fails
/// to start.
pub async fn run_server(config: Config) -> Result<()> {
    let store = Store::connect(&config.database.url, config.database.max_connections).await?;

    let state = Arc::new(AppState {
        store,
        hub: Hub::new(),
        media: Arc::new(PassthroughResolver),
        config: config.clone(),
    });

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    let app = router(state, &config.transport.websocket_path);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Courier server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>, websocket_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/conversations", get(list_conversations))
        .route("/api/messages/:id", get(fetch_transcript).post(send_message))
        .route("/api/messages/:id/read", put(acknowledge_read))
        .route("/api/search/:receiver_id", get(search_messages))
        .route("/api/notifications", get(list_notifications))
        .route(
            "/api/notifications/mark-all-read",
            put(mark_all_notifications_read),
        )
        .route("/api/notifications/:id/read", put(mark_notification_read))
        .route("/api/notifications/:id", delete(delete_notification))
        .route(websocket_path, get(ws::ws_handler))
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Peers from accepted connections only.
async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    Ok(Json(state.store.peers(caller).await?))
}

/// Full transcript with the pair; flips incoming unread rows as a side
/// effect (the response is the pre-flip snapshot).
async fn fetch_transcript(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(receiver_id): Path<UserId>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    Ok(Json(state.store.transcript(caller, receiver_id).await?))
}

#[derive(Debug, Deserialize)]
struct SendMessageBody {
    text: Option<String>,
    /// Opaque media reference, resolved to a stable URL before persisting.
    image: Option<String>,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(receiver_id): Path<UserId>,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<MessageRecord>), ApiError> {
    let image_url = match body.image {
        Some(blob) => Some(state.media.resolve(&blob).await.map_err(ApiError::Validation)?),
        None => None,
    };

    let record = state
        .store
        .send_message(
            &state.hub,
            caller,
            receiver_id,
            NewMessage {
                text: body.text,
                image_url,
            },
        )
        .await?;

    metrics::record_message(record.status.as_str());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn acknowledge_read(
    State(state): State<Arc<AppState>>,
    Identity(_caller): Identity,
    Path(message_id): Path<Uuid>,
) -> Result<Json<MessageRecord>, ApiError> {
    let record = state.store.mark_message_read(&state.hub, message_id).await?;
    metrics::record_message("read_ack");
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
}

async fn search_messages(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(receiver_id): Path<UserId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let query = params.query.unwrap_or_default();
    Ok(Json(
        state
            .store
            .search_messages(caller, receiver_id, &query)
            .await?,
    ))
}

/// Notifications for the caller, newest first.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
    Ok(Json(state.store.notifications(caller).await?))
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRecord>, ApiError> {
    Ok(Json(state.store.mark_notification_read(caller, id).await?))
}

async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state.store.mark_all_notifications_read(caller).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_notification(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
