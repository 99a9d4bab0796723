// HTTP + WebSocket surface over the poller's view state

use crate::models::HostSnapshot;
use crate::poller::{PollerHandle, ViewState};
use crate::sort::{SortDirection, SortField, SortState, sort_snapshots};
use crate::version;
use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::time::{Duration, timeout};
use tower_http::cors::CorsLayer;

pub fn app(handle: PollerHandle) -> Router {
    Router::new()
        .route("/", get(|| async { "vhostmon: vhost traffic statistics" }))
        .route("/version", get(get_version))
        .route("/view", get(get_view))
        .route("/view/table", get(get_table))
        .route("/config", post(post_config))
        .route("/refresh", post(post_refresh))
        .route("/ws/view", get(ws_view))
        // The dashboard frontend is served from a different origin.
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

/// Ping interval for WebSocket connection health.
const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
/// Max time to wait for a send before treating the client as too slow / dead.
const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

async fn get_version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": version::NAME,
        "version": version::VERSION,
    }))
}

async fn get_view(State(handle): State<PollerHandle>) -> Json<ViewState> {
    Json(handle.view())
}

#[derive(Debug, Deserialize)]
struct TableQuery {
    #[serde(default = "default_sort_field")]
    sort: SortField,
    #[serde(default)]
    dir: SortDirection,
}

fn default_sort_field() -> SortField {
    SortState::default().field
}

/// Sorted tabular projection with the top-N breakdowns cut for display.
async fn get_table(
    State(handle): State<PollerHandle>,
    Query(query): Query<TableQuery>,
) -> Json<Vec<HostSnapshot>> {
    let view = handle.view();
    let mut rows = sort_snapshots(&view.snapshots, query.sort, query.dir);
    for row in &mut rows {
        row.truncate_tops();
    }
    Json(rows)
}

#[derive(Debug, Deserialize)]
struct PollPatch {
    window: Option<crate::models::Window>,
    refresh_secs: Option<u64>,
    filter: Option<String>,
}

/// Partial poll-configuration update; omitted fields are left unchanged.
async fn post_config(
    State(handle): State<PollerHandle>,
    Json(patch): Json<PollPatch>,
) -> StatusCode {
    if let Some(window) = patch.window {
        handle.set_window(window).await;
    }
    if let Some(secs) = patch.refresh_secs {
        handle.set_refresh_secs(secs).await;
    }
    if let Some(filter) = patch.filter {
        handle.set_filter(filter).await;
    }
    StatusCode::NO_CONTENT
}

async fn post_refresh(State(handle): State<PollerHandle>) -> StatusCode {
    handle.refresh_now().await;
    StatusCode::NO_CONTENT
}

async fn ws_view(ws: WebSocketUpgrade, State(handle): State<PollerHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_view(socket, handle).await {
            tracing::info!("View stream error: {}", e);
        }
    })
}

/// Sends the current state on connect, then every adopted state change.
async fn stream_view(mut socket: WebSocket, handle: PollerHandle) -> anyhow::Result<()> {
    tracing::info!("Client connected to view stream");
    let mut rx = handle.subscribe();

    let current = rx.borrow_and_update().clone();
    let json = serde_json::to_string(&current)?;
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                // Err means the poller shut down; close the stream.
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                let json = serde_json::to_string(&state)?;
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
