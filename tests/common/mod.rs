// Shared test helpers: snapshot builders and a scripted fake stats backend.
#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vhostmon::models::*;

pub fn snapshot(vhost: &str, total_requests: u64) -> HostSnapshot {
    HostSnapshot {
        vhost: vhost.into(),
        period_start_utc: "2026-08-08T11:00:00Z".into(),
        period_end_utc: "2026-08-08T12:00:00Z".into(),
        period_start_local: "2026-08-08 13:00:00".into(),
        period_end_local: "2026-08-08 14:00:00".into(),
        total_requests,
        reqs_per_min: total_requests as f64 / 60.0,
        unique_clients: 0,
        status_counts: Default::default(),
        pct_4xx: 0.0,
        pct_5xx: 0.0,
        bytes_sent: 0,
        rt_ms: None,
        upstream_connect_ms: None,
        upstream_header_ms: None,
        upstream_resp_ms: None,
        top_paths: vec![],
        top_methods: vec![],
        top_user_agents: vec![],
        top_referrers: vec![],
        top_client_ips: vec![],
        sample_requests: vec![],
        error_log: ErrorLogCounts::default(),
    }
}

pub fn with_latency(mut s: HostSnapshot, p90: f64, p99: f64) -> HostSnapshot {
    s.rt_ms = Some(LatencyStats {
        p50: p90 / 2.0,
        p90,
        p99,
        avg: p90 / 2.0,
        max: p99,
    });
    s
}

/// What the fake backend answers for one request.
#[derive(Clone)]
pub enum Reply {
    /// 200 with a JSON array of snapshots.
    Ok(Vec<HostSnapshot>),
    /// 200 with a bare snapshot object (backend's single-match form).
    OkSingle(HostSnapshot),
    /// An HTTP error status with no body.
    Status(u16),
    /// 200 with an arbitrary body.
    RawBody(String),
}

#[derive(Clone)]
pub struct Step {
    pub delay_ms: u64,
    pub reply: Reply,
}

impl Step {
    pub fn ok(snapshots: Vec<HostSnapshot>) -> Self {
        Self {
            delay_ms: 0,
            reply: Reply::Ok(snapshots),
        }
    }

    pub fn delayed(delay_ms: u64, reply: Reply) -> Self {
        Self { delay_ms, reply }
    }

    pub fn status(code: u16) -> Self {
        Self {
            delay_ms: 0,
            reply: Reply::Status(code),
        }
    }
}

/// Fake stats backend. Request i executes steps[i] (the last step repeats),
/// so resolution order and failures are fully scripted per test.
#[derive(Clone)]
pub struct FakeBackend {
    pub hits: Arc<AtomicUsize>,
    pub last_query: Arc<Mutex<HashMap<String, String>>>,
    steps: Arc<Vec<Step>>,
}

impl FakeBackend {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.last_query.lock().unwrap().get(key).cloned()
    }
}

/// Serves /stats on an ephemeral port; returns the origin URL and the
/// backend handle for hit/query assertions.
pub async fn spawn_backend(steps: Vec<Step>) -> (String, FakeBackend) {
    assert!(!steps.is_empty(), "fake backend needs at least one step");
    let backend = FakeBackend {
        hits: Arc::new(AtomicUsize::new(0)),
        last_query: Arc::new(Mutex::new(HashMap::new())),
        steps: Arc::new(steps),
    };
    let app = Router::new()
        .route("/stats", get(stats_handler))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), backend)
}

async fn stats_handler(
    State(backend): State<FakeBackend>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let i = backend.hits.fetch_add(1, Ordering::SeqCst);
    *backend.last_query.lock().unwrap() = query;
    let step = backend
        .steps
        .get(i)
        .or(backend.steps.last())
        .cloned()
        .unwrap();
    if step.delay_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(step.delay_ms)).await;
    }
    match step.reply {
        Reply::Ok(snapshots) => Json(snapshots).into_response(),
        Reply::OkSingle(snapshot) => Json(snapshot).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        Reply::RawBody(body) => (
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
    }
}

/// Polls `condition` every 10ms until it holds or a 5s deadline passes.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
}
