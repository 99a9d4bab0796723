// Wire types for the reverse-proxy stats backend

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Look-back window for one snapshot request. Serializes to the backend's
/// wire spelling ("15m", "1h", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "15m")]
    Min15,
    #[default]
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "24h")]
    Hour24,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Min15 => "15m",
            Window::Hour1 => "1h",
            Window::Hour6 => "6h",
            Window::Hour24 => "24h",
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request latency percentiles for one vhost, absent when the backend saw
/// no timed requests in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub avg: f64,
    pub max: f64,
}

/// One ranked breakdown entry (path, method, UA, referrer or client IP).
/// The backend ranks these descending by count; we never re-rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopEntry {
    pub key: String,
    pub count: u64,
}

/// Raw access-log sample carried through for drill-down display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub ts: String,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status: u16,
    pub bytes: u64,
    pub referer: String,
    pub ua: String,
    pub rt_ms: f64,
    #[serde(default)]
    pub uct_ms: Option<f64>,
    #[serde(default)]
    pub uht_ms: Option<f64>,
    #[serde(default)]
    pub urt_ms: Option<f64>,
    #[serde(default)]
    pub cf_ray: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogCounts {
    pub error: u64,
    pub warn: u64,
}

/// Window-scoped traffic aggregate for one virtual host, as computed by the
/// stats backend. Field names are the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub vhost: String,
    pub period_start_utc: String,
    pub period_end_utc: String,
    pub period_start_local: String,
    pub period_end_local: String,
    pub total_requests: u64,
    pub reqs_per_min: f64,
    pub unique_clients: u64,
    /// Status code -> count. Values may undercount total_requests when the
    /// backend samples; carried through unvalidated.
    #[serde(default)]
    pub status_counts: BTreeMap<String, u64>,
    pub pct_4xx: f64,
    pub pct_5xx: f64,
    pub bytes_sent: u64,
    #[serde(default)]
    pub rt_ms: Option<LatencyStats>,
    #[serde(default)]
    pub upstream_connect_ms: Option<f64>,
    #[serde(default)]
    pub upstream_header_ms: Option<f64>,
    #[serde(default)]
    pub upstream_resp_ms: Option<f64>,
    #[serde(default)]
    pub top_paths: Vec<TopEntry>,
    #[serde(default)]
    pub top_methods: Vec<TopEntry>,
    #[serde(default)]
    pub top_user_agents: Vec<TopEntry>,
    #[serde(default)]
    pub top_referrers: Vec<TopEntry>,
    #[serde(default)]
    pub top_client_ips: Vec<TopEntry>,
    #[serde(default)]
    pub sample_requests: Vec<SampleRequest>,
    #[serde(default)]
    pub error_log: ErrorLogCounts,
}

/// Number of entries each top-N breakdown is cut to for display.
pub const TOP_DISPLAY_LIMIT: usize = 5;

impl HostSnapshot {
    /// P90 latency, 0 when the backend reported no latency for this host.
    pub fn p90(&self) -> f64 {
        self.rt_ms.as_ref().map_or(0.0, |l| l.p90)
    }

    /// P99 latency, 0 when the backend reported no latency for this host.
    pub fn p99(&self) -> f64 {
        self.rt_ms.as_ref().map_or(0.0, |l| l.p99)
    }

    /// Combined 4xx + 5xx percentage.
    pub fn error_pct(&self) -> f64 {
        self.pct_4xx + self.pct_5xx
    }

    /// Cuts every top-N breakdown to the first TOP_DISPLAY_LIMIT entries.
    /// Backend order (descending by count) is preserved.
    pub fn truncate_tops(&mut self) {
        self.top_paths.truncate(TOP_DISPLAY_LIMIT);
        self.top_methods.truncate(TOP_DISPLAY_LIMIT);
        self.top_user_agents.truncate(TOP_DISPLAY_LIMIT);
        self.top_referrers.truncate(TOP_DISPLAY_LIMIT);
        self.top_client_ips.truncate(TOP_DISPLAY_LIMIT);
    }
}
