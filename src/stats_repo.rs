// Snapshot fetches from the stats backend over HTTP

use crate::models::{HostSnapshot, Window};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One fetch attempt's failure. Retry policy lives in the poller, not here.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level rejection: refused connection, DNS, timeout.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The backend answered outside the 2xx range.
    #[error("backend returned {status} {reason}")]
    Protocol { status: u16, reason: String },
    /// The response body is not the expected snapshot shape.
    #[error("invalid stats payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The backend returns a bare object when exactly one vhost matches.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatsResponse {
    Many(Vec<HostSnapshot>),
    One(Box<HostSnapshot>),
}

pub struct StatsRepo {
    client: reqwest::Client,
    origin: String,
    tail: u64,
}

impl StatsRepo {
    /// `origin` is the backend base URL without a trailing slash
    /// (e.g. "http://127.0.0.1:8080").
    pub fn new(origin: impl Into<String>, tail: u64, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            origin: origin.into(),
            tail,
        })
    }

    /// Fetches the per-vhost snapshots for one window, optionally filtered
    /// server-side by vhost pattern. Single-object responses are normalized
    /// into a one-element collection.
    pub async fn fetch_snapshots(
        &self,
        window: Window,
        filter: &str,
    ) -> Result<Vec<HostSnapshot>, FetchError> {
        let tail = self.tail.to_string();
        let mut request = self
            .client
            .get(format!("{}/stats", self.origin))
            .query(&[("window", window.as_str()), ("tail", tail.as_str())]);
        if !filter.is_empty() {
            request = request.query(&[("vhost", filter)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Protocol {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.text().await?;
        let snapshots = match serde_json::from_str::<StatsResponse>(&body)? {
            StatsResponse::Many(list) => list,
            StatsResponse::One(one) => vec![*one],
        };
        debug!(
            operation = "fetch_snapshots",
            window = %window,
            hosts = snapshots.len(),
            "snapshots fetched"
        );
        Ok(snapshots)
    }
}
