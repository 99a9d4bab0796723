// Cross-host rollup: pure aggregation over one snapshot collection.

use crate::models::HostSnapshot;
use serde::{Deserialize, Serialize};

/// Derived summary across all vhosts in the current collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub hosts: usize,
    pub total_requests: u64,
    pub unique_clients: u64,
    /// Mean P90 latency over hosts that report latency; 0 when none do.
    pub avg_p90_ms: f64,
    /// Mean combined 4xx+5xx percentage over all hosts; 0 when empty.
    pub error_rate_pct: f64,
}

/// Recomputed from scratch on every adopted snapshot collection; holds no
/// state across calls.
pub fn compute(snapshots: &[HostSnapshot]) -> Rollup {
    let total_requests = snapshots.iter().map(|s| s.total_requests).sum();
    let unique_clients = snapshots.iter().map(|s| s.unique_clients).sum();

    let p90s: Vec<f64> = snapshots
        .iter()
        .filter_map(|s| s.rt_ms.as_ref().map(|l| l.p90))
        .collect();
    let avg_p90_ms = mean(&p90s);

    let error_pcts: Vec<f64> = snapshots.iter().map(|s| s.error_pct()).collect();
    let error_rate_pct = mean(&error_pcts);

    Rollup {
        hosts: snapshots.len(),
        total_requests,
        unique_clients,
        avg_p90_ms,
        error_rate_pct,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
