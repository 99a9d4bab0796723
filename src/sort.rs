// Sortable tabular view over a snapshot collection.
// The sort must be stable: re-sorting tied rows between refreshes must not
// visibly reorder them.

use crate::models::HostSnapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Table column a collection can be ordered by. Serializes to the wire
/// field name (used as the `sort` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Vhost,
    TotalRequests,
    ReqsPerMin,
    Pct4xx,
    Pct5xx,
    P90,
    P99,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Current table ordering. Defaults match the dashboard table's initial
/// state (busiest hosts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortField::TotalRequests,
            direction: SortDirection::Desc,
        }
    }
}

impl SortState {
    /// Clicking the active column flips direction; clicking a new column
    /// selects it descending.
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            let direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
            Self { field, direction }
        } else {
            Self {
                field,
                direction: SortDirection::Desc,
            }
        }
    }
}

/// Returns an ordered copy of the collection; the input is left untouched.
/// Ties on the chosen field fall back to vhost ascending in both
/// directions, and fully tied rows keep their input order.
pub fn sort_snapshots(
    snapshots: &[HostSnapshot],
    field: SortField,
    direction: SortDirection,
) -> Vec<HostSnapshot> {
    let mut rows = snapshots.to_vec();
    rows.sort_by(|a, b| {
        let ord = match direction {
            SortDirection::Asc => compare(a, b, field),
            SortDirection::Desc => compare(b, a, field),
        };
        ord.then_with(|| a.vhost.cmp(&b.vhost))
    });
    rows
}

fn compare(a: &HostSnapshot, b: &HostSnapshot, field: SortField) -> Ordering {
    match field {
        SortField::Vhost => a.vhost.cmp(&b.vhost),
        SortField::TotalRequests => a.total_requests.cmp(&b.total_requests),
        SortField::ReqsPerMin => a.reqs_per_min.total_cmp(&b.reqs_per_min),
        SortField::Pct4xx => a.pct_4xx.total_cmp(&b.pct_4xx),
        SortField::Pct5xx => a.pct_5xx.total_cmp(&b.pct_5xx),
        SortField::P90 => a.p90().total_cmp(&b.p90()),
        SortField::P99 => a.p99().total_cmp(&b.p99()),
    }
}
