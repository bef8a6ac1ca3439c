//! Pure filter layer over a store snapshot.
//!
//! Safe to run on every keystroke or render tick: no side effects,
//! deterministic, O(n) over a small bounded set.

use serde::{Deserialize, Serialize};

use crate::types::{SpotRecord, SpotStatus};

/// Status dimension of the dashboard filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(SpotStatus),
}

impl StatusFilter {
    /// Parse a filter selection case-insensitively.
    ///
    /// Accepts the raw UI strings ("All", "Filter: All", "Free",
    /// "Occupied"); anything unrecognized falls back to `All`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        let selection = trimmed
            .strip_prefix("Filter:")
            .or_else(|| trimmed.strip_prefix("filter:"))
            .unwrap_or(trimmed)
            .trim();

        if selection.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        match SpotStatus::parse(selection) {
            Some(status) => Self::Only(status),
            None => Self::All,
        }
    }
}

/// Transient UI filter state; not persisted anywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotFilter {
    /// Raw spot-id search text; non-numeric text means "no id filter"
    pub id_text: Option<String>,

    /// Status selection
    pub status: StatusFilter,
}

impl SpotFilter {
    /// The effective id filter, if the text parses as an integer.
    fn spot_id(&self) -> Option<i64> {
        self.id_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i64>().ok())
    }
}

/// Apply the id and status filters to a snapshot; conditions AND together.
pub fn filter_spots(records: &[SpotRecord], filter: &SpotFilter) -> Vec<SpotRecord> {
    let id = filter.spot_id();

    records
        .iter()
        .filter(|record| {
            let match_id = id.map_or(true, |wanted| record.spot_id == wanted);
            let match_status = match filter.status {
                StatusFilter::All => true,
                StatusFilter::Only(status) => record.status == status,
            };
            match_id && match_status
        })
        .cloned()
        .collect()
}

/// Spot counts for the dashboard statistics row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OccupancySummary {
    pub total: usize,
    pub free: usize,
    pub occupied: usize,
}

/// Count spots per status over a snapshot.
pub fn occupancy_summary(records: &[SpotRecord]) -> OccupancySummary {
    let mut summary = OccupancySummary {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        match record.status {
            SpotStatus::Free => summary.free += 1,
            SpotStatus::Occupied => summary.occupied += 1,
        }
    }
    summary
}
