use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Occupancy state of a single parking spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    Free,
    Occupied,
}

impl SpotStatus {
    /// Parse a status string case-insensitively.
    ///
    /// Both sources deliver status as free text; anything other than
    /// "free"/"occupied" is rejected so a bad record can be dropped without
    /// disturbing the rest of the batch.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "occupied" => Some(Self::Occupied),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parking spot as seen by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    pub spot_id: i64,
    pub status: SpotStatus,
    pub updated_at: DateTime<Utc>,
}

impl SpotRecord {
    pub fn new(spot_id: i64, status: SpotStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            spot_id,
            status,
            updated_at,
        }
    }
}

/// Predicted number of occupied spots one hour ahead
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub predicted_occupied: f64,
}

/// Convert a Unix millisecond timestamp into a UTC datetime.
///
/// Both upstream sources report `timestamp` as epoch milliseconds; values
/// outside chrono's representable range yield `None` so the caller can drop
/// the record.
pub fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
