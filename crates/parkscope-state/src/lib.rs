//! Authoritative spot state for the Parkscope dashboard.
//!
//! Holds the merged view of parking-spot records fed by the one-shot REST
//! snapshot and the live push feed, and the pure filter layer the map view
//! runs on every render tick.

pub mod query;
pub mod store;
pub mod types;

pub use query::{filter_spots, occupancy_summary, OccupancySummary, SpotFilter, StatusFilter};
pub use store::SpotStore;
pub use types::{datetime_from_millis, ForecastPoint, SpotRecord, SpotStatus};
