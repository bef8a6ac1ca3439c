//! Interactive location search for the map dashboard.
//!
//! Queries are issued as the user types; responses arrive out of order and
//! a stale response must never overwrite a newer one. The controller
//! enforces that with a monotonic sequence-number guard, debounces input,
//! and owns the lifecycle of every marker it places.

pub mod controller;
pub mod geocode;
pub mod map;

pub use controller::{SearchController, SearchPhase};
pub use geocode::{GeocodeProvider, NominatimProvider, SearchResult};
pub use map::{ConsoleMap, LatLng, MapSurface, MarkerHandle, MarkerKind, MarkerSpec};
