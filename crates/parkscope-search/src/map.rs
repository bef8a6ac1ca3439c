//! Command interface to the map surface.
//!
//! The core does not own the map's render loop; it only issues view and
//! marker commands to it. Markers are referenced through opaque handles so
//! ownership stays with the component that placed them.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// What a marker represents, so the surface can pick an icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// A found location
    Location,
    /// "No results" indicator
    NoResults,
    /// Lookup failure indicator
    Error,
}

/// Everything the surface needs to place one marker
#[derive(Debug, Clone)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub title: String,
    pub popup: String,
    pub kind: MarkerKind,
}

/// Opaque ownership token for a placed marker.
///
/// Only the component that received the handle may remove the marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Commands the core issues to the map.
pub trait MapSurface: Send + Sync + 'static {
    /// Recenter and zoom the view.
    fn set_view(&self, center: LatLng, zoom: u8);

    /// Place a marker and return its ownership handle.
    fn add_marker(&self, spec: MarkerSpec) -> MarkerHandle;

    /// Remove a previously placed marker.
    fn remove_marker(&self, handle: &MarkerHandle);

    /// Open the popup attached to a marker.
    fn open_popup(&self, handle: &MarkerHandle);

    /// Current view center, used to anchor indicator markers.
    fn center(&self) -> LatLng;
}

/// Headless map surface that logs every command.
///
/// Stands in for a real map widget when the core runs without a UI.
#[derive(Debug)]
pub struct ConsoleMap {
    next_id: AtomicU64,
    view: Mutex<(LatLng, u8)>,
}

impl ConsoleMap {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            view: Mutex::new((center, zoom)),
        }
    }
}

impl MapSurface for ConsoleMap {
    fn set_view(&self, center: LatLng, zoom: u8) {
        *self.view.lock() = (center, zoom);
        tracing::info!(
            "map: set view to ({:.5}, {:.5}) zoom {}",
            center.lat,
            center.lng,
            zoom
        );
    }

    fn add_marker(&self, spec: MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(
            "map: add {:?} marker #{} at ({:.5}, {:.5}): {}",
            spec.kind,
            handle.id(),
            spec.position.lat,
            spec.position.lng,
            spec.title
        );
        handle
    }

    fn remove_marker(&self, handle: &MarkerHandle) {
        tracing::info!("map: remove marker #{}", handle.id());
    }

    fn open_popup(&self, handle: &MarkerHandle) {
        tracing::info!("map: open popup for marker #{}", handle.id());
    }

    fn center(&self) -> LatLng {
        self.view.lock().0
    }
}
