use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use parkscope_api::SnapshotClient;
use parkscope_core::config::Config;
use parkscope_core::session::SessionToken;
use parkscope_feed::{FeedSubscriber, LiveFeed, Subscription};
use parkscope_search::{LatLng, MarkerKind, MarkerSpec};
use parkscope_state::query::{
    filter_spots, occupancy_summary, OccupancySummary, SpotFilter,
};
use parkscope_state::store::SpotStore;
use parkscope_state::types::{ForecastPoint, SpotRecord};

/// Owns all per-session dashboard state.
///
/// `set_token` drives the whole lifecycle: a none→some transition creates
/// the store, performs the one-shot snapshot pulls and opens the single
/// live subscription; a some→none transition cancels the subscription and
/// discards the store. Every failure along the way degrades to "last
/// known state" instead of tearing the dashboard down.
pub struct DashboardSession<F: LiveFeed> {
    config: Arc<Config>,
    api: SnapshotClient,
    subscriber: FeedSubscriber<F>,
    token: RwLock<Option<SessionToken>>,
    store: RwLock<Option<Arc<SpotStore>>>,
    forecast: RwLock<Option<ForecastPoint>>,
    filter: RwLock<SpotFilter>,
    subscription: Mutex<Option<Subscription>>,
}

impl<F: LiveFeed> DashboardSession<F> {
    pub fn new(config: Arc<Config>, api: SnapshotClient, feed: F) -> Self {
        Self {
            config,
            api,
            subscriber: FeedSubscriber::new(feed),
            token: RwLock::new(None),
            store: RwLock::new(None),
            forecast: RwLock::new(None),
            filter: RwLock::new(SpotFilter::default()),
            subscription: Mutex::new(None),
        }
    }

    /// Apply a session-token transition.
    ///
    /// Calling with the current token is a no-op, so render loops can
    /// pass the token through without resubscribing.
    pub async fn set_token(&self, token: Option<SessionToken>) {
        if *self.token.read() == token {
            return;
        }

        self.end_session();
        *self.token.write() = token.clone();

        let Some(token) = token else {
            tracing::info!("Session ended; store discarded");
            return;
        };

        tracing::info!("Session started; bringing dashboard state up");
        let store = Arc::new(SpotStore::new());
        *self.store.write() = Some(Arc::clone(&store));

        // One-shot snapshot pulls. A failure is logged and otherwise
        // ignored: the dashboard keeps whatever it has instead of
        // clearing it.
        match self.api.fetch_spots(&token).await {
            Ok(records) => store.replace_all(records),
            Err(e) => tracing::warn!("Spot snapshot failed: {}", e),
        }
        match self.api.fetch_forecast(&token).await {
            Ok(point) => *self.forecast.write() = Some(point),
            Err(e) => tracing::warn!("Forecast fetch failed: {}", e),
        }

        // Single live subscription, bound to this session's store.
        let subscription = self.subscriber.subscribe(store);
        *self.subscription.lock() = Some(subscription);
    }

    /// Cancel the live subscription and discard per-session state.
    fn end_session(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }
        *self.store.write() = None;
        *self.forecast.write() = None;
    }

    /// End the session and release everything it owns.
    pub async fn shutdown(&self) {
        self.set_token(None).await;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// The session's store, while a session is active.
    pub fn store(&self) -> Option<Arc<SpotStore>> {
        self.store.read().clone()
    }

    /// Revision channel of the active store, for render loops.
    pub fn watch_revision(&self) -> Option<tokio::sync::watch::Receiver<u64>> {
        self.store.read().as_ref().map(|s| s.watch_revision())
    }

    pub fn set_filter(&self, filter: SpotFilter) {
        *self.filter.write() = filter;
    }

    pub fn filter(&self) -> SpotFilter {
        self.filter.read().clone()
    }

    /// The displayed subset: current snapshot through the id/status filter.
    pub fn visible_spots(&self) -> Vec<SpotRecord> {
        let Some(store) = self.store() else {
            return Vec::new();
        };
        filter_spots(&store.snapshot(), &self.filter.read())
    }

    /// Statistics over the unfiltered snapshot.
    pub fn occupancy(&self) -> OccupancySummary {
        match self.store() {
            Some(store) => occupancy_summary(&store.snapshot()),
            None => OccupancySummary::default(),
        }
    }

    pub fn forecast(&self) -> Option<ForecastPoint> {
        *self.forecast.read()
    }

    /// Where spot `n` sits on the map: the configured origin offset by
    /// `n * spot_offset` on both axes.
    pub fn spot_position(&self, spot_id: i64) -> LatLng {
        let map = &self.config.map;
        LatLng::new(
            map.center_lat + spot_id as f64 * map.spot_offset,
            map.center_lon + spot_id as f64 * map.spot_offset,
        )
    }

    /// Marker description for one visible spot.
    pub fn spot_marker(&self, record: &SpotRecord) -> MarkerSpec {
        MarkerSpec {
            position: self.spot_position(record.spot_id),
            title: format!("Spot {}", record.spot_id),
            popup: format!(
                "Spot {}: {}\nLast updated: {}",
                record.spot_id,
                record.status,
                record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            kind: MarkerKind::Location,
        }
    }
}
