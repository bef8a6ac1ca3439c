//! The search controller state machine.
//!
//! Debounces free-text input, issues geocoding lookups, reconciles
//! out-of-order responses with a monotonic sequence-number guard, and owns
//! the suggestion list and every marker it places. States:
//! Idle → Typing → (SuggestionsShown | Idle) → Confirmed → Idle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use parkscope_core::config::SearchConfig;

use crate::geocode::{GeocodeProvider, SearchResult};
use crate::map::{LatLng, MapSurface, MarkerHandle, MarkerKind, MarkerSpec};

/// Where the controller currently is in its per-session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// No pending query, no suggestions; confirmed markers may exist
    Idle,
    /// Input above the threshold, debounce timer running
    Typing,
    /// A preview lookup populated the suggestion list
    SuggestionsShown,
    /// A confirmed search placed its marker; visually Idle plus markers
    Confirmed,
}

struct SearchState {
    phase: SearchPhase,
    /// Highest sequence number whose response has been applied
    latest_applied: u64,
    suggestions: Vec<SearchResult>,
    /// Markers this controller placed; nothing else may remove them
    markers: Vec<MarkerHandle>,
    /// Cancellation token of the currently scheduled debounce, if any
    pending: Option<CancellationToken>,
}

struct Inner<P, M: MapSurface> {
    provider: P,
    map: M,
    config: SearchConfig,
    seq: AtomicU64,
    state: Mutex<SearchState>,
}

impl<P, M: MapSurface> Inner<P, M> {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Remove every owned marker. Called with the state lock held.
    fn clear_markers(&self, state: &mut SearchState) {
        for handle in state.markers.drain(..) {
            self.map.remove_marker(&handle);
        }
    }
}

impl<P, M: MapSurface> Drop for Inner<P, M> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        for handle in state.markers.drain(..) {
            self.map.remove_marker(&handle);
        }
    }
}

/// Drives the interactive location search for one dashboard session.
pub struct SearchController<P: GeocodeProvider, M: MapSurface> {
    inner: Arc<Inner<P, M>>,
}

impl<P: GeocodeProvider, M: MapSurface> SearchController<P, M> {
    pub fn new(provider: P, map: M, config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                map,
                config,
                seq: AtomicU64::new(0),
                state: Mutex::new(SearchState {
                    phase: SearchPhase::Idle,
                    latest_applied: 0,
                    suggestions: Vec::new(),
                    markers: Vec::new(),
                    pending: None,
                }),
            }),
        }
    }

    /// React to a keystroke in the search box.
    ///
    /// Cancels any previously scheduled lookup for this input stream; only
    /// the most recent keystroke's lookup may fire, after the debounce
    /// interval. Input below the minimum length clears the suggestions.
    pub fn on_input(&self, text: &str) {
        let query = text.trim().to_string();
        let mut state = self.inner.state.lock();

        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }

        if query.chars().count() < self.inner.config.min_query_len {
            state.suggestions.clear();
            state.phase = SearchPhase::Idle;
            return;
        }

        state.phase = SearchPhase::Typing;
        let token = CancellationToken::new();
        state.pending = Some(token.clone());
        drop(state);

        let inner = Arc::clone(&self.inner);
        let debounce = Duration::from_millis(inner.config.debounce_ms);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    let seq = {
                        let mut state = inner.state.lock();
                        // A cancel between wake-up and lock acquisition
                        // means a newer keystroke superseded this one.
                        if token.is_cancelled() {
                            return;
                        }
                        state.pending = None;
                        inner.next_seq()
                    };
                    run_preview(inner, query, seq).await;
                }
            }
        });
    }

    /// Run a confirmed search: the user selected a suggestion, pressed the
    /// confirm action, or submitted the raw text.
    ///
    /// Clears all owned markers before placing the new one (markers never
    /// accumulate across confirmed searches), recenters on the top result
    /// and opens its popup. Empty results and provider failures place an
    /// indicator marker at the current center without recentering.
    pub async fn confirm(&self, query: &str) {
        let query = query.trim().to_string();
        if query.is_empty() {
            return;
        }

        let seq = {
            let mut state = self.inner.state.lock();
            if let Some(pending) = state.pending.take() {
                pending.cancel();
            }
            self.inner.next_seq()
        };

        tracing::debug!("Confirmed lookup #{} for {:?}", seq, query);
        let result = self.inner.provider.search(&query).await;

        let mut state = self.inner.state.lock();
        if seq <= state.latest_applied {
            tracing::debug!("Discarding stale confirmed response #{}", seq);
            return;
        }
        state.latest_applied = seq;
        state.suggestions.clear();
        self.inner.clear_markers(&mut state);

        match result {
            Ok(results) if !results.is_empty() => {
                let top = &results[0];
                let position = LatLng::new(top.lat, top.lon);
                let handle = self.inner.map.add_marker(MarkerSpec {
                    position,
                    title: top.label.clone(),
                    popup: format!(
                        "{}\n{}",
                        top.label,
                        top.category.as_deref().unwrap_or("Location")
                    ),
                    kind: MarkerKind::Location,
                });
                self.inner.map.set_view(position, self.inner.config.confirm_zoom);
                self.inner.map.open_popup(&handle);
                state.markers.push(handle);
            }
            Ok(_) => {
                tracing::debug!("Confirmed lookup #{} found nothing", seq);
                let message = format!("No results for \"{}\"", query);
                let handle = self.inner.map.add_marker(MarkerSpec {
                    position: self.inner.map.center(),
                    title: message.clone(),
                    popup: message,
                    kind: MarkerKind::NoResults,
                });
                state.markers.push(handle);
            }
            Err(e) => {
                tracing::warn!("Confirmed lookup #{} failed: {}", seq, e);
                let handle = self.inner.map.add_marker(MarkerSpec {
                    position: self.inner.map.center(),
                    title: "Search failed".to_string(),
                    popup: e.user_message().to_string(),
                    kind: MarkerKind::Error,
                });
                state.markers.push(handle);
            }
        }
        state.phase = SearchPhase::Confirmed;
    }

    /// Promote the suggestion at `index` into a confirmed search.
    pub async fn select_suggestion(&self, index: usize) {
        let label = {
            let state = self.inner.state.lock();
            state.suggestions.get(index).map(|s| s.label.clone())
        };
        if let Some(label) = label {
            self.confirm(&label).await;
        }
    }

    /// Current suggestion list, newest applied response first-to-last.
    pub fn suggestions(&self) -> Vec<SearchResult> {
        self.inner.state.lock().suggestions.clone()
    }

    pub fn phase(&self) -> SearchPhase {
        self.inner.state.lock().phase
    }

    /// Number of markers this controller currently owns.
    pub fn marker_count(&self) -> usize {
        self.inner.state.lock().markers.len()
    }

    /// Whether a debounced lookup is scheduled but has not fired yet.
    pub fn has_pending_lookup(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Release everything this controller owns: the pending debounce
    /// timer and every placed marker. Nothing survives past teardown.
    pub fn teardown(&self) {
        let mut state = self.inner.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        self.inner.clear_markers(&mut state);
        state.suggestions.clear();
        state.phase = SearchPhase::Idle;
    }
}

/// Apply a preview lookup's outcome to the suggestion list.
///
/// Only the highest sequence number seen so far may render; older, slower
/// responses arriving later are discarded so the displayed suggestions
/// never regress. Preview failures clear the list silently.
async fn run_preview<P: GeocodeProvider, M: MapSurface>(
    inner: Arc<Inner<P, M>>,
    query: String,
    seq: u64,
) {
    tracing::debug!("Preview lookup #{} for {:?}", seq, query);
    let result = inner.provider.search(&query).await;

    let mut state = inner.state.lock();
    if seq <= state.latest_applied {
        tracing::debug!("Discarding stale preview response #{}", seq);
        return;
    }
    state.latest_applied = seq;

    match result {
        Ok(mut results) => {
            results.truncate(inner.config.suggestion_limit);
            state.phase = if results.is_empty() {
                SearchPhase::Idle
            } else {
                SearchPhase::SuggestionsShown
            };
            state.suggestions = results;
        }
        Err(e) => {
            tracing::debug!("Preview lookup #{} failed: {}", seq, e);
            state.suggestions.clear();
            state.phase = SearchPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use parkscope_core::error::NetworkError;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    // --- test doubles -----------------------------------------------------

    /// Provider that records queries and answers immediately.
    struct RecordingProvider {
        queries: Mutex<Vec<String>>,
        results: Vec<SearchResult>,
    }

    impl RecordingProvider {
        fn with_results(results: Vec<SearchResult>) -> Arc<Self> {
            Arc::new(Self {
                queries: Mutex::new(Vec::new()),
                results,
            })
        }
    }

    impl GeocodeProvider for Arc<RecordingProvider> {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, NetworkError> {
            self.queries.lock().push(query.to_string());
            Ok(self.results.clone())
        }
    }

    /// Provider that always fails.
    struct FailingProvider;

    impl GeocodeProvider for Arc<FailingProvider> {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, NetworkError> {
            Err(NetworkError::Timeout)
        }
    }

    /// Provider whose responses are released by the test, in any order.
    struct GatedProvider {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<Vec<SearchResult>, NetworkError>>>>,
    }

    impl GatedProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gates: Mutex::new(HashMap::new()),
            })
        }

        fn gate(&self, query: &str) -> oneshot::Sender<Result<Vec<SearchResult>, NetworkError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(query.to_string(), rx);
            tx
        }
    }

    impl GeocodeProvider for Arc<GatedProvider> {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, NetworkError> {
            let rx = self
                .gates
                .lock()
                .remove(query)
                .unwrap_or_else(|| panic!("no gate registered for {:?}", query));
            rx.await.unwrap_or(Err(NetworkError::Timeout))
        }
    }

    /// Map surface that records every command.
    #[derive(Default)]
    struct MapLog {
        added: Vec<(u64, MarkerKind)>,
        removed: Vec<u64>,
        views: Vec<(LatLng, u8)>,
        popups: Vec<u64>,
    }

    struct RecordingMap {
        next_id: AtomicU64,
        center: Mutex<LatLng>,
        log: Mutex<MapLog>,
    }

    impl RecordingMap {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicU64::new(1),
                center: Mutex::new(LatLng::new(51.505, -0.09)),
                log: Mutex::new(MapLog::default()),
            })
        }

        fn live_markers(&self) -> Vec<u64> {
            let log = self.log.lock();
            log.added
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| !log.removed.contains(id))
                .collect()
        }
    }

    impl MapSurface for Arc<RecordingMap> {
        fn set_view(&self, center: LatLng, zoom: u8) {
            *self.center.lock() = center;
            self.log.lock().views.push((center, zoom));
        }

        fn add_marker(&self, spec: MarkerSpec) -> MarkerHandle {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.log.lock().added.push((id, spec.kind));
            MarkerHandle::new(id)
        }

        fn remove_marker(&self, handle: &MarkerHandle) {
            self.log.lock().removed.push(handle.id());
        }

        fn open_popup(&self, handle: &MarkerHandle) {
            self.log.lock().popups.push(handle.id());
        }

        fn center(&self) -> LatLng {
            *self.center.lock()
        }
    }

    // --- helpers ----------------------------------------------------------

    fn result(label: &str, lat: f64, lon: f64) -> SearchResult {
        SearchResult {
            label: label.to_string(),
            lat,
            lon,
            category: Some("city".to_string()),
        }
    }

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    /// Let spawned lookup tasks run to completion.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Advance past the debounce interval so the latest lookup fires.
    async fn past_debounce() {
        tokio::time::sleep(Duration::from_millis(400)).await;
        settle().await;
    }

    // --- debounce ---------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_short_input_does_not_schedule_lookup() {
        let provider = RecordingProvider::with_results(vec![result("x", 1.0, 2.0)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map, config());

        controller.on_input("ab");
        past_debounce().await;

        assert!(provider.queries.lock().is_empty());
        assert_eq!(controller.phase(), SearchPhase::Idle);
        assert!(!controller.has_pending_lookup());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_clears_existing_suggestions() {
        let provider = RecordingProvider::with_results(vec![result("x", 1.0, 2.0)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map, config());

        controller.on_input("copenhagen");
        past_debounce().await;
        assert!(!controller.suggestions().is_empty());

        controller.on_input("co");
        assert!(controller.suggestions().is_empty());
        assert_eq!(controller.phase(), SearchPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_keystroke_fires() {
        let provider = RecordingProvider::with_results(vec![result("x", 1.0, 2.0)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map, config());

        controller.on_input("central");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.on_input("central park");
        past_debounce().await;

        assert_eq!(*provider.queries.lock(), vec!["central park".to_string()]);
        assert_eq!(controller.phase(), SearchPhase::SuggestionsShown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggestions_truncated_to_limit() {
        let many: Vec<SearchResult> =
            (0..10).map(|i| result(&format!("place {}", i), 1.0, 2.0)).collect();
        let provider = RecordingProvider::with_results(many);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider, map, config());

        controller.on_input("place");
        past_debounce().await;

        assert_eq!(controller.suggestions().len(), config().suggestion_limit);
    }

    // --- sequence guard ---------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_responses_never_regress() {
        let provider = GatedProvider::new();
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map, config());

        let gate1 = provider.gate("query one");
        let gate2 = provider.gate("query two");
        let gate3 = provider.gate("query three");

        controller.on_input("query one");
        past_debounce().await;
        controller.on_input("query two");
        past_debounce().await;
        controller.on_input("query three");
        past_debounce().await;

        // Responses arrive in order [3, 1, 2].
        gate3.send(Ok(vec![result("third", 3.0, 3.0)])).unwrap();
        settle().await;
        assert_eq!(controller.suggestions(), vec![result("third", 3.0, 3.0)]);

        gate1.send(Ok(vec![result("first", 1.0, 1.0)])).unwrap();
        settle().await;
        assert_eq!(controller.suggestions(), vec![result("third", 3.0, 3.0)]);

        gate2.send(Ok(vec![result("second", 2.0, 2.0)])).unwrap();
        settle().await;
        assert_eq!(controller.suggestions(), vec![result("third", 3.0, 3.0)]);
        assert_eq!(controller.phase(), SearchPhase::SuggestionsShown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_preview_cannot_repaint_after_confirm() {
        let provider = GatedProvider::new();
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map.clone(), config());

        let preview_gate = provider.gate("copenh");
        let confirm_gate = provider.gate("copenhagen");
        confirm_gate
            .send(Ok(vec![result("Copenhagen", 55.67, 12.56)]))
            .unwrap();

        controller.on_input("copenh");
        past_debounce().await;

        controller.confirm("copenhagen").await;
        assert_eq!(controller.phase(), SearchPhase::Confirmed);
        assert_eq!(map.live_markers().len(), 1);

        // The slow preview response lands after the confirm: discarded.
        preview_gate.send(Ok(vec![result("stale", 0.0, 0.0)])).unwrap();
        settle().await;

        assert!(controller.suggestions().is_empty());
        assert_eq!(controller.phase(), SearchPhase::Confirmed);
    }

    // --- confirmed searches -----------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_confirm_places_marker_recenters_and_opens_popup() {
        let provider =
            RecordingProvider::with_results(vec![result("Copenhagen", 55.67, 12.56)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider, map.clone(), config());

        controller.confirm("copenhagen").await;

        let log = map.log.lock();
        assert_eq!(log.added.len(), 1);
        assert_eq!(log.added[0].1, MarkerKind::Location);
        assert_eq!(log.views.len(), 1);
        assert_eq!(log.views[0].0, LatLng::new(55.67, 12.56));
        assert_eq!(log.views[0].1, config().confirm_zoom);
        assert_eq!(log.popups.len(), 1);
        drop(log);
        assert_eq!(controller.phase(), SearchPhase::Confirmed);
        assert_eq!(controller.marker_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_replaces_previous_marker() {
        let provider =
            RecordingProvider::with_results(vec![result("Copenhagen", 55.67, 12.56)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider, map.clone(), config());

        controller.confirm("first search").await;
        controller.confirm("second search").await;

        // Old marker removed, new one added: never two confirmed markers.
        assert_eq!(map.live_markers().len(), 1);
        assert_eq!(controller.marker_count(), 1);
        assert_eq!(map.log.lock().removed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_empty_results_places_indicator_without_recenter() {
        let provider = RecordingProvider::with_results(Vec::new());
        let map = RecordingMap::new();
        let controller = SearchController::new(provider, map.clone(), config());

        controller.confirm("nowhere").await;

        let log = map.log.lock();
        assert_eq!(log.added.len(), 1);
        assert_eq!(log.added[0].1, MarkerKind::NoResults);
        assert!(log.views.is_empty());
        assert!(log.popups.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_error_places_error_marker_at_center() {
        let map = RecordingMap::new();
        let controller =
            SearchController::new(Arc::new(FailingProvider), map.clone(), config());

        controller.confirm("somewhere").await;

        let log = map.log.lock();
        assert_eq!(log.added.len(), 1);
        assert_eq!(log.added[0].1, MarkerKind::Error);
        assert!(log.views.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_error_clears_suggestions_silently() {
        let map = RecordingMap::new();
        let controller =
            SearchController::new(Arc::new(FailingProvider), map.clone(), config());

        controller.on_input("somewhere");
        past_debounce().await;

        assert!(controller.suggestions().is_empty());
        assert_eq!(controller.phase(), SearchPhase::Idle);
        // Preview failures never surface on the map.
        assert!(map.log.lock().added.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_suggestion_confirms_by_label() {
        let provider =
            RecordingProvider::with_results(vec![result("Central Park", 40.78, -73.96)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map.clone(), config());

        controller.on_input("central");
        past_debounce().await;
        assert!(!controller.suggestions().is_empty());

        controller.select_suggestion(0).await;

        assert!(provider.queries.lock().contains(&"Central Park".to_string()));
        assert_eq!(map.live_markers().len(), 1);
        assert_eq!(controller.phase(), SearchPhase::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_out_of_range_suggestion_is_a_no_op() {
        let provider = RecordingProvider::with_results(Vec::new());
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map.clone(), config());

        controller.select_suggestion(3).await;

        assert!(provider.queries.lock().is_empty());
        assert!(map.live_markers().is_empty());
    }

    // --- teardown ---------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timer_and_removes_markers() {
        let provider =
            RecordingProvider::with_results(vec![result("Copenhagen", 55.67, 12.56)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider.clone(), map.clone(), config());

        controller.confirm("copenhagen").await;
        assert_eq!(map.live_markers().len(), 1);

        controller.on_input("next query");
        assert!(controller.has_pending_lookup());

        controller.teardown();

        assert!(!controller.has_pending_lookup());
        assert!(map.live_markers().is_empty());
        assert_eq!(controller.marker_count(), 0);

        // The cancelled timer must never fire.
        let queries_before = provider.queries.lock().len();
        past_debounce().await;
        assert_eq!(provider.queries.lock().len(), queries_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_removes_owned_markers() {
        let provider =
            RecordingProvider::with_results(vec![result("Copenhagen", 55.67, 12.56)]);
        let map = RecordingMap::new();
        let controller = SearchController::new(provider, map.clone(), config());

        controller.confirm("copenhagen").await;
        assert_eq!(map.live_markers().len(), 1);

        drop(controller);
        settle().await;

        assert!(map.live_markers().is_empty());
    }
}
