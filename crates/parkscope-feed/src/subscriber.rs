//! Subscription lifecycle and event normalization.
//!
//! The feed pushes one event containing many records; the store's mutation
//! contract is per-record. The subscriber decomposes each event into
//! individual `apply_partial` calls, in the order events arrive, and
//! guarantees at most one live subscription per session.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use parkscope_state::store::SpotStore;
use parkscope_state::types::{datetime_from_millis, SpotStatus};

use crate::event::FeedEvent;

/// A source of pushed spot-state events.
///
/// Implementations deliver events on the returned channel until the
/// shutdown token is cancelled or the source ends.
pub trait LiveFeed: Send + Sync + 'static {
    fn open(&self, shutdown: CancellationToken) -> mpsc::Receiver<FeedEvent>;
}

/// Handle to an active feed subscription.
///
/// Cancelling stops delivery; cancelling twice is safe. Dropping the
/// handle cancels it, so a discarded session cannot leak delivery.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Manages the single live subscription of a dashboard session.
pub struct FeedSubscriber<F: LiveFeed> {
    feed: Arc<F>,
    active: Mutex<Option<CancellationToken>>,
}

impl<F: LiveFeed> FeedSubscriber<F> {
    pub fn new(feed: F) -> Self {
        Self {
            feed: Arc::new(feed),
            active: Mutex::new(None),
        }
    }

    /// Open a subscription that writes into the given store.
    ///
    /// If a subscription is already active it is released first; exactly
    /// one is live at any time.
    pub fn subscribe(&self, store: Arc<SpotStore>) -> Subscription {
        let token = {
            let mut active = self.active.lock();
            if let Some(old) = active.take() {
                tracing::debug!("Releasing previous live subscription");
                old.cancel();
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };

        let mut events = self.feed.open(token.child_token());
        let task_token = token.clone();

        tokio::spawn(async move {
            loop {
                // Cancellation wins over buffered events: a released
                // subscription must not apply anything further.
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => apply_event(&store, event),
                        None => {
                            tracing::warn!(
                                "Live feed delivery ended; store holds the last known state"
                            );
                            break;
                        }
                    }
                }
            }
        });

        Subscription { token }
    }
}

/// Decompose one full-map event into per-record store updates.
///
/// Entries whose id does not parse as an integer or whose status is
/// unrecognized are dropped individually; the rest of the event still
/// applies.
fn apply_event(store: &SpotStore, event: FeedEvent) {
    for (id_text, state) in event {
        let spot_id = match id_text.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!("Dropping feed entry with non-numeric id {:?}", id_text);
                continue;
            }
        };
        let status = match SpotStatus::parse(&state.status) {
            Some(status) => status,
            None => {
                tracing::warn!(
                    "Dropping feed entry for spot {}: unrecognized status {:?}",
                    spot_id,
                    state.status
                );
                continue;
            }
        };
        let updated_at = match datetime_from_millis(state.timestamp) {
            Some(dt) => dt,
            None => {
                tracing::warn!(
                    "Dropping feed entry for spot {}: unrepresentable timestamp {}",
                    spot_id,
                    state.timestamp
                );
                continue;
            }
        };
        store.apply_partial(spot_id, status, updated_at);
    }
}
