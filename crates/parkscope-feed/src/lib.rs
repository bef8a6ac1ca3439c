//! Live push feed for spot state.
//!
//! The feed is a keyed realtime store: on every change it pushes the full
//! current map of spot states, not a diff. This crate connects to it,
//! normalizes each pushed map into per-record store updates, and manages
//! the one-subscription-per-session lifecycle.

pub mod event;
pub mod subscriber;
pub mod ws;

pub use event::{FeedEvent, SpotState};
pub use subscriber::{FeedSubscriber, LiveFeed, Subscription};
pub use ws::WsFeed;
