//! Websocket transport for the live feed.
//!
//! Connects, subscribes to the configured path, and forwards parsed
//! events until the shutdown token is cancelled. A lost connection stops
//! delivery for the rest of the session; the next session transition
//! opens a fresh subscription.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;

use crate::event::{parse_frame, FeedEvent};
use crate::subscriber::LiveFeed;

const EVENT_BUFFER: usize = 32;

/// Websocket-backed implementation of the live feed
#[derive(Debug, Clone)]
pub struct WsFeed {
    url: String,
    path: String,
}

impl WsFeed {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

impl LiveFeed for WsFeed {
    fn open(&self, shutdown: CancellationToken) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let url = self.url.clone();
        let path = self.path.clone();

        tokio::spawn(async move {
            run_feed(url, path, tx, shutdown).await;
        });

        rx
    }
}

async fn run_feed(
    url: String,
    path: String,
    tx: mpsc::Sender<FeedEvent>,
    shutdown: CancellationToken,
) {
    tracing::info!("Connecting to live feed: {}", url);

    let connect = tokio::select! {
        _ = shutdown.cancelled() => return,
        connect = connect_async(url.as_str()) => connect,
    };

    let ws_stream = match connect {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::warn!("Live feed connection failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::json!({
        "type": "subscribe",
        "path": path,
    });
    if let Err(e) = write.send(Message::text(subscribe.to_string())).await {
        tracing::warn!("Failed to subscribe to live feed: {}", e);
        return;
    }
    tracing::info!("Subscribed to live feed path '{}'", path);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                tracing::debug!("Live feed connection closed by session");
                break;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(text.as_str(), &path) {
                            Ok(Some(event)) => {
                                if tx.send(event).await.is_err() {
                                    // Receiver gone; the subscription was dropped.
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!("Dropping feed frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        tracing::warn!("Live feed closed by remote: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Live feed read error: {}", e);
                        break;
                    }
                    None => {
                        tracing::warn!("Live feed stream ended");
                        break;
                    }
                }
            }
        }
    }
}
