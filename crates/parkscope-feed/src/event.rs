use std::collections::HashMap;

use serde::Deserialize;

use parkscope_core::error::FeedError;

/// Per-spot state as pushed by the feed; raw strings so one bad entry can
/// be dropped without rejecting its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpotState {
    pub status: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

/// One change event: the full map of spot states keyed by spot id.
pub type FeedEvent = HashMap<String, SpotState>;

/// Wire frame wrapping an event with the path it belongs to
#[derive(Debug, Deserialize)]
struct FeedFrame {
    path: String,
    data: FeedEvent,
}

/// Parse a raw text frame into a feed event.
///
/// Frames for other paths yield `Ok(None)`; undecodable frames are a
/// `MalformedFrame` the reader logs and skips.
pub fn parse_frame(raw: &str, path: &str) -> Result<Option<FeedEvent>, FeedError> {
    let frame: FeedFrame =
        serde_json::from_str(raw).map_err(|e| FeedError::MalformedFrame(e.to_string()))?;

    if frame.path != path {
        return Ok(None);
    }
    Ok(Some(frame.data))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_parse_frame_full_map() {
        let raw = r#"{"path":"spots","data":{"3":{"status":"free","timestamp":100},"5":{"status":"occupied","timestamp":95}}}"#;
        let event = parse_frame(raw, "spots").unwrap().unwrap();

        assert_eq!(event.len(), 2);
        assert_eq!(event["3"].status, "free");
        assert_eq!(event["5"].timestamp, 95);
    }

    #[test]
    fn test_parse_frame_other_path_is_ignored() {
        let raw = r#"{"path":"sensors","data":{}}"#;
        assert!(parse_frame(raw, "spots").unwrap().is_none());
    }

    #[test]
    fn test_parse_frame_rejects_garbage() {
        assert!(matches!(
            parse_frame("not json", "spots"),
            Err(FeedError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_parse_frame_rejects_wrong_shape() {
        let raw = r#"{"path":"spots","data":[1,2,3]}"#;
        assert!(matches!(
            parse_frame(raw, "spots"),
            Err(FeedError::MalformedFrame(_))
        ));
    }
}
