//! Session boundary: a bearer-style credential whose presence gates the
//! dashboard. The core does not interpret the token; it only forwards it
//! to the snapshot API and uses its presence/absence to drive the store
//! and live-subscription lifecycle.

use serde::{Deserialize, Serialize};

/// Opaque session credential.
///
/// The token value never appears in `Debug` output so it cannot leak into
/// logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw credential, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let token = SessionToken::new("s3cret");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_expose_round_trips() {
        let token = SessionToken::new("abc123");
        assert_eq!(token.expose(), "abc123");
    }
}
