//! Window entries — the unit of counter state for one identifier+endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::EndpointCategory;

/// Sentinel identifier substituted for empty input so the limiter stays
/// non-blocking for callers that failed to resolve a client identity.
pub(crate) const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Composite key a counter is tracked under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// Caller-supplied opaque identity (IP hash, user id, API key id).
    pub identifier: String,
    /// Endpoint category the quota applies to.
    pub endpoint: EndpointCategory,
}

impl CounterKey {
    /// Build a key, mapping an empty identifier to the anonymous sentinel.
    #[must_use]
    pub fn new(identifier: &str, endpoint: EndpointCategory) -> Self {
        let identifier = if identifier.is_empty() {
            ANONYMOUS_IDENTIFIER.to_string()
        } else {
            identifier.to_string()
        };
        Self { identifier, endpoint }
    }
}

/// Counter state for one key within its current window.
///
/// `window_reset_at` never moves backward for a given key: an expired entry
/// is superseded by a fresh one, never extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowEntry {
    /// Requests admitted (or attempted) in the current window.
    pub count: i64,
    /// Unix-millis timestamp at which the window ends.
    pub window_reset_at: i64,
}

impl WindowEntry {
    /// First entry of a fresh window.
    #[must_use]
    pub fn fresh(now_ms: i64, window_ms: i64) -> Self {
        Self { count: 1, window_reset_at: now_ms.saturating_add(window_ms) }
    }

    /// Whether this window has ended as of `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.window_reset_at <= now_ms
    }
}
