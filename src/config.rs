//! Endpoint categories and their window/limit policies.
//!
//! DESIGN
//! ======
//! The policy table is resolved once at startup and never mutated. Unknown
//! category names fall back to the default policy — a misrouted caller gets
//! the loosest generic limit, never an error.

use std::time::Duration;

use serde::Serialize;

const DEFAULT_AUTH_WINDOW_MS: i64 = 15 * 60 * 1000;
const DEFAULT_AUTH_MAX: i64 = 5;

const DEFAULT_PITCH_WRITE_WINDOW_MS: i64 = 60 * 1000;
const DEFAULT_PITCH_WRITE_MAX: i64 = 10;

const DEFAULT_ANALYTICS_READ_WINDOW_MS: i64 = 60 * 1000;
const DEFAULT_ANALYTICS_READ_MAX: i64 = 30;

const DEFAULT_UPLOAD_WINDOW_MS: i64 = 60 * 1000;
const DEFAULT_UPLOAD_MAX: i64 = 5;

const DEFAULT_DEFAULT_WINDOW_MS: i64 = 60 * 1000;
const DEFAULT_DEFAULT_MAX: i64 = 100;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// ENDPOINT CATEGORY
// =============================================================================

/// Named class of API operation with its own quota policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointCategory {
    /// Login, signup, password reset.
    Auth,
    /// Creating or editing candidate pitches.
    PitchWrite,
    /// Recruiter-facing analytics queries.
    AnalyticsRead,
    /// Resume / portfolio uploads.
    Upload,
    /// Everything else.
    Default,
}

impl EndpointCategory {
    /// Map a category name to a known category. Unknown names resolve to
    /// [`EndpointCategory::Default`]; this never fails.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "auth" => Self::Auth,
            "pitch-write" => Self::PitchWrite,
            "analytics-read" => Self::AnalyticsRead,
            "upload" => Self::Upload,
            _ => Self::Default,
        }
    }

    /// Stable name used as the store row key and in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::PitchWrite => "pitch-write",
            Self::AnalyticsRead => "analytics-read",
            Self::Upload => "upload",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// POLICY TABLE
// =============================================================================

/// One category's window and request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window duration in milliseconds.
    pub window_ms: i64,
    /// Maximum requests admitted within one window.
    pub max_requests: i64,
}

impl RateLimitPolicy {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.window_ms).unwrap_or(0))
    }
}

/// Immutable category → policy mapping, loaded once at startup.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTable {
    auth: RateLimitPolicy,
    pitch_write: RateLimitPolicy,
    analytics_read: RateLimitPolicy,
    upload: RateLimitPolicy,
    default: RateLimitPolicy,
}

impl PolicyTable {
    /// Build the table from compiled defaults with per-category environment
    /// overrides (`RATE_LIMIT_AUTH_WINDOW_MS`, `RATE_LIMIT_AUTH_MAX`, ...).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            auth: RateLimitPolicy {
                window_ms: env_parse("RATE_LIMIT_AUTH_WINDOW_MS", DEFAULT_AUTH_WINDOW_MS),
                max_requests: env_parse("RATE_LIMIT_AUTH_MAX", DEFAULT_AUTH_MAX),
            },
            pitch_write: RateLimitPolicy {
                window_ms: env_parse("RATE_LIMIT_PITCH_WRITE_WINDOW_MS", DEFAULT_PITCH_WRITE_WINDOW_MS),
                max_requests: env_parse("RATE_LIMIT_PITCH_WRITE_MAX", DEFAULT_PITCH_WRITE_MAX),
            },
            analytics_read: RateLimitPolicy {
                window_ms: env_parse("RATE_LIMIT_ANALYTICS_READ_WINDOW_MS", DEFAULT_ANALYTICS_READ_WINDOW_MS),
                max_requests: env_parse("RATE_LIMIT_ANALYTICS_READ_MAX", DEFAULT_ANALYTICS_READ_MAX),
            },
            upload: RateLimitPolicy {
                window_ms: env_parse("RATE_LIMIT_UPLOAD_WINDOW_MS", DEFAULT_UPLOAD_WINDOW_MS),
                max_requests: env_parse("RATE_LIMIT_UPLOAD_MAX", DEFAULT_UPLOAD_MAX),
            },
            default: RateLimitPolicy {
                window_ms: env_parse("RATE_LIMIT_DEFAULT_WINDOW_MS", DEFAULT_DEFAULT_WINDOW_MS),
                max_requests: env_parse("RATE_LIMIT_DEFAULT_MAX", DEFAULT_DEFAULT_MAX),
            },
        }
    }

    /// Resolve the policy for a category. Never fails.
    #[must_use]
    pub fn get(&self, category: EndpointCategory) -> RateLimitPolicy {
        match category {
            EndpointCategory::Auth => self.auth,
            EndpointCategory::PitchWrite => self.pitch_write,
            EndpointCategory::AnalyticsRead => self.analytics_read,
            EndpointCategory::Upload => self.upload,
            EndpointCategory::Default => self.default,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
