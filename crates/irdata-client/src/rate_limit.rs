//! Rate-limit back-off policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use irdata_core::error::Error;
use irdata_core::{ClientConfig, Headers, Result};

/// Epoch second at which the current rate-limit window resets.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Requests left in the current window.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Requests allowed per window.
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";

/// Rate-limit metadata read from a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHint {
    pub reset_at: Option<i64>,
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
}

impl RateLimitHint {
    /// Parse the rate-limit headers; missing or garbled values become `None`.
    pub fn from_headers(headers: &Headers) -> Self {
        fn parse<T: std::str::FromStr>(headers: &Headers, name: &str) -> Option<T> {
            headers.get(name).and_then(|v| v.trim().parse().ok())
        }

        Self {
            reset_at: parse(headers, RATE_LIMIT_RESET),
            remaining: parse(headers, RATE_LIMIT_REMAINING),
            limit: parse(headers, RATE_LIMIT_LIMIT),
        }
    }

    /// Time left until the reset, or `None` without a reset value.
    ///
    /// A reset in the past yields zero.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        let reset_ms = self.reset_at?.saturating_mul(1_000);
        let remaining_ms = reset_ms.saturating_sub(now.timestamp_millis());
        Some(Duration::from_millis(remaining_ms.max(0) as u64))
    }
}

/// Decides how long to wait after a 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    fallback: Duration,
    max_delay: Duration,
}

impl RateLimitPolicy {
    pub fn new(fallback: Duration, max_delay: Duration) -> Self {
        Self {
            fallback,
            max_delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.rate_limit_fallback(), config.max_rate_limit_delay())
    }

    /// Delay before retrying, measured against the current wall clock.
    pub fn compute_delay(&self, headers: &Headers) -> Duration {
        self.compute_delay_at(headers, Utc::now())
    }

    /// Delay before retrying, measured against `now`.
    ///
    /// Uses the reset header when present, the fallback otherwise, and never
    /// exceeds the configured maximum.
    pub fn compute_delay_at(&self, headers: &Headers, now: DateTime<Utc>) -> Duration {
        let hint = RateLimitHint::from_headers(headers);
        let delay = hint.delay_from(now).unwrap_or(self.fallback);
        debug!(
            reset_at = ?hint.reset_at,
            remaining = ?hint.remaining,
            limit = ?hint.limit,
            delay_ms = delay.as_millis() as u64,
            "Computed rate-limit delay"
        );
        delay.min(self.max_delay)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Sleep for `delay` unless `cancel` fires first.
pub(crate) async fn suspend(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
