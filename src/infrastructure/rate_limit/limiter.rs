//! Fixed-window rate limiter
//!
//! Counts requests per key in fixed 60-second and 86400-second windows
//! against an atomic counter store. Both windows are checked; a request is
//! allowed only if neither count exceeds its configured ceiling. The
//! increment happens before the check so retries while throttled keep
//! counting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::environment::RateLimits;
use crate::domain::DomainError;

use super::store::CounterStore;

/// Extra TTL beyond each window so counters outlive their window boundary
const TTL_SLACK: Duration = Duration::from_secs(60);

/// Which fixed window a request exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWindow {
    PerMinute,
    PerDay,
}

impl LimitWindow {
    fn secs(&self) -> i64 {
        match self {
            Self::PerMinute => 60,
            Self::PerDay => 86_400,
        }
    }
}

impl std::fmt::Display for LimitWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerMinute => write!(f, "per_minute"),
            Self::PerDay => write!(f, "per_day"),
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// The ceiling of the governing window
    pub limit: u32,
    /// Remaining requests before the tighter window closes
    pub remaining: u32,
    /// When the governing window resets
    pub reset_at: DateTime<Utc>,
    /// The window that was exceeded, if any
    pub exceeded: Option<LimitWindow>,
}

impl RateLimitDecision {
    /// Standard rate-limit response headers for the caller to emit
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.timestamp().to_string()),
        ]
    }
}

/// Rate limiter over an atomic counter store
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Counts the request against both windows and decides whether to allow it
    pub async fn check_and_increment(
        &self,
        key_id: &str,
        limits: RateLimits,
    ) -> Result<RateLimitDecision, DomainError> {
        self.check_and_increment_at(key_id, limits, Utc::now()).await
    }

    /// Same as [`check_and_increment`](Self::check_and_increment) with an
    /// explicit clock, so window boundaries are testable
    pub async fn check_and_increment_at(
        &self,
        key_id: &str,
        limits: RateLimits,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, DomainError> {
        let minute = self
            .count_window(key_id, LimitWindow::PerMinute, now)
            .await?;
        let day = self.count_window(key_id, LimitWindow::PerDay, now).await?;

        for (window, count, limit) in [
            (LimitWindow::PerMinute, minute, limits.per_minute),
            (LimitWindow::PerDay, day, limits.per_day),
        ] {
            if count > u64::from(limit) {
                return Ok(RateLimitDecision {
                    allowed: false,
                    limit,
                    remaining: 0,
                    reset_at: window_end(window, now),
                    exceeded: Some(window),
                });
            }
        }

        let remaining_minute = u64::from(limits.per_minute).saturating_sub(minute);
        let remaining_day = u64::from(limits.per_day).saturating_sub(day);

        Ok(RateLimitDecision {
            allowed: true,
            limit: limits.per_minute,
            remaining: remaining_minute.min(remaining_day) as u32,
            reset_at: window_end(LimitWindow::PerMinute, now),
            exceeded: None,
        })
    }

    async fn count_window(
        &self,
        key_id: &str,
        window: LimitWindow,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let secs = window.secs();
        let start = now.timestamp() - now.timestamp().rem_euclid(secs);
        let key = format!("rl:{}:{}:{}", key_id, secs, start);
        let ttl = Duration::from_secs(secs as u64) + TTL_SLACK;

        self.store.increment(&key, ttl).await
    }
}

fn window_end(window: LimitWindow, now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = window.secs();
    let start = now.timestamp() - now.timestamp().rem_euclid(secs);

    Utc.timestamp_opt(start + secs, 0)
        .single()
        .unwrap_or(now)
}
