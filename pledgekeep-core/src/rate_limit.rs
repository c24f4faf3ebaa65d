//! Outbound request budget for the membership API.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket limiter shared across all upstream requests.
///
/// Configured as `max_requests` per `period` with burst capacity equal to
/// `max_requests`. Cloning is cheap and all clones share one bucket, so the
/// refresh call and every page fetch draw from the same budget.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `period`.
    ///
    /// Zero values are clamped to the smallest usable quota rather than
    /// rejected; a limiter that can never grant a slot would deadlock the
    /// sync loop.
    pub fn new(max_requests: u32, period: Duration) -> Self {
        let max = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let replenish = period
            .checked_div(max.get())
            .filter(|interval| !interval.is_zero())
            .unwrap_or(Duration::from_nanos(1));
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_minute(max))
            .allow_burst(max);

        Self {
            inner: Arc::new(GovernorRateLimiter::direct(quota)),
        }
    }

    /// Create a limiter allowing `requests_per_minute` per 60 seconds.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, Duration::from_secs(60))
    }

    /// Wait until a request slot is available.
    ///
    /// The wait is cancel-safe: dropping the future (for example when an
    /// enclosing phase deadline fires) consumes nothing from the bucket.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }

    /// Try to take a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
