// provider/binance/rate_limiter.rs
//
// Request spacing shared by every outbound REST call.
// Binance bans IPs that exceed the per-minute request weight.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Requests per minute used when none is configured; leaves margin under the 1200/min ceiling
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 1000;

/// Minimum-spacing limiter for REST calls
///
/// A quota with a burst of one: after an `acquire()` returns, the next one
/// waits until `interval` has elapsed. Concurrent callers each recompute their
/// remaining wait against the shared state, so they queue up one interval
/// apart instead of all sleeping for the full interval.
///
/// # Examples
///
/// ```
/// use binance_feeder::provider::binance::RequestRateLimiter;
///
/// let limiter = RequestRateLimiter::per_minute(1000);
/// assert_eq!(limiter.interval().as_millis(), 60);
/// ```
pub struct RequestRateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    interval: Duration,
}

impl RequestRateLimiter {
    /// Create a limiter with a fixed spacing between calls
    ///
    /// A zero interval disables spacing.
    pub fn new(interval: Duration) -> Self {
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: GovernorRateLimiter::direct(quota),
            interval,
        }
    }

    /// Create a limiter spacing calls evenly over a minute
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::new(Duration::from_secs(60) / requests)
    }

    /// Wait until the next call is allowed
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Configured spacing between calls
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::per_minute(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_per_minute_interval() {
        assert_eq!(
            RequestRateLimiter::per_minute(1000).interval(),
            Duration::from_millis(60)
        );
        assert_eq!(
            RequestRateLimiter::per_minute(60).interval(),
            Duration::from_secs(1)
        );
        assert_eq!(
            RequestRateLimiter::per_minute(0).interval(),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RequestRateLimiter::new(Duration::from_secs(5));

        let started = Instant::now();
        limiter.acquire().await;

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sequential_calls_are_spaced() {
        let limiter = RequestRateLimiter::new(Duration::from_millis(50));

        let started = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }

        // First call is free, the next two wait one interval each
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_concurrent_callers_queue_one_interval_apart() {
        let limiter = Arc::new(RequestRateLimiter::new(Duration::from_millis(40)));

        let started = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let total = started.elapsed();
        assert!(total >= Duration::from_millis(110));
        // Serialized, not every caller sleeping the whole backlog
        assert!(total < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let limiter = RequestRateLimiter::new(Duration::ZERO);

        let started = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }

        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
