use crate::client::providers::ProviderId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Fixed-interval limiter for one provider
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter enforcing `min_interval` between consecutive requests
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: None,
        }
    }

    /// Claim the next request slot and return how long to wait for it
    pub fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let slot = self.next_slot.filter(|slot| *slot > now).unwrap_or(now);
        self.next_slot = Some(slot + self.min_interval);
        slot - now
    }
}

/// Per-provider pacing shared by every caller in the process.
///
/// Slots are reserved under a short lock and waited for outside it, so
/// concurrent callers (a bulk import and a live search) interleave without
/// either one holding the lock across a sleep or a network call.
#[derive(Debug, Default)]
pub struct PacingLimiter {
    limiters: Mutex<HashMap<ProviderId, RateLimiter>>,
    intervals: HashMap<ProviderId, Duration>,
}

impl PacingLimiter {
    /// Build a limiter from per-provider intervals
    #[must_use]
    pub fn new(intervals: impl IntoIterator<Item = (ProviderId, Duration)>) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            intervals: intervals.into_iter().collect(),
        }
    }

    /// Interval configured for a provider (zero if unknown)
    #[must_use]
    pub fn interval(&self, provider: ProviderId) -> Duration {
        self.intervals.get(&provider).copied().unwrap_or_default()
    }

    /// Wait for the provider's next slot
    pub async fn acquire(&self, provider: ProviderId) {
        let interval = self.interval(provider);
        let wait = {
            let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
            limiters
                .entry(provider)
                .or_insert_with(|| RateLimiter::new(interval))
                .reserve()
        };

        if !wait.is_zero() {
            debug!("Pacing {} - waiting {}ms", provider, wait.as_millis());
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_never_waits() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.reserve().is_zero());
        assert!(limiter.reserve().is_zero());
    }

    #[test]
    fn test_reservations_are_spaced() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        let first = limiter.reserve();
        let second = limiter.reserve();
        let third = limiter.reserve();
        assert!(first.is_zero());
        assert!(second > Duration::from_millis(900));
        assert!(third > Duration::from_millis(1900));
    }

    #[tokio::test]
    async fn test_pacing_is_per_provider() {
        let pacing = PacingLimiter::new([
            (ProviderId::GoogleBooks, Duration::from_millis(300)),
            (ProviderId::OpenLibrary, Duration::from_millis(300)),
        ]);

        let start = Instant::now();
        pacing.acquire(ProviderId::GoogleBooks).await;
        pacing.acquire(ProviderId::OpenLibrary).await;
        // Different providers do not pace each other
        assert!(start.elapsed() < Duration::from_millis(200));

        pacing.acquire(ProviderId::GoogleBooks).await;
        assert!(start.elapsed() >= Duration::from_millis(280));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unpaced() {
        let pacing = PacingLimiter::default();
        let start = Instant::now();
        pacing.acquire(ProviderId::OpenLibrary).await;
        pacing.acquire(ProviderId::OpenLibrary).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
