//! Process-wide token bucket.

use std::sync::Mutex;
use std::time::Instant;

use crate::config::LimiterConfig;

/// Bucket state guarded by the limiter's mutex.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A single token bucket shared by every request in the process.
///
/// Refill and take happen under one lock, so two concurrent callers can
/// never both spend the last token.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    refill_rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// A full bucket of `burst` tokens refilled at `rps` tokens per second.
    pub fn new(rps: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity, Instant::now())),
            refill_rate: rps,
            capacity,
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.requests_per_second, config.burst)
    }

    /// Take a token if one is available. Never blocks on time.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        // A poisoned lock only means another request panicked mid-update;
        // the bucket's two fields are still individually valid.
        let mut bucket = self
            .bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.try_acquire(now, self.capacity, self.refill_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_burst_then_deny() {
        let limiter = RateLimiter::new(2.0, 4);
        let now = Instant::now();
        let admitted = (0..5).filter(|_| limiter.allow_at(now)).count();
        assert_eq!(admitted, 4);
        assert!(!limiter.allow_at(now));
    }

    #[test]
    fn test_refill_after_one_second() {
        let limiter = RateLimiter::new(2.0, 4);
        let start = Instant::now();
        for _ in 0..4 {
            assert!(limiter.allow_at(start));
        }
        assert!(!limiter.allow_at(start));

        let later = start + Duration::from_secs(1);
        assert!(limiter.allow_at(later));
        assert!(limiter.allow_at(later));
        assert!(!limiter.allow_at(later));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let limiter = RateLimiter::new(100.0, 3);
        let start = Instant::now();
        assert!(limiter.allow_at(start));

        let later = start + Duration::from_secs(60);
        let admitted = (0..10).filter(|_| limiter.allow_at(later)).count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn test_real_clock_refills() {
        let limiter = RateLimiter::new(2.0, 4);
        let admitted = (0..5).filter(|_| limiter.allow()).count();
        assert_eq!(admitted, 4);

        std::thread::sleep(Duration::from_secs(1));
        assert!(limiter.allow());
    }

    #[test]
    fn test_concurrent_callers_never_overspend() {
        let limiter = Arc::new(RateLimiter::new(0.0001, 50));
        let admitted = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if limiter.allow() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 50);
    }
}
