//! Rate limiting utilities

use chrono::{DateTime, Duration, Local};
use std::collections::HashMap;
use std::hash::Hash;

/// Token-bucket rate limiter keyed by caller.
///
/// Time is supplied by the caller so limits follow the same clock as the
/// operations they guard.
#[derive(Debug)]
pub struct RateLimiter<K> {
    /// Maximum requests per bucket
    max_tokens: u32,
    /// How often a bucket is refilled
    refill_interval: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: DateTime<Local>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Allow `max_requests` per `interval` for each key
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            buckets: HashMap::new(),
        }
    }

    /// Take one request from `key`'s bucket.
    ///
    /// Returns `false` when the bucket is empty.
    pub fn check(&mut self, key: &K, now: DateTime<Local>) -> bool {
        let max_tokens = self.max_tokens;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: max_tokens,
            last_refill: now,
        });

        let elapsed = now - bucket.last_refill;
        if self.refill_interval > Duration::zero() && elapsed >= self.refill_interval {
            let intervals = elapsed.num_milliseconds() / self.refill_interval.num_milliseconds();
            let refill = u32::try_from(intervals).unwrap_or(u32::MAX);
            bucket.tokens = bucket
                .tokens
                .saturating_add(refill.saturating_mul(max_tokens))
                .min(max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Forget buckets untouched for `stale_after`
    pub fn cleanup(&mut self, now: DateTime<Local>, stale_after: Duration) {
        self.buckets
            .retain(|_, bucket| now - bucket.last_refill < stale_after);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::minutes(1));

        for _ in 0..5 {
            assert!(limiter.check(&"79991234567", now()));
        }

        // 6th request should be denied
        assert!(!limiter.check(&"79991234567", now()));
    }

    #[test]
    fn test_rate_limiter_different_keys() {
        let mut limiter = RateLimiter::new(2, Duration::minutes(1));

        assert!(limiter.check(&"a", now()));
        assert!(limiter.check(&"a", now()));
        assert!(!limiter.check(&"a", now()));

        // Each key has its own bucket
        assert!(limiter.check(&"b", now()));
        assert!(limiter.check(&"b", now()));
    }

    #[test]
    fn test_rate_limiter_refills_after_interval() {
        let mut limiter = RateLimiter::new(1, Duration::minutes(10));

        assert!(limiter.check(&"a", now()));
        assert!(!limiter.check(&"a", now() + Duration::minutes(9)));
        assert!(limiter.check(&"a", now() + Duration::minutes(10)));
        assert!(!limiter.check(&"a", now() + Duration::minutes(11)));
    }

    #[test]
    fn test_rate_limiter_cleanup() {
        let mut limiter = RateLimiter::new(1, Duration::minutes(10));
        limiter.check(&"a", now());
        limiter.check(&"b", now() + Duration::minutes(30));

        limiter.cleanup(now() + Duration::minutes(31), Duration::minutes(20));
        assert_eq!(limiter.len(), 1);
    }
}
