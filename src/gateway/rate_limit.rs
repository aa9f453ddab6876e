//! Per-source token bucket rate limiter.
//!
//! Refills at the source's published quota (requests per second) up to a
//! burst capacity equal to the quota. Callers that cannot be admitted
//! immediately may wait a bounded amount of time, then fail fast rather
//! than violate the source's limit.

use std::time::{Duration, Instant};

/// A token bucket sized to one source's quota
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    rate: f64,
}

impl TokenBucket {
    /// Create a bucket with the given rate (requests per second).
    /// Burst capacity equals the rate, with a floor of one request.
    pub fn new(rate: f64) -> Self {
        let rate = rate.max(0.1);
        let capacity = rate.max(1.0);
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
            capacity,
            rate,
        }
    }

    /// Try to acquire one token. Returns `true` if admitted.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token will be available, zero if one already is
    pub fn time_until_ready(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_capacity() {
        let mut bucket = TokenBucket::new(3.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_low_rate_still_admits_one() {
        let mut bucket = TokenBucket::new(0.5);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_time_until_ready_after_drain() {
        let mut bucket = TokenBucket::new(2.0);
        while bucket.try_acquire() {}
        let wait = bucket.time_until_ready();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(600));
    }

    #[test]
    fn test_refill_over_time() {
        let mut bucket = TokenBucket::new(1000.0);
        while bucket.try_acquire() {}
        std::thread::sleep(Duration::from_millis(5));
        assert!(bucket.try_acquire());
    }
}
