//! Per-source circuit breaker.
//!
//! Closed → Open after a threshold of consecutive failures; Open fails
//! fast without attempting the network call until the cooldown elapses;
//! Half-Open admits exactly one probe, whose outcome fully Closes or
//! re-Opens the circuit. State is held in per-source atomics so no lock
//! spans multiple sources.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker for one source
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    /// Millis since `epoch` at which the circuit last opened
    opened_at_ms: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Whether a call may proceed. In the Open state this transitions to
    /// Half-Open once the cooldown has elapsed and admits exactly one
    /// probe; concurrent callers lose the race and fail fast.
    pub fn try_acquire(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => true,
            STATE_HALF_OPEN => false,
            _ => {
                if self.cooldown_elapsed() {
                    self.state
                        .compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    pub fn record_failure(&self) {
        let state = self.state.load(Ordering::Acquire);
        if state == STATE_HALF_OPEN {
            // Probe failed: reopen with a fresh cooldown
            self.open();
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold {
            self.open();
        }
    }

    /// Return an admitted probe slot whose call never ran (e.g. the rate
    /// limiter refused it). The circuit re-opens with its original
    /// cooldown timestamp so the next caller may probe immediately.
    pub fn cancel_probe(&self) {
        let _ = self.state.compare_exchange(
            STATE_HALF_OPEN,
            STATE_OPEN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn open(&self) {
        self.opened_at_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Release);
        self.state.store(STATE_OPEN, Ordering::Release);
    }

    fn cooldown_elapsed(&self) -> bool {
        let opened_at = self.opened_at_ms.load(Ordering::Acquire);
        let now = self.epoch.elapsed().as_millis() as u64;
        now.saturating_sub(opened_at) >= self.cooldown.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.try_acquire());

        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // Second caller during the probe fails fast
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn test_probe_success_closes() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.try_acquire());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire());
    }

    #[test]
    fn test_cancel_probe_reopens_without_new_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.try_acquire());
        breaker.cancel_probe();
        assert_eq!(breaker.state(), BreakerState::Open);
        // Cooldown already elapsed, so the next caller probes again
        assert!(breaker.try_acquire());
    }

    #[test]
    fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.try_acquire());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        // Cooldown restarted; still open immediately after
        assert!(!breaker.try_acquire());
    }
}
