//! Source gateway resilience behavior: request coalescing, caching,
//! circuit breaking and rate limiting, exercised against mock clients.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use medcite::errors::{EngineError, Result};
use medcite::gateway::{BreakerState, GatewayConfig, RetryPolicy, SourceGateway};
use medcite::sources::{SourceClient, SourceRecord};
use medcite::SourceKind;

struct SlowClient {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait]
impl SourceClient for SlowClient {
    fn kind(&self) -> SourceKind {
        SourceKind::PassageIndex
    }

    fn quota(&self) -> f64 {
        1000.0
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<SourceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok((0..k)
            .map(|i| SourceRecord {
                id: format!("p{}", i),
                content: format!("passage {}", i),
                native_score: 0.8,
                published_at: None,
                evidence_level: None,
            })
            .collect())
    }
}

/// Fails while `failing` is set, succeeds afterwards
struct FlakyClient {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    quota: f64,
}

#[async_trait]
impl SourceClient for FlakyClient {
    fn kind(&self) -> SourceKind {
        SourceKind::DrugRecord
    }

    fn quota(&self) -> f64 {
        self.quota
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn query(&self, _text: &str, _k: usize) -> Result<Vec<SourceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(EngineError::SourceUnavailable {
                source: SourceKind::DrugRecord,
                reason: "down".to_string(),
            })
        } else {
            Ok(vec![SourceRecord {
                id: "d0".to_string(),
                content: "record".to_string(),
                native_score: 0.9,
                published_at: None,
                evidence_level: None,
            }])
        }
    }
}

fn config(threshold: u32, cooldown_ms: u64) -> GatewayConfig {
    GatewayConfig {
        failure_threshold: threshold,
        cooldown_ms,
        retry: RetryPolicy {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            enable_jitter: false,
        },
    }
}

fn deadline_in(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

#[tokio::test]
async fn test_concurrent_identical_requests_coalesce_to_one_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(SlowClient {
        calls: calls.clone(),
        delay: Duration::from_millis(50),
    });
    let gateway = Arc::new(SourceGateway::new(client, &config(5, 10_000)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway.fetch("same query", 3, deadline_in(5000)).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.candidates.len(), 3);
    }

    // All ten callers were satisfied by a single outbound call
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_hit_within_ttl() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(SlowClient {
        calls: calls.clone(),
        delay: Duration::ZERO,
    });
    let gateway = SourceGateway::new(client, &config(5, 10_000));

    let first = gateway.fetch("ibuprofen dosing", 2, deadline_in(5000)).await;
    let second = gateway.fetch("ibuprofen dosing", 2, deadline_in(5000)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.candidates[0].external_id,
        second.candidates[0].external_id
    );
}

#[tokio::test]
async fn test_breaker_opens_after_threshold_and_probes_after_cooldown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(AtomicBool::new(true));
    let client = Arc::new(FlakyClient {
        calls: calls.clone(),
        failing: failing.clone(),
        quota: 1000.0,
    });
    let gateway = SourceGateway::new(client, &config(5, 50));

    // Five consecutive failures open the circuit
    for i in 0..5 {
        let outcome = gateway.fetch(&format!("q{}", i), 2, deadline_in(5000)).await;
        assert!(outcome.degraded);
    }
    assert_eq!(gateway.breaker_state(), BreakerState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // Sixth call inside the cooldown fails fast with no network call
    let started = Instant::now();
    let outcome = gateway.fetch("q-open", 2, deadline_in(5000)).await;
    assert!(outcome.degraded);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(started.elapsed() < Duration::from_millis(40));

    // After the cooldown the next call is the half-open probe; the
    // source has recovered, so the circuit closes again.
    tokio::time::sleep(Duration::from_millis(60)).await;
    failing.store(false, Ordering::SeqCst);

    let outcome = gateway.fetch("q-probe", 2, deadline_in(5000)).await;
    assert!(!outcome.degraded);
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(gateway.breaker_state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_failed_probe_reopens() {
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(AtomicBool::new(true));
    let client = Arc::new(FlakyClient {
        calls: calls.clone(),
        failing,
        quota: 1000.0,
    });
    let gateway = SourceGateway::new(client, &config(1, 30));

    gateway.fetch("q0", 2, deadline_in(5000)).await;
    assert_eq!(gateway.breaker_state(), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(40)).await;
    // Probe runs and fails; the circuit reopens
    gateway.fetch("q1", 2, deadline_in(5000)).await;
    assert_eq!(gateway.breaker_state(), BreakerState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_fails_fast_at_deadline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(AtomicBool::new(false));
    let client = Arc::new(FlakyClient {
        calls: calls.clone(),
        failing,
        quota: 1.0,
    });
    let gateway = SourceGateway::new(client, &config(5, 10_000));

    // The single burst token admits the first call; the second cannot
    // wait out the one-second refill inside its 50ms deadline.
    let first = gateway.fetch("alpha", 2, deadline_in(5000)).await;
    assert!(!first.degraded);

    let second = gateway.fetch("beta", 2, deadline_in(50)).await;
    assert!(second.degraded);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snapshot = gateway.snapshot();
    assert_eq!(snapshot.rate_limited, 1);
    // The limiter refusal never counts against the breaker
    assert_eq!(snapshot.breaker, BreakerState::Closed);
}

#[tokio::test]
async fn test_client_timeout_degrades() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(SlowClient {
        calls: calls.clone(),
        delay: Duration::from_secs(10),
    });
    let gateway = SourceGateway::new(client, &config(5, 10_000));

    let started = Instant::now();
    let outcome = gateway.fetch("slow query", 2, deadline_in(50)).await;
    assert!(outcome.degraded);
    assert!(outcome.candidates.is_empty());
    // Returned at the deadline, not after the client's ten seconds
    assert!(started.elapsed() < Duration::from_secs(2));
}
