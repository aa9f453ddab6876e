//! Per-source resilience wrapper.
//!
//! Exactly one [`SourceGateway`] exists per configured source kind. It
//! isolates the rest of the engine from that source's failure and rate
//! characteristics: cache, circuit breaker, token-bucket limiter, and
//! bounded retry sit between the engine and the client, in that order.
//! `fetch` never raises for timeout, open circuit, or exhausted retries —
//! those return an empty candidate list marked degraded.

pub mod breaker;
pub mod cache;
pub mod rate_limit;
pub mod retry;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::sources::{into_candidate, SourceClient};
use crate::telemetry::{SourceMetrics, SourceMetricsSnapshot};
use crate::types::{Candidate, SourceKind};

pub use breaker::{BreakerState, CircuitBreaker};
pub use cache::{CacheKey, ResponseCache};
pub use rate_limit::TokenBucket;
pub use retry::RetryPolicy;

/// Gateway configuration shared by every source instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Cooldown before an open circuit admits a probe
    pub cooldown_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of one gateway fetch. Degraded outcomes carry whatever
/// candidates were obtained (usually none) instead of an error.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub candidates: Vec<Candidate>,
    pub degraded: bool,
}

impl FetchOutcome {
    fn degraded() -> Self {
        Self {
            candidates: Vec::new(),
            degraded: true,
        }
    }
}

/// Resilience wrapper around one source client
pub struct SourceGateway {
    kind: SourceKind,
    client: Arc<dyn SourceClient>,
    cache: ResponseCache,
    limiter: StdMutex<TokenBucket>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    metrics: Arc<SourceMetrics>,
}

impl SourceGateway {
    pub fn new(client: Arc<dyn SourceClient>, config: &GatewayConfig) -> Self {
        let kind = client.kind();
        Self {
            kind,
            cache: ResponseCache::new(client.cache_ttl()),
            limiter: StdMutex::new(TokenBucket::new(client.quota())),
            breaker: CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_millis(config.cooldown_ms),
            ),
            retry: config.retry.clone(),
            metrics: Arc::new(SourceMetrics::new(kind)),
            client,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub fn metrics(&self) -> &SourceMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        self.metrics.snapshot(self.breaker.state())
    }

    /// Fetch up to `k` candidates for `text`, bounded by `deadline`.
    ///
    /// Holding the cache slot's lock across the outbound call coalesces
    /// concurrent identical requests into a single fetch; waiters read
    /// the stored value once the first caller completes.
    pub async fn fetch(&self, text: &str, k: usize, deadline: Instant) -> FetchOutcome {
        let key = CacheKey::new(self.kind, text, k);
        let slot = self.cache.slot(&key);

        let remaining = deadline.saturating_duration_since(Instant::now());
        let mut entry = match tokio::time::timeout(remaining, slot.lock()).await {
            Ok(entry) => entry,
            Err(_) => {
                debug!(source = %self.kind, "deadline elapsed waiting on coalesced fetch");
                return FetchOutcome::degraded();
            }
        };

        if let Some(hit) = entry.fresh(self.cache.ttl()) {
            self.metrics.record_cache_hit();
            return FetchOutcome {
                candidates: hit.to_vec(),
                degraded: false,
            };
        }
        self.metrics.record_cache_miss();

        // Fail fast on an open circuit before spending quota on a call
        // that will not happen.
        if !self.breaker.try_acquire() {
            self.metrics.record_circuit_rejection();
            debug!(source = %self.kind, "circuit open, failing fast");
            return FetchOutcome::degraded();
        }

        if !self.acquire_permit(deadline).await {
            self.metrics.record_rate_limited();
            // An admitted half-open probe that never ran is returned, not
            // counted as a failure.
            self.breaker.cancel_probe();
            warn!(source = %self.kind, "rate limit wait exceeded deadline");
            return FetchOutcome::degraded();
        }

        self.metrics.record_outbound_call();
        let started = Instant::now();
        let result = self
            .retry
            .execute_with_retry(deadline, || self.bounded_query(text, k, deadline))
            .await;
        self.metrics.record_latency(started.elapsed());

        match result {
            Ok(records) => {
                self.breaker.record_success();
                let mut candidates: Vec<Candidate> = records
                    .into_iter()
                    .map(|record| into_candidate(self.kind, record))
                    .collect();
                candidates.truncate(k);
                entry.store(candidates.clone());
                FetchOutcome {
                    candidates,
                    degraded: false,
                }
            }
            Err(err) => {
                self.breaker.record_failure();
                self.metrics.record_failure();
                warn!(source = %self.kind, error = %err, "source fetch degraded");
                FetchOutcome::degraded()
            }
        }
    }

    async fn bounded_query(
        &self,
        text: &str,
        k: usize,
        deadline: Instant,
    ) -> crate::errors::Result<Vec<crate::sources::SourceRecord>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(EngineError::SourceUnavailable {
                source: self.kind,
                reason: "deadline exhausted".to_string(),
            });
        }
        match tokio::time::timeout(remaining, self.client.query(text, k)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::SourceUnavailable {
                source: self.kind,
                reason: format!("timed out after {}ms", remaining.as_millis()),
            }),
        }
    }

    /// Wait for a rate-limit token, bounded by the deadline
    async fn acquire_permit(&self, deadline: Instant) -> bool {
        loop {
            let wait = {
                let mut limiter = self.limiter.lock().unwrap();
                if limiter.try_acquire() {
                    return true;
                }
                limiter.time_until_ready()
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || wait > remaining {
                return false;
            }
            tokio::time::sleep(wait).await;
        }
    }
}
