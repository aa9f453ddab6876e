//! Introspection counters for the surrounding observability layer.
//!
//! Each gateway owns a [`SourceMetrics`]; the engine assembles a
//! [`MetricsSnapshot`] over every configured source on demand. Counters
//! are atomics, latency samples live in a small bounded window guarded
//! by one mutex per source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::gateway::BreakerState;
use crate::types::SourceKind;

/// Bounded latency sample window per source
const LATENCY_WINDOW: usize = 512;

#[derive(Debug, Default)]
struct LatencyWindowBuf {
    samples: Vec<u64>,
    next: usize,
}

impl LatencyWindowBuf {
    fn record(&mut self, micros: u64) {
        if self.samples.len() < LATENCY_WINDOW {
            self.samples.push(micros);
        } else {
            self.samples[self.next] = micros;
            self.next = (self.next + 1) % LATENCY_WINDOW;
        }
    }

    fn percentile(&self, p: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        Some(sorted[idx])
    }
}

/// Live counters for one source gateway
pub struct SourceMetrics {
    kind: SourceKind,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    outbound_calls: AtomicU64,
    failures: AtomicU64,
    rate_limited: AtomicU64,
    circuit_rejections: AtomicU64,
    latencies: Mutex<LatencyWindowBuf>,
}

impl SourceMetrics {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            outbound_calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            circuit_rejections: AtomicU64::new(0),
            latencies: Mutex::new(LatencyWindowBuf::default()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound_call(&self) {
        self.outbound_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, elapsed: Duration) {
        self.latencies
            .lock()
            .unwrap()
            .record(elapsed.as_micros() as u64);
    }

    /// Cache hits over all cache lookups; 0.0 when none happened yet
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn p99_latency(&self) -> Option<Duration> {
        self.latencies
            .lock()
            .unwrap()
            .percentile(0.99)
            .map(Duration::from_micros)
    }

    /// Point-in-time snapshot; the breaker state comes from the owning
    /// gateway
    pub fn snapshot(&self, breaker: BreakerState) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            kind: self.kind,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_hit_rate: self.cache_hit_rate(),
            outbound_calls: self.outbound_calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            breaker,
            p99_latency_ms: self
                .p99_latency()
                .map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}

/// Serializable per-source metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SourceMetricsSnapshot {
    pub kind: SourceKind,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub outbound_calls: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub circuit_rejections: u64,
    pub breaker: BreakerState,
    pub p99_latency_ms: Option<f64>,
}

/// Snapshot over every configured source
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub sources: Vec<SourceMetricsSnapshot>,
}
