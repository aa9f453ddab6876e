//! Response cache with per-key coalescing.
//!
//! Keys combine (source kind, normalized query, k). Each key owns an
//! async mutex; the gateway holds that lock across the outbound call, so
//! concurrent identical requests serialize on the key and every waiter
//! after the first observes the freshly stored value — at most one
//! outbound call per cache key is ever in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::types::{Candidate, SourceKind};

/// Stale-entry sweep threshold
const MAX_ENTRIES: usize = 1024;

/// Cache key: source kind, normalized query text, result budget
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: SourceKind,
    query: String,
    k: usize,
}

impl CacheKey {
    pub fn new(kind: SourceKind, query: &str, k: usize) -> Self {
        Self {
            kind,
            query: normalize_query(query),
            k,
        }
    }
}

/// Lowercase and collapse whitespace so trivially different spellings of
/// the same query share a cache entry
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One cached response with its storage time
#[derive(Debug, Clone)]
struct CachedResponse {
    candidates: Vec<Candidate>,
    stored_at: Instant,
}

/// The guarded slot for one cache key
#[derive(Debug, Default)]
pub struct CacheEntry {
    stored: Option<CachedResponse>,
}

impl CacheEntry {
    /// The cached candidates when present and not expired
    pub fn fresh(&self, ttl: Duration) -> Option<&[Candidate]> {
        match &self.stored {
            Some(response) if response.stored_at.elapsed() < ttl => {
                Some(&response.candidates)
            }
            _ => None,
        }
    }

    pub fn store(&mut self, candidates: Vec<Candidate>) {
        self.stored = Some(CachedResponse {
            candidates,
            stored_at: Instant::now(),
        });
    }
}

/// Per-source response cache
pub struct ResponseCache {
    ttl: Duration,
    entries: StdMutex<HashMap<CacheKey, Arc<AsyncMutex<CacheEntry>>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: StdMutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The slot for `key`, created on first use. The map lock is held
    /// only for the lookup; callers then serialize on the slot itself.
    pub fn slot(&self, key: &CacheKey) -> Arc<AsyncMutex<CacheEntry>> {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() > MAX_ENTRIES {
            Self::sweep(&mut entries, self.ttl);
        }
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(CacheEntry::default())))
            .clone()
    }

    /// Drop entries whose stored value has expired. Slots currently
    /// locked by an in-flight fetch are kept.
    fn sweep(entries: &mut HashMap<CacheKey, Arc<AsyncMutex<CacheEntry>>>, ttl: Duration) {
        entries.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.fresh(ttl).is_some(),
            Err(_) => true,
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::EvidenceLevel;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            source: SourceKind::TrialRecord,
            external_id: id.to_string(),
            content: "content".to_string(),
            native_score: 0.5,
            evidence_level: EvidenceLevel::RandomizedTrial,
            published_at: None,
        }
    }

    #[test]
    fn test_key_normalization() {
        let a = CacheKey::new(SourceKind::TrialRecord, "  Warfarin   Aspirin ", 5);
        let b = CacheKey::new(SourceKind::TrialRecord, "warfarin aspirin", 5);
        assert_eq!(a, b);

        let c = CacheKey::new(SourceKind::TrialRecord, "warfarin aspirin", 3);
        assert_ne!(a, c);

        let d = CacheKey::new(SourceKind::DrugRecord, "warfarin aspirin", 5);
        assert_ne!(a, d);
    }

    #[tokio::test]
    async fn test_store_and_fresh() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = CacheKey::new(SourceKind::TrialRecord, "query", 5);

        let slot = cache.slot(&key);
        {
            let mut entry = slot.lock().await;
            assert!(entry.fresh(cache.ttl()).is_none());
            entry.store(vec![candidate("a")]);
        }

        let slot = cache.slot(&key);
        let entry = slot.lock().await;
        let hit = entry.fresh(cache.ttl()).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].external_id, "a");
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        let key = CacheKey::new(SourceKind::TrialRecord, "query", 5);

        let slot = cache.slot(&key);
        slot.lock().await.store(vec![candidate("a")]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(slot.lock().await.fresh(cache.ttl()).is_none());
    }

    #[tokio::test]
    async fn test_same_slot_for_same_key() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = CacheKey::new(SourceKind::TrialRecord, "query", 5);
        let a = cache.slot(&key);
        let b = cache.slot(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }
}
