//! Collaborator contracts consumed by the engine.
//!
//! Every external capability sits behind an object-safe async trait and is
//! injected as `Arc<dyn …>`. Per-source adapters convert raw responses
//! into the common [`Candidate`] shape at the gateway boundary; the ranker
//! never sees source-specific record layouts.

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{Candidate, EvidenceLevel, SourceKind};

pub use http::{HttpCompletionClient, HttpSourceClient};

/// One raw record returned by a structured source client, before
/// adaptation into a [`Candidate`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub content: String,
    /// Source-native relevance score; clamped to [0, 1] at adaptation
    pub native_score: f64,
    pub published_at: Option<NaiveDate>,
    /// Evidence level when the source declares one; otherwise the
    /// per-kind default applies
    pub evidence_level: Option<EvidenceLevel>,
}

/// A structured knowledge source (drug records, trial records,
/// consumer summaries) or an adapted passage index.
///
/// Each client declares its own rate-limit quota and cache-freshness
/// hint; the gateway consumes both.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Published quota in requests per second
    fn quota(&self) -> f64 {
        5.0
    }

    /// Suggested response cache TTL, reflecting how often the source's
    /// data changes
    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(300)
    }

    /// May return fewer than `k` records
    async fn query(&self, text: &str, k: usize) -> Result<Vec<SourceRecord>>;
}

/// A passage returned by the opaque semantic search capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    /// Similarity score, descending order only guaranteed
    pub score: f64,
}

/// Opaque semantic passage-search capability.
///
/// How embeddings are computed is out of scope; the engine only consumes
/// ranked passages.
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<Passage>>;
}

/// Opaque text-completion capability. Non-deterministic and possibly
/// empty or erroring; callers bound it with a timeout.
#[async_trait]
pub trait CompletionCapability: Send + Sync {
    async fn complete(&self, prompt: &str, context: &[String]) -> Result<String>;
}

/// Adapts a [`PassageSearch`] capability into the common [`SourceClient`]
/// shape so the gateway treats it like any other source.
pub struct PassageSourceAdapter {
    inner: Arc<dyn PassageSearch>,
    quota: f64,
    cache_ttl: Duration,
}

impl PassageSourceAdapter {
    pub fn new(inner: Arc<dyn PassageSearch>) -> Self {
        Self {
            inner,
            quota: 10.0,
            cache_ttl: Duration::from_secs(600),
        }
    }

    pub fn with_limits(mut self, quota: f64, cache_ttl: Duration) -> Self {
        self.quota = quota;
        self.cache_ttl = cache_ttl;
        self
    }
}

#[async_trait]
impl SourceClient for PassageSourceAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::PassageIndex
    }

    fn quota(&self) -> f64 {
        self.quota
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<SourceRecord>> {
        let passages = self.inner.search(text, k).await?;
        Ok(passages
            .into_iter()
            .map(|p| SourceRecord {
                id: p.id,
                content: p.content,
                native_score: p.score,
                published_at: None,
                evidence_level: None,
            })
            .collect())
    }
}

/// Evidence level assumed for records that do not declare one
pub fn default_evidence_level(kind: SourceKind) -> EvidenceLevel {
    match kind {
        // Curated interaction and trial records are well-vetted
        SourceKind::DrugRecord => EvidenceLevel::RandomizedTrial,
        SourceKind::TrialRecord => EvidenceLevel::RandomizedTrial,
        // Free-text passages are unclassified until proven otherwise
        SourceKind::PassageIndex => EvidenceLevel::CaseReport,
        SourceKind::ConsumerSummary => EvidenceLevel::ExpertOpinion,
    }
}

/// Convert a raw record into the engine's common candidate shape
pub fn into_candidate(kind: SourceKind, record: SourceRecord) -> Candidate {
    Candidate {
        source: kind,
        external_id: record.id,
        content: record.content,
        native_score: record.native_score.clamp(0.0, 1.0),
        evidence_level: record
            .evidence_level
            .unwrap_or_else(|| default_evidence_level(kind)),
        published_at: record.published_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPassages;

    #[async_trait]
    impl PassageSearch for FixedPassages {
        async fn search(&self, _text: &str, k: usize) -> Result<Vec<Passage>> {
            Ok((0..k.min(2))
                .map(|i| Passage {
                    id: format!("p{}", i),
                    content: format!("passage {}", i),
                    score: 0.9 - i as f64 * 0.1,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_passage_adapter_maps_records() {
        let adapter = PassageSourceAdapter::new(Arc::new(FixedPassages));
        assert_eq!(adapter.kind(), SourceKind::PassageIndex);

        let records = adapter.query("anything", 5).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "p0");
        assert!(records[0].evidence_level.is_none());
    }

    #[test]
    fn test_into_candidate_clamps_and_defaults() {
        let record = SourceRecord {
            id: "r1".to_string(),
            content: "content".to_string(),
            native_score: 1.7,
            published_at: None,
            evidence_level: None,
        };

        let candidate = into_candidate(SourceKind::DrugRecord, record);
        assert_eq!(candidate.native_score, 1.0);
        assert_eq!(candidate.evidence_level, EvidenceLevel::RandomizedTrial);

        let record = SourceRecord {
            id: "r2".to_string(),
            content: "content".to_string(),
            native_score: -0.3,
            published_at: None,
            evidence_level: Some(EvidenceLevel::SystematicReview),
        };
        let candidate = into_candidate(SourceKind::ConsumerSummary, record);
        assert_eq!(candidate.native_score, 0.0);
        assert_eq!(candidate.evidence_level, EvidenceLevel::SystematicReview);
    }

    #[test]
    fn test_default_levels_per_kind() {
        assert_eq!(
            default_evidence_level(SourceKind::ConsumerSummary),
            EvidenceLevel::ExpertOpinion
        );
        assert_eq!(
            default_evidence_level(SourceKind::PassageIndex),
            EvidenceLevel::CaseReport
        );
    }
}
