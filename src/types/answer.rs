//! Evidence candidates, ranked results, citations and the final answer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::query::{EvidenceLevel, SourceKind};

/// One retrieved unit of evidence, produced by a gateway adapter.
///
/// Immutable after creation. `native_score` is the source's own relevance
/// score in [0, 1]; its meaning varies per source kind and is only
/// comparable after the ranker's per-kind normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub source: SourceKind,
    /// Stable external identifier (record id), used for deduplication
    /// and citation linking
    pub external_id: String,
    pub content: String,
    pub native_score: f64,
    pub evidence_level: EvidenceLevel,
    pub published_at: Option<NaiveDate>,
}

/// A candidate with its computed composite score and rank position.
///
/// Rank order is a total order: ties are broken by recency, then by
/// external identifier, so repeated runs on identical input produce
/// identical orderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub composite_score: f64,
    /// Zero-based position in the merged ranking
    pub rank: usize,
}

/// A reference from a contiguous span of answer text to one or more
/// ranked results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Marker index, unique within one answer, assigned in order of the
    /// span's first appearance
    pub marker: usize,
    /// Byte offset of the span start in the answer text
    pub start: usize,
    /// Byte offset one past the span end
    pub end: usize,
    /// External identifiers of the cited results, in rank order
    pub result_ids: Vec<String>,
}

/// Overall confidence tag derived from the evidence levels of the
/// cited results
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    InsufficientEvidence,
    Low,
    Moderate,
    High,
}

/// The final grounded answer for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub request_id: Uuid,
    /// Generated answer text; empty when generation failed or was skipped
    pub text: String,
    /// Every ranked result used as grounding context, cited or not
    pub sources: Vec<RankedResult>,
    pub citations: Vec<Citation>,
    pub confidence: Confidence,
    /// True when any selected source timed out or failed for this request
    pub degraded: bool,
}

impl Answer {
    /// The subset of sources actually referenced by a citation marker
    pub fn cited_sources(&self) -> Vec<&RankedResult> {
        self.sources
            .iter()
            .filter(|r| {
                self.citations
                    .iter()
                    .any(|c| c.result_ids.contains(&r.candidate.external_id))
            })
            .collect()
    }
}
