//! Evidence ranking and merging.
//!
//! Candidates from every queried source are deduplicated, their native
//! scores normalized to [0, 1] per source kind (so no kind dominates
//! purely through scale), and combined with a fixed descending
//! evidence-level weight table into one composite score. The final order
//! is total and deterministic: composite score descending, then more
//! recent publication date, then external identifier — independent of
//! the arrival order of concurrent source responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Candidate, EvidenceLevel, RankedResult, SourceKind};

/// Ranker configuration.
///
/// `evidence_weight + relevance_weight` should sum to 1; the builder
/// validates this. The level weight table must be strictly descending so
/// stronger evidence never ranks below weaker evidence at equal native
/// score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    pub evidence_weight: f64,
    pub relevance_weight: f64,
    /// Weight per evidence level, index 0 = level 1
    pub level_weights: [f64; 5],
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            evidence_weight: 0.6,
            relevance_weight: 0.4,
            level_weights: [1.0, 0.85, 0.65, 0.45, 0.25],
        }
    }
}

impl RankerConfig {
    pub fn level_weight(&self, level: EvidenceLevel) -> f64 {
        self.level_weights[(level.ordinal() - 1) as usize]
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.evidence_weight < 0.0 || self.relevance_weight < 0.0 {
            return Err("ranker weights must be non-negative".to_string());
        }
        if (self.evidence_weight + self.relevance_weight) <= f64::EPSILON {
            return Err("ranker weights must not both be zero".to_string());
        }
        if self.level_weights.windows(2).any(|w| w[0] <= w[1]) {
            return Err("evidence level weights must be strictly descending".to_string());
        }
        Ok(())
    }
}

/// Merges multi-source candidates into one ranked list
pub struct EvidenceRanker {
    config: RankerConfig,
}

impl EvidenceRanker {
    pub fn new() -> Self {
        Self::with_config(RankerConfig::default())
    }

    pub fn with_config(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Merge, deduplicate, score and order candidates. The output length
    /// is bounded by the input length minus duplicates.
    pub fn rank(
        &self,
        candidates: Vec<Candidate>,
        min_evidence_level: Option<EvidenceLevel>,
    ) -> Vec<RankedResult> {
        let deduped = dedupe(candidates);

        let filtered: Vec<Candidate> = match min_evidence_level {
            Some(minimum) => deduped
                .into_iter()
                .filter(|c| c.evidence_level.meets(minimum))
                .collect(),
            None => deduped,
        };

        let normalized = normalize_per_kind(&filtered);

        let mut results: Vec<RankedResult> = filtered
            .into_iter()
            .zip(normalized)
            .map(|(candidate, native_norm)| {
                let composite = self.config.evidence_weight
                    * self.config.level_weight(candidate.evidence_level)
                    + self.config.relevance_weight * native_norm;
                RankedResult {
                    candidate,
                    composite_score: composite,
                    rank: 0,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| b.candidate.published_at.cmp(&a.candidate.published_at))
                .then_with(|| a.candidate.external_id.cmp(&b.candidate.external_id))
        });

        for (rank, result) in results.iter_mut().enumerate() {
            result.rank = rank;
        }
        results
    }
}

impl Default for EvidenceRanker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep exactly one candidate per external identifier.
///
/// The survivor is chosen by an order-independent preference (higher
/// native score, then stronger evidence, then newer publication, then
/// source kind, then content) so the merged result does not depend on
/// which source responded first.
fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut by_id: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        match by_id.get(&candidate.external_id) {
            Some(existing) if !prefer(&candidate, existing) => {}
            _ => {
                by_id.insert(candidate.external_id.clone(), candidate);
            }
        }
    }
    by_id.into_values().collect()
}

fn prefer(a: &Candidate, b: &Candidate) -> bool {
    a.native_score
        .total_cmp(&b.native_score)
        .then_with(|| b.evidence_level.ordinal().cmp(&a.evidence_level.ordinal()))
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| b.source.cmp(&a.source))
        .then_with(|| b.content.cmp(&a.content))
        .is_gt()
}

/// Min-max normalize native scores within each source kind. A kind whose
/// scores are all equal maps to 1.0 rather than zeroing its only signal.
fn normalize_per_kind(candidates: &[Candidate]) -> Vec<f64> {
    let mut bounds: HashMap<SourceKind, (f64, f64)> = HashMap::new();
    for candidate in candidates {
        let entry = bounds
            .entry(candidate.source)
            .or_insert((candidate.native_score, candidate.native_score));
        entry.0 = entry.0.min(candidate.native_score);
        entry.1 = entry.1.max(candidate.native_score);
    }

    candidates
        .iter()
        .map(|candidate| {
            let (min, max) = bounds[&candidate.source];
            if (max - min).abs() <= f64::EPSILON {
                1.0
            } else {
                (candidate.native_score - min) / (max - min)
            }
        })
        .collect()
}
