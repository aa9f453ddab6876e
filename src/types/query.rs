//! Query and the source/evidence vocabulary it is expressed in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default overall time budget for one request (30 seconds)
const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(30);

/// The kinds of external knowledge sources the engine can consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Semantic passage index (opaque embedding-backed search)
    PassageIndex,
    /// Structured drug records (nomenclature, interactions)
    DrugRecord,
    /// Clinical trial registry records
    TrialRecord,
    /// Consumer-level health summaries
    ConsumerSummary,
}

impl SourceKind {
    /// Every configured source kind, in canonical order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::PassageIndex,
        SourceKind::DrugRecord,
        SourceKind::TrialRecord,
        SourceKind::ConsumerSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PassageIndex => "passage-index",
            SourceKind::DrugRecord => "drug-record",
            SourceKind::TrialRecord => "trial-record",
            SourceKind::ConsumerSummary => "consumer-summary",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// `SourceKind` appears in `EngineError` variants in fields named `source`,
// which thiserror treats as the error's underlying source and therefore
// requires to implement `std::error::Error`. The enum already provides
// `Debug` and `Display`, so the trait impl is a no-op.
impl std::error::Error for SourceKind {}

/// Ordinal ranking of study/document quality.
///
/// Level 1 (systematic review / meta-analysis) is the strongest evidence,
/// level 5 (expert opinion / unclassified) the weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceLevel {
    SystematicReview,
    RandomizedTrial,
    ObservationalStudy,
    CaseReport,
    ExpertOpinion,
}

impl EvidenceLevel {
    /// Ordinal value, 1 (strongest) through 5 (weakest)
    pub fn ordinal(self) -> u8 {
        match self {
            EvidenceLevel::SystematicReview => 1,
            EvidenceLevel::RandomizedTrial => 2,
            EvidenceLevel::ObservationalStudy => 3,
            EvidenceLevel::CaseReport => 4,
            EvidenceLevel::ExpertOpinion => 5,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(EvidenceLevel::SystematicReview),
            2 => Some(EvidenceLevel::RandomizedTrial),
            3 => Some(EvidenceLevel::ObservationalStudy),
            4 => Some(EvidenceLevel::CaseReport),
            5 => Some(EvidenceLevel::ExpertOpinion),
            _ => None,
        }
    }

    /// Whether this level satisfies a minimum-quality filter.
    ///
    /// A lower ordinal is stronger evidence, so level 2 meets a minimum
    /// of level 3 but not the other way around.
    pub fn meets(self, minimum: EvidenceLevel) -> bool {
        self.ordinal() <= minimum.ordinal()
    }
}

/// A free-text medical query with its retrieval constraints.
///
/// Immutable once created; build with [`Query::new`] and the consuming
/// `with_*` setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    text: String,
    language: String,
    source_filter: Option<Vec<SourceKind>>,
    min_evidence_level: Option<EvidenceLevel>,
    time_budget: Duration,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: "en".to_string(),
            source_filter: None,
            min_evidence_level: None,
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Restrict retrieval to the given source kinds
    pub fn with_source_filter(mut self, kinds: Vec<SourceKind>) -> Self {
        self.source_filter = Some(kinds);
        self
    }

    /// Drop candidates weaker than the given evidence level
    pub fn with_min_evidence_level(mut self, level: EvidenceLevel) -> Self {
        self.min_evidence_level = Some(level);
        self
    }

    /// Overall deadline for the request
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source_filter(&self) -> Option<&[SourceKind]> {
        self.source_filter.as_deref()
    }

    pub fn min_evidence_level(&self) -> Option<EvidenceLevel> {
        self.min_evidence_level
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }
}
