//! Query intent and safety triage.
//!
//! The emergency check is a deterministic keyword match and runs
//! synchronously with no network dependency: it gates whether any
//! retrieval happens at all. Non-emergency queries fall through to a
//! rule-set intent classification; anything the rules cannot place
//! defaults to [`Intent::Unclassified`], which the router treats as
//! "query all sources".

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Answer, Confidence, Query};

/// Intent bucket consumed by the source router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    GeneralInformation,
    DrugInteraction,
    TrialSearch,
    Emergency,
    Unclassified,
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub is_emergency: bool,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Maintained emergency-indicator list, matched case-insensitively
    pub emergency_indicators: Vec<String>,
    /// Fixed safety response returned when an emergency is detected
    pub safety_message: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            emergency_indicators: [
                "chest pain",
                "heart attack",
                "stroke",
                "severe bleeding",
                "suicidal",
                "suicide",
                "overdose",
                "unconscious",
                "not breathing",
                "can't breathe",
                "cannot breathe",
                "difficulty breathing",
                "anaphylaxis",
                "seizure",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            safety_message: "Your question may describe a medical emergency. \
                Please call your local emergency number or seek immediate care \
                now. This service cannot provide emergency assistance."
                .to_string(),
        }
    }
}

/// Intent and safety triage for raw queries
pub struct QueryClassifier {
    config: ClassifierConfig,
}

impl QueryClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a query. Synchronous and allocation-light; never touches
    /// the network.
    pub fn classify(&self, query: &Query) -> Classification {
        let text = query.text().to_lowercase();

        if self.is_emergency(&text) {
            return Classification {
                intent: Intent::Emergency,
                is_emergency: true,
            };
        }

        Classification {
            intent: self.detect_intent(&text),
            is_emergency: false,
        }
    }

    /// The fixed safety answer for emergency queries: high confidence,
    /// no citations, no retrieval performed.
    pub fn safety_answer(&self, request_id: Uuid) -> Answer {
        Answer {
            request_id,
            text: self.config.safety_message.clone(),
            sources: Vec::new(),
            citations: Vec::new(),
            confidence: Confidence::High,
            degraded: false,
        }
    }

    fn is_emergency(&self, text_lower: &str) -> bool {
        self.config
            .emergency_indicators
            .iter()
            .any(|indicator| text_lower.contains(indicator.as_str()))
    }

    fn detect_intent(&self, text_lower: &str) -> Intent {
        // Interaction phrasing outranks the other buckets: a question
        // about combining drugs routes to the structured record source
        // even if it also mentions symptoms.
        const INTERACTION: [&str; 5] = [
            "interaction",
            "interact",
            "taken together",
            "combined with",
            "together with",
        ];
        const TRIAL: [&str; 5] = [
            "clinical trial",
            "trial",
            "enroll",
            "recruiting",
            "study participation",
        ];
        const GENERAL: [&str; 9] = [
            "what is",
            "what are",
            "symptom",
            "treatment",
            "side effect",
            "dosage",
            "dose",
            "causes of",
            "how to",
        ];

        if INTERACTION.iter().any(|kw| text_lower.contains(kw)) {
            Intent::DrugInteraction
        } else if TRIAL.iter().any(|kw| text_lower.contains(kw)) {
            Intent::TrialSearch
        } else if GENERAL.iter().any(|kw| text_lower.contains(kw)) {
            Intent::GeneralInformation
        } else {
            Intent::Unclassified
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Classification {
        QueryClassifier::new().classify(&Query::new(text))
    }

    #[test]
    fn test_emergency_detection() {
        let result = classify("chest pain for three days");
        assert!(result.is_emergency);
        assert_eq!(result.intent, Intent::Emergency);
    }

    #[test]
    fn test_emergency_is_case_insensitive() {
        assert!(classify("Severe Bleeding after a fall").is_emergency);
    }

    #[test]
    fn test_drug_interaction_intent() {
        let result = classify("interaction between warfarin and aspirin");
        assert!(!result.is_emergency);
        assert_eq!(result.intent, Intent::DrugInteraction);
    }

    #[test]
    fn test_trial_search_intent() {
        let result = classify("recruiting clinical trial for metformin");
        assert_eq!(result.intent, Intent::TrialSearch);
    }

    #[test]
    fn test_general_information_intent() {
        let result = classify("what is hypertension");
        assert_eq!(result.intent, Intent::GeneralInformation);
    }

    #[test]
    fn test_unclassified_fallback() {
        let result = classify("metformin warfarin lisinopril");
        assert_eq!(result.intent, Intent::Unclassified);
    }

    #[test]
    fn test_safety_answer_shape() {
        let classifier = QueryClassifier::new();
        let answer = classifier.safety_answer(Uuid::new_v4());
        assert_eq!(answer.confidence, Confidence::High);
        assert!(answer.citations.is_empty());
        assert!(answer.sources.is_empty());
        assert!(!answer.degraded);
        assert!(answer.text.contains("emergency"));
    }

    #[test]
    fn test_custom_indicator_list() {
        let config = ClassifierConfig {
            emergency_indicators: vec!["sepsis".to_string()],
            ..Default::default()
        };
        let classifier = QueryClassifier::with_config(config);
        let result = classifier.classify(&Query::new("possible sepsis symptoms"));
        assert!(result.is_emergency);
        // The default list no longer applies
        let result = classifier.classify(&Query::new("chest pain"));
        assert!(!result.is_emergency);
    }
}
