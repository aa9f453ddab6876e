//! Query enhancement via the text-completion capability.
//!
//! Enhancement rewrites colloquial queries into retrieval-friendly
//! phrasing. It is strictly best-effort: on timeout, error, or an
//! unusable completion the original query is used unchanged — an
//! enhancement failure must never fail the overall request. Enhancement
//! runs after classification and feeds only the gateway fetch text, so
//! it cannot change the router's source selection.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::Intent;
use crate::sources::CompletionCapability;

/// Enhancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerConfig {
    /// Bound on the completion call, clamped to the remaining request
    /// budget
    pub timeout_ms: u64,
    pub enabled: bool,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            enabled: true,
        }
    }
}

/// Enhancement output: always carries the original, optionally a rewrite
#[derive(Debug, Clone)]
pub struct EnhancedQuery {
    pub original: String,
    pub rewritten: Option<String>,
}

impl EnhancedQuery {
    /// The text the gateways should be queried with
    pub fn primary(&self) -> &str {
        self.rewritten.as_deref().unwrap_or(&self.original)
    }

    pub fn variants(&self) -> Vec<&str> {
        let mut variants = vec![self.original.as_str()];
        if let Some(rewritten) = &self.rewritten {
            variants.push(rewritten.as_str());
        }
        variants
    }
}

/// Query rewriter backed by the completion capability
pub struct QueryEnhancer {
    completion: Arc<dyn CompletionCapability>,
    config: EnhancerConfig,
}

impl QueryEnhancer {
    pub fn new(completion: Arc<dyn CompletionCapability>) -> Self {
        Self::with_config(completion, EnhancerConfig::default())
    }

    pub fn with_config(completion: Arc<dyn CompletionCapability>, config: EnhancerConfig) -> Self {
        Self { completion, config }
    }

    /// Rewrite `text` for retrieval, bounded by the smaller of the
    /// configured timeout and `remaining`.
    pub async fn enhance(&self, text: &str, intent: Intent, remaining: Duration) -> EnhancedQuery {
        let original = text.to_string();

        if !self.config.enabled {
            return EnhancedQuery {
                original,
                rewritten: None,
            };
        }

        let budget = Duration::from_millis(self.config.timeout_ms).min(remaining);
        if budget.is_zero() {
            return EnhancedQuery {
                original,
                rewritten: None,
            };
        }

        let prompt = build_rewrite_prompt(text, intent);
        let completion = tokio::time::timeout(budget, self.completion.complete(&prompt, &[])).await;

        let rewritten = match completion {
            Ok(Ok(raw)) => sanitize_rewrite(&raw, text),
            Ok(Err(err)) => {
                debug!(error = %err, "query enhancement failed, using original");
                None
            }
            Err(_) => {
                debug!(timeout_ms = budget.as_millis() as u64, "query enhancement timed out");
                None
            }
        };

        EnhancedQuery {
            original,
            rewritten,
        }
    }
}

fn build_rewrite_prompt(text: &str, intent: Intent) -> String {
    let focus = match intent {
        Intent::DrugInteraction => "drug names and interaction terminology",
        Intent::TrialSearch => "condition, phase and enrollment terminology",
        Intent::GeneralInformation => "clinical terminology for the condition",
        Intent::Emergency | Intent::Unclassified => "precise medical terminology",
    };
    format!(
        "Rewrite the following medical search query using {}. \
         Keep it one line, preserve its meaning, add no commentary.\n\
         Query: {}",
        focus, text
    )
}

/// Accept only a plausible single-line rewrite; anything else falls back
fn sanitize_rewrite(raw: &str, original: &str) -> Option<String> {
    let line = raw.lines().find(|l| !l.trim().is_empty())?.trim();
    if line.is_empty() || line.len() > 300 || line.eq_ignore_ascii_case(original.trim()) {
        return None;
    }
    Some(line.to_string())
}
