//! Citation alignment between generated answer text and ranked evidence.
//!
//! The answer text is segmented into sentence spans. A span cites every
//! grounding result whose content shares enough of the span's
//! significant terms; markers are assigned in order of first appearance.
//! Results never matched stay in the answer's source list without a
//! marker. The overlap threshold is a tunable parameter — tests pin it
//! rather than assume a particular constant is canonical.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Citation, RankedResult};

/// Citation builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Fraction of a span's significant terms that must appear in a
    /// result's content for the span to cite it
    pub overlap_threshold: f64,
    /// Spans with fewer significant terms than this are not attributed
    pub min_span_terms: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.35,
            min_span_terms: 2,
        }
    }
}

/// Aligns answer text to the results used as grounding context
pub struct CitationBuilder {
    config: CitationConfig,
}

impl CitationBuilder {
    pub fn new() -> Self {
        Self::with_config(CitationConfig::default())
    }

    pub fn with_config(config: CitationConfig) -> Self {
        Self { config }
    }

    /// Build citations for `text` against `results`. Returns an empty
    /// list when nothing overlaps; the composer then forces the answer's
    /// confidence to insufficient-evidence.
    pub fn build(&self, text: &str, results: &[RankedResult]) -> Vec<Citation> {
        let result_terms: Vec<HashSet<String>> = results
            .iter()
            .map(|r| significant_terms(&r.candidate.content).into_iter().collect())
            .collect();

        let mut citations = Vec::new();
        let mut marker = 0;

        for (start, end) in sentence_spans(text) {
            let span_terms = significant_terms(&text[start..end]);
            if span_terms.len() < self.config.min_span_terms {
                continue;
            }

            let mut cited_ids = Vec::new();
            for (result, terms) in results.iter().zip(&result_terms) {
                if overlap(&span_terms, terms) >= self.config.overlap_threshold {
                    cited_ids.push(result.candidate.external_id.clone());
                }
            }

            if !cited_ids.is_empty() {
                marker += 1;
                citations.push(Citation {
                    marker,
                    start,
                    end,
                    result_ids: cited_ids,
                });
            }
        }

        citations
    }
}

impl Default for CitationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of span terms found in the result's term set
fn overlap(span_terms: &[String], result_terms: &HashSet<String>) -> f64 {
    if span_terms.is_empty() {
        return 0.0;
    }
    let matched = span_terms
        .iter()
        .filter(|term| result_terms.contains(*term))
        .count();
    matched as f64 / span_terms.len() as f64
}

/// Lowercased alphanumeric terms longer than three characters
fn significant_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .map(|word| word.to_lowercase())
        .collect();
    terms.dedup();
    terms
}

/// Byte-offset spans of sentences, split on terminators and newlines.
/// Spans exclude the terminator and surrounding whitespace.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut span_start: Option<usize> = None;
    let mut last_non_space = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            if let Some(start) = span_start.take() {
                if last_non_space > start {
                    spans.push((start, last_non_space));
                }
            }
        } else if !ch.is_whitespace() {
            if span_start.is_none() {
                span_start = Some(idx);
            }
            last_non_space = idx + ch.len_utf8();
        }
    }
    if let Some(start) = span_start {
        if last_non_space > start {
            spans.push((start, last_non_space));
        }
    }
    spans
}
