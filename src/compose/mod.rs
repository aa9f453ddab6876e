//! Request lifecycle orchestration.
//!
//! One [`AnswerComposer`] drives a query through classification,
//! enhancement, routing, parallel gateway fetches, ranking, generation
//! and citation. No single source or sub-step failure fails the overall
//! request: only a malformed query or a deadline that expires before any
//! source could be attempted is surfaced to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::citation::CitationBuilder;
use crate::classify::QueryClassifier;
use crate::config::EngineConfig;
use crate::enhance::QueryEnhancer;
use crate::errors::{EngineError, Result};
use crate::gateway::{FetchOutcome, SourceGateway};
use crate::ranking::EvidenceRanker;
use crate::routing::SourceRouter;
use crate::sources::{CompletionCapability, PassageSearch, PassageSourceAdapter, SourceClient};
use crate::telemetry::MetricsSnapshot;
use crate::types::{Answer, Citation, Confidence, Query, RankedResult, SourceKind};

/// Composer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Bound on the generation call, clamped to the remaining budget
    pub generation_timeout_ms: u64,
    /// How many top-ranked results are passed as grounding context
    pub context_limit: usize,
    /// Per-result content truncation in the generation prompt
    pub max_context_chars: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            generation_timeout_ms: 10_000,
            context_limit: 8,
            max_context_chars: 1500,
        }
    }
}

/// Orchestrates one request end to end
pub struct AnswerComposer {
    classifier: QueryClassifier,
    enhancer: QueryEnhancer,
    router: SourceRouter,
    gateways: HashMap<SourceKind, Arc<SourceGateway>>,
    ranker: EvidenceRanker,
    citation_builder: CitationBuilder,
    completion: Arc<dyn CompletionCapability>,
    config: ComposeConfig,
}

impl AnswerComposer {
    /// Produce a grounded answer for one query.
    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        let request_id = Uuid::new_v4();

        if query.text().trim().is_empty() {
            return Err(EngineError::InvalidQuery("empty query text".to_string()));
        }

        let deadline = Instant::now() + query.time_budget();

        // Synchronous, network-free triage gates all retrieval.
        let classification = self.classifier.classify(query);
        if classification.is_emergency {
            debug!(%request_id, "emergency short-circuit");
            return Ok(self.classifier.safety_answer(request_id));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(EngineError::DeadlineExceeded {
                budget_ms: query.time_budget().as_millis() as u64,
            });
        }

        let enhanced = self
            .enhancer
            .enhance(query.text(), classification.intent, remaining)
            .await;

        let routes = self
            .router
            .route(classification.intent, query.source_filter());
        if routes.is_empty() {
            debug!(%request_id, intent = ?classification.intent, "no routable sources");
            return Ok(empty_answer(request_id, false));
        }

        let (candidates, degraded) = self.fetch_all(&routes, enhanced.primary(), deadline).await;

        let ranked = self
            .ranker
            .rank(candidates, query.min_evidence_level());
        if ranked.is_empty() {
            return Ok(empty_answer(request_id, degraded));
        }

        let text = match self.generate(query.text(), &ranked, deadline).await {
            Some(text) => text,
            None => {
                // Generation failed: return the evidence without prose
                // rather than failing the request.
                return Ok(Answer {
                    request_id,
                    text: String::new(),
                    sources: ranked,
                    citations: Vec::new(),
                    confidence: Confidence::InsufficientEvidence,
                    degraded,
                });
            }
        };

        let citations = self.citation_builder.build(&text, &ranked);
        let confidence = derive_confidence(&citations, &ranked);

        Ok(Answer {
            request_id,
            text,
            sources: ranked,
            citations,
            confidence,
            degraded,
        })
    }

    /// Snapshot of every gateway's introspection counters
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut sources: Vec<_> = self
            .gateways
            .values()
            .map(|gateway| gateway.snapshot())
            .collect();
        sources.sort_by_key(|s| s.kind);
        MetricsSnapshot { sources }
    }

    /// Dispatch all routed fetches in parallel and collect until every
    /// task returns or the deadline elapses; unfinished fetches are
    /// aborted and counted as degraded.
    async fn fetch_all(
        &self,
        routes: &[crate::routing::Route],
        text: &str,
        deadline: Instant,
    ) -> (Vec<crate::types::Candidate>, bool) {
        let mut inflight = FuturesUnordered::new();
        let mut aborts = Vec::new();
        let mut degraded = false;

        for route in routes {
            let Some(gateway) = self.gateways.get(&route.kind) else {
                // Routed to a source kind with no registered client
                warn!(kind = %route.kind, "route targets an unregistered source");
                degraded = true;
                continue;
            };
            let gateway = gateway.clone();
            let text = text.to_string();
            let k = route.k;
            let handle = tokio::spawn(async move { gateway.fetch(&text, k, deadline).await });
            aborts.push(handle.abort_handle());
            inflight.push(handle);
        }

        let mut candidates = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, inflight.next()).await {
                Ok(Some(Ok(FetchOutcome {
                    candidates: mut fetched,
                    degraded: fetch_degraded,
                }))) => {
                    degraded |= fetch_degraded;
                    candidates.append(&mut fetched);
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "source fetch task failed");
                    degraded = true;
                }
                Ok(None) => break,
                Err(_) => {
                    // Overall deadline: abandon whatever is still in
                    // flight and continue with partial results.
                    for abort in &aborts {
                        abort.abort();
                    }
                    degraded = true;
                    break;
                }
            }
        }

        (candidates, degraded)
    }

    /// One bounded generation call; `None` on error, timeout or an empty
    /// completion
    async fn generate(
        &self,
        question: &str,
        ranked: &[RankedResult],
        deadline: Instant,
    ) -> Option<String> {
        let budget = Duration::from_millis(self.config.generation_timeout_ms)
            .min(deadline.saturating_duration_since(Instant::now()));
        if budget.is_zero() {
            return None;
        }

        let context = self.build_context(ranked);
        let prompt = format!(
            "Answer the medical question using only the numbered context \
             passages. Be factual and concise; do not invent information \
             absent from the context.\nQuestion: {}",
            question
        );

        match tokio::time::timeout(budget, self.completion.complete(&prompt, &context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                debug!("generation returned empty text");
                None
            }
            Ok(Err(err)) => {
                warn!(error = %err, "generation failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = budget.as_millis() as u64, "generation timed out");
                None
            }
        }
    }

    /// Numbered grounding passages for the generation prompt
    fn build_context(&self, ranked: &[RankedResult]) -> Vec<String> {
        ranked
            .iter()
            .take(self.config.context_limit)
            .map(|result| {
                let mut content = result.candidate.content.clone();
                if content.len() > self.config.max_context_chars {
                    let mut cut = self.config.max_context_chars;
                    while !content.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    content.truncate(cut);
                }
                format!(
                    "[{}] (evidence level {}) {}",
                    result.rank + 1,
                    result.candidate.evidence_level.ordinal(),
                    content
                )
            })
            .collect()
    }
}

fn empty_answer(request_id: Uuid, degraded: bool) -> Answer {
    Answer {
        request_id,
        text: String::new(),
        sources: Vec::new(),
        citations: Vec::new(),
        confidence: Confidence::InsufficientEvidence,
        degraded,
    }
}

/// Confidence from the best evidence level among cited results; no
/// citations at all means the answer is not grounded.
fn derive_confidence(citations: &[Citation], ranked: &[RankedResult]) -> Confidence {
    let cited_ids: std::collections::HashSet<&String> = citations
        .iter()
        .flat_map(|c| c.result_ids.iter())
        .collect();

    let best = ranked
        .iter()
        .filter(|r| cited_ids.contains(&r.candidate.external_id))
        .map(|r| r.candidate.evidence_level.ordinal())
        .min();

    match best {
        None => Confidence::InsufficientEvidence,
        Some(1) => Confidence::High,
        Some(2) | Some(3) => Confidence::Moderate,
        Some(_) => Confidence::Low,
    }
}

/// Builds an [`Engine`] from injected capabilities and configuration
pub struct EngineBuilder {
    config: EngineConfig,
    clients: Vec<Arc<dyn SourceClient>>,
    completion: Option<Arc<dyn CompletionCapability>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clients: Vec::new(),
            completion: None,
        }
    }

    /// Register a structured source client. One client per source kind;
    /// a later registration for the same kind replaces the earlier one.
    pub fn with_source(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Register the opaque passage-search capability as a source
    pub fn with_passage_search(self, search: Arc<dyn PassageSearch>) -> Self {
        self.with_source(Arc::new(PassageSourceAdapter::new(search)))
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionCapability>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let completion = self.completion.ok_or_else(|| {
            EngineError::ConfigError("a completion capability is required".to_string())
        })?;
        self.config
            .ranker
            .validate()
            .map_err(EngineError::ConfigError)?;
        if self.clients.is_empty() {
            return Err(EngineError::ConfigError(
                "at least one source client is required".to_string(),
            ));
        }

        let mut gateways = HashMap::new();
        for client in self.clients {
            let gateway = Arc::new(SourceGateway::new(client, &self.config.gateway));
            gateways.insert(gateway.kind(), gateway);
        }

        let composer = AnswerComposer {
            classifier: QueryClassifier::with_config(self.config.classifier),
            enhancer: QueryEnhancer::with_config(completion.clone(), self.config.enhancer),
            router: SourceRouter::with_table(self.config.routing),
            gateways,
            ranker: EvidenceRanker::with_config(self.config.ranker),
            citation_builder: CitationBuilder::with_config(self.config.citation),
            completion,
            config: self.config.compose,
        };

        Ok(Engine { composer })
    }
}

/// Public façade: one operation, `answer`, plus introspection counters
pub struct Engine {
    composer: AnswerComposer,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        self.composer.answer(query).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.composer.metrics()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
