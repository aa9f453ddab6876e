//! medcite — evidence-ranked retrieval and citation engine for medical
//! queries.
//!
//! Given a free-text query, the engine gathers candidate evidence from
//! heterogeneous knowledge sources, merges and ranks the candidates by
//! evidentiary strength, produces a grounded answer via an injected
//! text-completion capability, and attaches verifiable citations mapping
//! answer spans back to source material.
//!
//! # Architecture
//!
//! - `classify` — intent and safety triage; emergencies short-circuit
//!   all retrieval
//! - `enhance` — best-effort query rewriting with deterministic fallback
//! - `routing` — static intent → source-kind selection
//! - `gateway` — per-source resilience: cache, coalescing, rate limit,
//!   retry, circuit breaker
//! - `ranking` — multi-source merge into one deterministic evidence order
//! - `citation` — span-level alignment of answer text to evidence
//! - `compose` — one-request orchestration behind the [`Engine`] façade

pub mod errors;
pub mod types;
pub mod config;
pub mod classify;
pub mod enhance;
pub mod routing;
pub mod sources;
pub mod gateway;
pub mod ranking;
pub mod citation;
pub mod compose;
pub mod telemetry;

// Re-export commonly used types
pub use compose::{AnswerComposer, Engine, EngineBuilder};
pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use types::{Answer, Candidate, Citation, Confidence, EvidenceLevel, Query, RankedResult, SourceKind};
