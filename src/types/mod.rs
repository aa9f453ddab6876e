//! Shared data model for the retrieval engine.
//!
//! `Query` is owned by the caller for the request's lifetime; everything
//! else is created by the engine for a single request and never shared
//! across requests.

pub mod answer;
pub mod query;

pub use answer::{Answer, Candidate, Citation, Confidence, RankedResult};
pub use query::{EvidenceLevel, Query, SourceKind};
