//! # anzsic-classify
//!
//! Classifies free-text occupation and business descriptions into 6-digit
//! ANZSIC unit-group codes via a two-stage pipeline: hybrid retrieval
//! (dense-vector ANN fused with lexical full-text search through
//! Reciprocal Rank Fusion) followed by LLM re-ranking with
//! natural-language justifications.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Value types (request, candidate, result, response) and the error taxonomy
//! - `application`: Port contracts and the retrieval/re-rank/classify pipeline
//! - `connector`: Provider adapters (Vertex AI, Gemini, DuckDB) plus mocks
//! - `config`: Immutable process-wide settings resolved from the environment

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::Settings;
pub use connector::*;
pub use domain::*;
