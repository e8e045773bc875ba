//! # Connector Layer
//!
//! Provider adapters implementing the application ports:
//! - Vertex AI embeddings and Gemini generation behind a shared GCP token cache
//! - DuckDB catalogue store (vector + full-text search)
//! - Deterministic mock and in-memory adapters for tests and offline runs

pub mod adapter;

pub use adapter::*;
