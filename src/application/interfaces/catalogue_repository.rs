use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{ClassifyError, CodeRecord, CodeSummary};

/// Read-only query surface over the pre-ingested catalogue.
///
/// Both searches return `(code, rank)` pairs with ranks starting at 1 and
/// strictly increasing; `vector_search` ranks by cosine distance ascending,
/// `fts_search` by the store's lexical relevance descending.
#[async_trait]
pub trait CatalogueRepository: Send + Sync {
    async fn vector_search(
        &self,
        embedding: &[f32],
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError>;

    async fn fts_search(
        &self,
        query_text: &str,
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError>;

    /// Hydrate codes into full records in one round trip. The mapping is
    /// unordered and may omit codes the store no longer holds.
    async fn fetch_by_codes(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, CodeRecord>, ClassifyError>;

    /// Every catalogue code with its short description, for the re-ranker's
    /// catalogue-wide fallback prompt.
    async fn all_codes(&self) -> Result<Vec<CodeSummary>, ClassifyError>;

    async fn healthcheck(&self) -> bool;
}
