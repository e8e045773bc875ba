use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::CatalogueRepository;
use crate::domain::{ClassifyError, CodeRecord, CodeSummary};

/// Brute-force catalogue held in memory. Mirrors the DuckDB adapter's
/// ranking semantics (cosine distance ascending, lexical relevance
/// descending) so the pipeline can be exercised without a database file.
pub struct InMemoryCatalogueRepository {
    entries: Vec<(CodeRecord, Vec<f32>)>,
}

impl InMemoryCatalogueRepository {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: CodeRecord, embedding: Vec<f32>) {
        self.entries.push((record, embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }

    /// Term-overlap relevance: description matches weigh double the
    /// enriched-text matches.
    fn lexical_score(record: &CodeRecord, terms: &[String]) -> f32 {
        let description = record.description().to_lowercase();
        let enriched = record.enriched_text().to_lowercase();
        let mut score = 0.0;
        for term in terms {
            if description.contains(term.as_str()) {
                score += 2.0;
            }
            if enriched.contains(term.as_str()) {
                score += 1.0;
            }
        }
        score
    }
}

impl Default for InMemoryCatalogueRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogueRepository for InMemoryCatalogueRepository {
    async fn vector_search(
        &self,
        embedding: &[f32],
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        let mut scored: Vec<(&str, f32)> = self
            .entries
            .iter()
            .map(|(record, vector)| {
                (record.code(), Self::cosine_similarity(embedding, vector))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        Ok(scored
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, (code, _))| (code.to_string(), i + 1))
            .collect())
    }

    async fn fts_search(
        &self,
        query_text: &str,
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        let terms: Vec<String> = query_text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let mut scored: Vec<(&str, f32)> = self
            .entries
            .iter()
            .filter_map(|(record, _)| {
                let score = Self::lexical_score(record, &terms);
                (score > 0.0).then_some((record.code(), score))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        Ok(scored
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, (code, _))| (code.to_string(), i + 1))
            .collect())
    }

    async fn fetch_by_codes(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, CodeRecord>, ClassifyError> {
        let mut records = HashMap::new();
        for (record, _) in &self.entries {
            if codes.iter().any(|c| c == record.code()) {
                records.insert(record.code().to_string(), record.clone());
            }
        }
        Ok(records)
    }

    async fn all_codes(&self) -> Result<Vec<CodeSummary>, ClassifyError> {
        let mut summaries: Vec<CodeSummary> =
            self.entries.iter().map(|(record, _)| record.summary()).collect();
        summaries.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(summaries)
    }

    async fn healthcheck(&self) -> bool {
        !self.entries.is_empty()
    }
}
