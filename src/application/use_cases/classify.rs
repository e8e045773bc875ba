use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::{HybridRetriever, LlmReranker};
use crate::domain::{
    Candidate, ClassifyError, ClassifyResponse, ClassifyResult, SearchMode, SearchRequest,
};

/// Front door of the classifier: validates the request, runs retrieval,
/// routes by mode and assembles the response with model provenance.
///
/// Stateless per call; safe to share across concurrent callers whenever
/// the wrapped adapters are.
pub struct ClassifierPipeline {
    retriever: HybridRetriever,
    reranker: LlmReranker,
}

impl ClassifierPipeline {
    pub fn new(retriever: HybridRetriever, reranker: LlmReranker) -> Self {
        Self {
            retriever,
            reranker,
        }
    }

    pub async fn classify(
        &self,
        request: &SearchRequest,
    ) -> Result<ClassifyResponse, ClassifyError> {
        request.validate()?;
        info!(
            "Classifying \"{}\" (mode {}, top_k {}, pool {})",
            request.query(),
            request.mode(),
            request.top_k(),
            request.pool_size()
        );

        let candidates = self
            .retriever
            .retrieve(request.query(), request.pool_size())
            .await?;

        let results = match request.mode() {
            SearchMode::Fast => Self::adapt_candidates(&candidates, request.top_k()),
            SearchMode::HighFidelity => {
                if candidates.is_empty() {
                    // Nothing to rank; skip the LLM round trip entirely.
                    Vec::new()
                } else {
                    self.reranker
                        .rerank(request.query(), &candidates, request.top_k())
                        .await?
                }
            }
        };

        Ok(ClassifyResponse::new(
            request,
            candidates.len(),
            results,
            self.retriever.embedding_model(),
            self.reranker.model_name(),
        ))
    }

    /// Like [`classify`], but aborts at the next suspension point once the
    /// token fires, reporting [`ClassifyError::Cancelled`].
    ///
    /// [`classify`]: ClassifierPipeline::classify
    pub async fn classify_with_cancellation(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<ClassifyResponse, ClassifyError> {
        tokio::select! {
            () = cancel.cancelled() => Err(ClassifyError::Cancelled),
            response = self.classify(request) => response,
        }
    }

    /// Fast-mode adaptation: first `top_k` candidates in fused order, with
    /// a deterministic machine reason in place of an LLM justification.
    fn adapt_candidates(candidates: &[Candidate], top_k: usize) -> Vec<ClassifyResult> {
        candidates
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(i, candidate)| {
                let reason = format!(
                    "RRF score {}; sources: {}",
                    candidate.rrf_score(),
                    candidate.source_label()
                );
                ClassifyResult::from_candidate(i + 1, candidate, reason)
            })
            .collect()
    }
}
