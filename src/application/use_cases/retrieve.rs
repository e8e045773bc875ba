use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::{rrf_fuse, CatalogueRepository, EmbeddingService, DEFAULT_RRF_K};
use crate::domain::{Candidate, ClassifyError};

/// Stage 1: embed the query, run the vector and lexical searches
/// concurrently, fuse with RRF and hydrate the surviving codes.
pub struct HybridRetriever {
    catalogue: Arc<dyn CatalogueRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    rrf_k: f32,
    allow_degraded: bool,
}

impl HybridRetriever {
    pub fn new(
        catalogue: Arc<dyn CatalogueRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            catalogue,
            embedding_service,
            rrf_k: DEFAULT_RRF_K,
            allow_degraded: false,
        }
    }

    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    /// Continue on the surviving leg when exactly one search fails.
    /// Off by default: a half-failed pair degrades precision silently,
    /// so the strict policy surfaces it as a retrieval failure instead.
    pub fn with_degraded_retrieval(mut self, allow: bool) -> Self {
        self.allow_degraded = allow;
        self
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding_service.model_name()
    }

    pub async fn retrieve(
        &self,
        query: &str,
        pool_size: usize,
    ) -> Result<Vec<Candidate>, ClassifyError> {
        info!("Retrieving candidate pool for: {}", query);
        let start_time = Instant::now();

        let query_embedding = self.embedding_service.embed_query(query).await?;
        debug!(
            "Generated query embedding with {} dimensions",
            query_embedding.len()
        );

        let (vector_hits, fts_hits) = tokio::join!(
            self.catalogue.vector_search(&query_embedding, pool_size),
            self.catalogue.fts_search(query, pool_size),
        );
        let (vector_hits, fts_hits) = self.reconcile(vector_hits, fts_hits)?;

        debug!(
            "Fusing {} vector + {} lexical hits",
            vector_hits.len(),
            fts_hits.len()
        );

        let mut fused = rrf_fuse(&vector_hits, &fts_hits, self.rrf_k);
        fused.truncate(pool_size);

        if fused.is_empty() {
            info!("Both search legs returned nothing for: {}", query);
            return Ok(vec![]);
        }

        let codes: Vec<String> = fused.iter().map(|e| e.code().to_string()).collect();
        let mut records = self.catalogue.fetch_by_codes(&codes).await?;

        // fetch_by_codes gives no ordering guarantee; reorder to the fused
        // ranking and drop codes the store no longer holds.
        let mut candidates = Vec::with_capacity(fused.len());
        let mut missing = 0usize;
        for entry in &fused {
            match records.remove(entry.code()) {
                Some(record) => candidates.push(Candidate::new(
                    record,
                    entry.score(),
                    entry.vector_rank(),
                    entry.fts_rank(),
                )),
                None => missing += 1,
            }
        }

        if candidates.is_empty() {
            return Err(ClassifyError::retrieval(format!(
                "hydration returned none of {} fused codes",
                fused.len()
            )));
        }
        if missing > 0 {
            warn!("{} fused codes were missing from the catalogue", missing);
        }

        info!(
            "Retrieved {} candidates in {:.2}s",
            candidates.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(candidates)
    }

    /// Strict by default: one leg failing while the other succeeds is a
    /// retrieval failure. Both failing propagates the adapter error as-is.
    fn reconcile(
        &self,
        vector: Result<Vec<(String, usize)>, ClassifyError>,
        fts: Result<Vec<(String, usize)>, ClassifyError>,
    ) -> Result<(Vec<(String, usize)>, Vec<(String, usize)>), ClassifyError> {
        match (vector, fts) {
            (Ok(v), Ok(f)) => Ok((v, f)),
            (Err(e), Err(_)) => Err(e),
            (Err(e), Ok(f)) => {
                if self.allow_degraded {
                    warn!("Vector search failed, continuing on lexical hits only: {}", e);
                    Ok((vec![], f))
                } else {
                    Err(ClassifyError::retrieval(format!(
                        "vector search failed while lexical search succeeded: {}",
                        e
                    )))
                }
            }
            (Ok(v), Err(e)) => {
                if self.allow_degraded {
                    warn!("Lexical search failed, continuing on vector hits only: {}", e);
                    Ok((v, vec![]))
                } else {
                    Err(ClassifyError::retrieval(format!(
                        "lexical search failed while vector search succeeded: {}",
                        e
                    )))
                }
            }
        }
    }
}
