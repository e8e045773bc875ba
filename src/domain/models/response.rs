use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Candidate, SearchMode, SearchRequest};

/// One ranked classification, enriched with catalogue context and a
/// natural-language justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResult {
    rank: usize,
    code: String,
    description: String,
    class_desc: String,
    division_desc: String,
    reason: String,
    rrf_score: f32,
}

impl ClassifyResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rank: usize,
        code: impl Into<String>,
        description: impl Into<String>,
        class_desc: impl Into<String>,
        division_desc: impl Into<String>,
        reason: impl Into<String>,
        rrf_score: f32,
    ) -> Self {
        Self {
            rank,
            code: code.into(),
            description: description.into(),
            class_desc: class_desc.into(),
            division_desc: division_desc.into(),
            reason: reason.into(),
            rrf_score,
        }
    }

    pub fn from_candidate(rank: usize, candidate: &Candidate, reason: impl Into<String>) -> Self {
        Self::new(
            rank,
            candidate.code(),
            candidate.description(),
            candidate.class_desc(),
            candidate.division_desc(),
            reason,
            candidate.rrf_score(),
        )
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn class_desc(&self) -> &str {
        &self.class_desc
    }

    pub fn division_desc(&self) -> &str {
        &self.division_desc
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn rrf_score(&self) -> f32 {
        self.rrf_score
    }
}

/// The full classification outcome for one request, with provenance of
/// the models that actually produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    query: String,
    mode: SearchMode,
    top_k_requested: usize,
    candidates_retrieved: usize,
    results: Vec<ClassifyResult>,
    generated_at: DateTime<Utc>,
    embed_model: String,
    llm_model: String,
}

impl ClassifyResponse {
    pub fn new(
        request: &SearchRequest,
        candidates_retrieved: usize,
        results: Vec<ClassifyResult>,
        embed_model: impl Into<String>,
        llm_model: impl Into<String>,
    ) -> Self {
        Self {
            query: request.query().to_string(),
            mode: request.mode(),
            top_k_requested: request.top_k(),
            candidates_retrieved,
            results,
            generated_at: Utc::now(),
            embed_model: embed_model.into(),
            llm_model: llm_model.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn top_k_requested(&self) -> usize {
        self.top_k_requested
    }

    pub fn candidates_retrieved(&self) -> usize {
        self.candidates_retrieved
    }

    pub fn results(&self) -> &[ClassifyResult] {
        &self.results
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }
}
