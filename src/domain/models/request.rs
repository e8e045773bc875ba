use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ClassifyError;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_POOL_SIZE: usize = 20;

const MAX_QUERY_LEN: usize = 2000;
const MAX_TOP_K: usize = 20;
const MIN_POOL_SIZE: usize = 5;
const MAX_POOL_SIZE: usize = 100;

/// Pipeline routing mode: `Fast` ranks by fused retrieval score alone,
/// `HighFidelity` adds the LLM re-ranking stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    Fast,
    HighFidelity,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::HighFidelity
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "FAST"),
            Self::HighFidelity => write!(f, "HIGH_FIDELITY"),
        }
    }
}

/// A single classification request. The query is trimmed at construction;
/// all other parameters carry defaults and are range-checked by [`validate`].
///
/// [`validate`]: SearchRequest::validate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    query: String,
    mode: SearchMode,
    top_k: usize,
    pool_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into().trim().to_string(),
            mode: SearchMode::default(),
            top_k: DEFAULT_TOP_K,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Check the request invariants. Violations are reported as
    /// [`ClassifyError::Configuration`].
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.query.is_empty() {
            return Err(ClassifyError::configuration("query must not be empty"));
        }
        if self.query.chars().count() > MAX_QUERY_LEN {
            return Err(ClassifyError::configuration(format!(
                "query exceeds {} characters",
                MAX_QUERY_LEN
            )));
        }
        if self.top_k < 1 || self.top_k > MAX_TOP_K {
            return Err(ClassifyError::configuration(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, self.top_k
            )));
        }
        if self.pool_size < MIN_POOL_SIZE || self.pool_size > MAX_POOL_SIZE {
            return Err(ClassifyError::configuration(format!(
                "pool_size must be between {} and {}, got {}",
                MIN_POOL_SIZE, MAX_POOL_SIZE, self.pool_size
            )));
        }
        if self.pool_size < self.top_k {
            return Err(ClassifyError::configuration(format!(
                "pool_size ({}) must be at least top_k ({})",
                self.pool_size, self.top_k
            )));
        }
        Ok(())
    }
}
