use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;

use crate::application::EmbeddingService;
use crate::domain::ClassifyError;

const DEFAULT_DIMENSIONS: usize = 768;

/// Deterministic embedding stub: each text hashes to a seed that drives a
/// normalized pseudo-random vector, so identical texts always embed
/// identically.
pub struct MockEmbedding {
    model: String,
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            model: "mock-embedding".to_string(),
            dimensions,
        }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ClassifyError> {
        Ok(self.generate_embedding(text))
    }

    async fn embed_document(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<Vec<f32>, ClassifyError> {
        let combined = match title {
            Some(title) => format!("{title} {text}"),
            None => text.to_string(),
        };
        Ok(self.generate_embedding(&combined))
    }

    async fn embed_documents_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ClassifyError> {
        Ok(texts.iter().map(|t| self.generate_embedding(t)).collect())
    }
}
