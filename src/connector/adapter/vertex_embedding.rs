use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::config::Settings;
use crate::connector::adapter::{GcpTokenManager, RetryPolicy};
use crate::domain::ClassifyError;

const TASK_RETRIEVAL_QUERY: &str = "RETRIEVAL_QUERY";
const TASK_RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";

#[derive(serde::Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters,
}

#[derive(serde::Serialize)]
struct Instance<'a> {
    task_type: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    output_dimensionality: usize,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    embeddings: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Vertex AI text-embedding adapter with asymmetric task types: queries
/// embed as `RETRIEVAL_QUERY`, catalogue documents as
/// `RETRIEVAL_DOCUMENT`, so short queries land in the same space as the
/// long enriched texts they search against.
pub struct VertexEmbedding {
    client: reqwest::Client,
    token: Arc<GcpTokenManager>,
    url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl VertexEmbedding {
    pub fn new(
        token: Arc<GcpTokenManager>,
        project: &str,
        location: &str,
        model: impl Into<String>,
        dimensions: usize,
        batch_size: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let model = model.into();
        let url = format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict"
        );
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            token,
            url,
            model,
            dimensions,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        token: Arc<GcpTokenManager>,
    ) -> Result<Self, ClassifyError> {
        let project = settings.gcp_project.as_deref().ok_or_else(|| {
            ClassifyError::configuration("GCP_PROJECT is required for the Vertex embedding adapter")
        })?;
        Ok(Self::new(
            token,
            project,
            &settings.gcp_location,
            settings.embed_model.clone(),
            settings.embed_dim,
            settings.embed_batch_size,
            Duration::from_secs(settings.embed_timeout_secs),
            RetryPolicy::new(settings.embed_retries),
        ))
    }

    async fn predict(&self, instances: Vec<Instance<'_>>) -> Result<Vec<Vec<f32>>, ClassifyError> {
        let body = PredictRequest {
            instances,
            parameters: Parameters {
                output_dimensionality: self.dimensions,
            },
        };

        let mut attempt = 0u32;
        let mut auth_retried = false;
        loop {
            let token = self.token.get_token().await?;
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .map_err(|e| ClassifyError::embedding(format!("request failed: {e}")))?;

            let status = response.status();
            if status.is_success() {
                let parsed: PredictResponse = response.json().await.map_err(|e| {
                    ClassifyError::embedding(format!("failed to parse response: {e}"))
                })?;
                return self.collect_vectors(parsed);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                if !auth_retried {
                    auth_retried = true;
                    warn!("Embedding endpoint returned 401, refreshing token");
                    self.token.invalidate().await;
                    continue;
                }
                return Err(ClassifyError::authentication(
                    "embedding endpoint rejected credentials after refresh",
                ));
            }

            if RetryPolicy::is_retryable(status) && attempt + 1 < self.retry.max_attempts() {
                let delay = self.retry.delay(attempt);
                warn!(
                    "Embedding endpoint returned {status}, retrying in {:.0?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::embedding(format!(
                "API returned {status}: {body_text}"
            )));
        }
    }

    fn collect_vectors(&self, parsed: PredictResponse) -> Result<Vec<Vec<f32>>, ClassifyError> {
        let mut vectors = Vec::with_capacity(parsed.predictions.len());
        for prediction in parsed.predictions {
            let values = prediction.embeddings.values;
            if values.len() != self.dimensions {
                return Err(ClassifyError::embedding(format!(
                    "model returned {} dimensions, expected {}",
                    values.len(),
                    self.dimensions
                )));
            }
            vectors.push(values);
        }
        Ok(vectors)
    }

    fn single(mut vectors: Vec<Vec<f32>>) -> Result<Vec<f32>, ClassifyError> {
        if vectors.len() != 1 {
            return Err(ClassifyError::embedding(format!(
                "expected one embedding, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

#[async_trait]
impl EmbeddingService for VertexEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ClassifyError> {
        let vectors = self
            .predict(vec![Instance {
                task_type: TASK_RETRIEVAL_QUERY,
                content: text,
                title: None,
            }])
            .await?;
        Self::single(vectors)
    }

    async fn embed_document(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<Vec<f32>, ClassifyError> {
        let vectors = self
            .predict(vec![Instance {
                task_type: TASK_RETRIEVAL_DOCUMENT,
                content: text,
                title,
            }])
            .await?;
        Self::single(vectors)
    }

    async fn embed_documents_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ClassifyError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let instances = chunk
                .iter()
                .map(|text| Instance {
                    task_type: TASK_RETRIEVAL_DOCUMENT,
                    content: text,
                    title: None,
                })
                .collect();
            let batch = self.predict(instances).await?;
            debug!("Embedded batch of {}", batch.len());
            vectors.extend(batch);
        }
        Ok(vectors)
    }
}
