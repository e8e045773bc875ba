use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::application::LlmService;
use crate::config::Settings;
use crate::connector::adapter::{GcpTokenManager, RetryPolicy};
use crate::domain::ClassifyError;

/// Low temperature keeps rankings reproducible across identical pools.
const TEMPERATURE: f32 = 0.1;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: ContentPayload<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct ContentPayload<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini adapter over the Vertex AI `generateContent` endpoint, pinned
/// to structured-JSON output. The returned string is handed to the
/// re-ranker unparsed.
pub struct GeminiLlm {
    client: reqwest::Client,
    token: Arc<GcpTokenManager>,
    url: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiLlm {
    pub fn new(
        token: Arc<GcpTokenManager>,
        project: &str,
        location: &str,
        model: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let model = model.into();
        let url = format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
        );
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            token,
            url,
            model,
            retry,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        token: Arc<GcpTokenManager>,
    ) -> Result<Self, ClassifyError> {
        let project = settings.gcp_project.as_deref().ok_or_else(|| {
            ClassifyError::configuration("GCP_PROJECT is required for the Gemini adapter")
        })?;
        Ok(Self::new(
            token,
            project,
            &settings.gcp_location,
            settings.llm_model.clone(),
            Duration::from_secs(settings.llm_timeout_secs),
            RetryPolicy::new(settings.llm_retries),
        ))
    }
}

#[async_trait]
impl LlmService for GeminiLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_json(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ClassifyError> {
        let body = GenerateRequest {
            system_instruction: ContentPayload {
                parts: vec![Part {
                    text: system_prompt,
                }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: user_message }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: "application/json",
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
                .map_err(|e| ClassifyError::llm(format!("request failed: {e}")))?;

            let status = response.status();
            if status.is_success() {
                let parsed: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| ClassifyError::llm(format!("failed to parse response: {e}")))?;

                let text: String = parsed
                    .candidates
                    .into_iter()
                    .next()
                    .map(|c| {
                        c.content
                            .parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(ClassifyError::llm("response contained no candidates"));
                }
                return Ok(text);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                if !auth_retried {
                    auth_retried = true;
                    warn!("LLM endpoint returned 401, refreshing token");
                    self.token.invalidate().await;
                    continue;
                }
                return Err(ClassifyError::authentication(
                    "LLM endpoint rejected credentials after refresh",
                ));
            }

            if RetryPolicy::is_retryable(status) && attempt + 1 < self.retry.max_attempts() {
                let delay = self.retry.delay(attempt);
                warn!("LLM endpoint returned {status}, retrying in {:.0?}", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::llm(format!(
                "API returned {status}: {body_text}"
            )));
        }
    }
}
