use async_trait::async_trait;

use crate::domain::ClassifyError;

/// Chat-completion provider constrained to structured-JSON output.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// The model identifier actually used, as reported in response provenance.
    fn model_name(&self) -> &str;

    /// Generate a completion the provider believes to be JSON.
    /// Parsing and validation are the caller's responsibility.
    async fn generate_json(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ClassifyError>;
}
