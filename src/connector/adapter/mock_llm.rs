use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::LlmService;
use crate::domain::ClassifyError;

/// Scripted LLM stub: plays back canned responses in order and records
/// every prompt pair, so tests can assert both what was asked and how
/// often.
pub struct MockLlm {
    model: String,
    responses: Mutex<VecDeque<String>>,
    captured: Mutex<Vec<(String, String)>>,
}

impl MockLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            model: "mock-llm".to_string(),
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.captured.lock().expect("captured lock").len()
    }

    /// `(system_prompt, user_message)` pairs in call order.
    pub fn captured(&self) -> Vec<(String, String)> {
        self.captured.lock().expect("captured lock").clone()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_json(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ClassifyError> {
        self.captured
            .lock()
            .expect("captured lock")
            .push((system_prompt.to_string(), user_message.to_string()));
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| ClassifyError::llm("no scripted response left"))
    }
}
