//! Chat-completions client (OpenAI-compatible, served by llama.cpp)

use std::time::Duration;

use contracts::{ChatMessage, ContractError, LanguageModel, LlmStageConfig, StageKind};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::http::StageEndpoint;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// LLM stage client
#[derive(Debug, Clone)]
pub struct LlmClient {
    endpoint: StageEndpoint,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmStageConfig) -> Result<Self, ContractError> {
        Self::with_deadline(config, config.timeout())
    }

    /// Same as `new` with an explicit deadline instead of `timeout_secs`
    pub fn with_deadline(
        config: &LlmStageConfig,
        deadline: Duration,
    ) -> Result<Self, ContractError> {
        Ok(Self {
            endpoint: StageEndpoint::new(StageKind::Llm, &config.base_url, deadline)?,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

impl LanguageModel for LlmClient {
    #[instrument(name = "llm_generate_reply", skip(self, messages), fields(turns = messages.len()))]
    async fn generate_reply(&self, messages: &[ChatMessage]) -> Result<String, ContractError> {
        let body = ChatRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let parsed: ChatResponse = self.endpoint.post_json(COMPLETIONS_PATH, &body).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ContractError::upstream(StageKind::Llm, "response contained no choices"))
    }
}
