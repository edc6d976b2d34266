//! OpenAI chat completions adapter

use async_trait::async_trait;
use persona_bot_domain::{CompletionError, CompletionParams, CompletionService, ConversationRequest};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmConfig, backoff_delay};

/// Completion service backed by `/chat/completions`.
///
/// Works with OpenAI and any endpoint that speaks the same protocol.
pub struct OpenAiCompleter {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiCompleter {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(api_key: SecretString, config: LlmConfig) -> Result<Self, CompletionError> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(
        api_key: SecretString,
        base_url: String,
        config: LlmConfig,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call_api(
        &self,
        conversation: &ConversationRequest,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &params.model,
            messages: conversation
                .messages()
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Api(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(CompletionError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidFormat(e.to_string()))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CompletionError::InvalidFormat("Empty response".to_string()));
        }

        Ok(text)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAiCompleter {
    async fn complete(
        &self,
        conversation: &ConversationRequest,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let attempts = params.max_retries.max(1);
        let mut last_error = CompletionError::Api("No attempts made".to_string());

        for attempt in 0..attempts {
            match self.call_api(conversation, params).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::error!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "OpenAI API error"
                    );
                    last_error = e;
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(backoff_delay(params.backoff_base, attempt)).await;
            }
        }

        Err(CompletionError::Exhausted {
            attempts,
            last: Box::new(last_error),
        })
    }
}
