//! Gemini backend for the text-generation capability.
//!
//! Non-streaming `generateContent` calls; 429 and 5xx responses are retried
//! with exponential backoff, other statuses fail immediately.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::generate::{GenerationError, GenerationRequest, TextGenerator};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub retry_attempts: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.0-flash".to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            retry_attempts: 3,
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }

    fn body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "maxOutputTokens": request.max_output_tokens,
                "temperature": request.temperature,
            },
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(reply: &Value) -> Option<String> {
        let parts = reply["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let attempts = self.config.retry_attempts.max(1);
        let body = Self::body(&request);
        let mut delay = INITIAL_BACKOFF;

        for attempt in 1..=attempts {
            let sent = self
                .client
                .post(self.url())
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;
            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let reply: Value = response
                            .json()
                            .await
                            .map_err(|e| GenerationError::Transport(e.to_string()))?;
                        let text =
                            Self::extract_text(&reply).ok_or(GenerationError::EmptyReply)?;
                        debug!(chars = text.len(), "generation complete");
                        return Ok(text);
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt == attempts {
                        return Err(GenerationError::Api {
                            status: status.as_u16(),
                            body: body_text,
                        });
                    }
                    warn!(attempt, %status, retry_in = ?delay, "generation API retryable error");
                }
                Err(e) => {
                    if attempt == attempts {
                        return Err(GenerationError::Transport(e.to_string()));
                    }
                    warn!(attempt, error = %e, retry_in = ?delay, "generation transport error");
                }
            }
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
        unreachable!("loop returns on final attempt")
    }
}
