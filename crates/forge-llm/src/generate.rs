//! The text-generation capability.

use std::future::Future;

/// One bounded generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Instructional preamble kept separate from the user content.
    pub system: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_output_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_limits(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("generation reply contained no text")]
    EmptyReply,
}

/// Produce free text from a prompt. Implementations own their own retry
/// policy for transient upstream failures.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}
