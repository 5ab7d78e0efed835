//! Adapter over the `edgequake-llm` multi-provider client.
//!
//! Every text part of the request is joined into one user message and every
//! attachment rides along as an `ImageData`. Providers behind this adapter
//! do not take Gemini-style safety thresholds; their own content filters
//! still apply, and an error that reports one (`finish_reason =
//! "content_filter"` on OpenAI/Azure) is mapped to
//! [`TutorError::ProviderSafetyBlock`].

use super::{Generation, Provider, ProviderRequest};
use crate::error::TutorError;
use crate::pipeline::encode::to_base64;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Any `edgequake-llm` provider behind the crate's [`Provider`] trait.
pub struct EdgequakeProvider {
    name: String,
    inner: Arc<dyn LLMProvider>,
}

impl EdgequakeProvider {
    pub fn new(name: impl Into<String>, inner: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Instantiate a named provider with the given model.
    pub fn create(provider_name: &str, model: &str) -> Result<Self, TutorError> {
        let inner = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            TutorError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider_name, inner))
    }

    /// Pick the first provider whose API key is present in the environment.
    pub fn from_env() -> Result<Self, TutorError> {
        let (inner, _embedding) =
            ProviderFactory::from_env().map_err(|e| TutorError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new("auto", inner))
    }
}

#[async_trait]
impl Provider for EdgequakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Generation, TutorError> {
        let images: Vec<ImageData> = request
            .attachments()
            .map(|(mime, data)| ImageData::new(to_base64(data), mime))
            .collect();
        let messages = vec![ChatMessage::user_with_images(request.text(), images)];
        let options = CompletionOptions {
            temperature: Some(request.params.temperature),
            max_tokens: Some(request.params.max_output_tokens as usize),
            ..Default::default()
        };

        let response = self
            .inner
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_error(&self.name, &e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(TutorError::provider_failure(&self.name, "empty response"));
        }

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Content-filter refusals become safety blocks; everything else is a failure.
fn classify_error(provider: &str, message: &str) -> TutorError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("content_filter") || lower.contains("content filter") || lower.contains("safety")
    {
        TutorError::ProviderSafetyBlock {
            reason: message.to_string(),
        }
    } else {
        TutorError::provider_failure(provider, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_filter_is_safety_block() {
        let e = classify_error("azure", "API error: finish_reason=\"content_filter\"");
        assert!(matches!(e, TutorError::ProviderSafetyBlock { .. }));
        let e = classify_error("openai", "Response blocked by SAFETY policy");
        assert!(matches!(e, TutorError::ProviderSafetyBlock { .. }));
    }

    #[test]
    fn other_errors_are_failures() {
        let e = classify_error("openai", "HTTP 503 Service Unavailable");
        assert!(matches!(
            e,
            TutorError::ProviderFailure { ref provider, .. } if provider == "openai"
        ));
    }
}
