//! LLM providers: the capability the pipeline uses to turn a prompt (and an
//! optional attachment) into generated LaTeX.
//!
//! The pipeline only talks to [`Provider`]. Two backends implement it:
//!
//! * [`GeminiProvider`]: Google Gemini over REST. The only backend with
//!   native per-category safety thresholds, and the default when
//!   `GEMINI_API_KEY` is set.
//! * [`EdgequakeProvider`]: any provider `edgequake-llm` can build (OpenAI,
//!   Anthropic, Azure, Ollama, …).
//!
//! Tests implement [`Provider`] directly with a stub.

pub mod edgequake;
pub mod gemini;

pub use edgequake::EdgequakeProvider;
pub use gemini::GeminiProvider;

use crate::config::{GenerationParams, SafetySettings, ServiceConfig};
use crate::error::TutorError;
use async_trait::async_trait;
use std::sync::Arc;

/// One piece of a provider request, in prompt order.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw file bytes with their MIME type; each backend encodes as it needs.
    Inline { mime_type: String, data: Vec<u8> },
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub parts: Vec<Part>,
    pub params: GenerationParams,
    pub safety: SafetySettings,
}

impl ProviderRequest {
    /// Concatenation of every text part, for logging and tests.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Inline { .. } => None,
            })
            .collect()
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().filter_map(|p| match p {
            Part::Inline { mime_type, data } => Some((mime_type.as_str(), data.as_slice())),
            Part::Text(_) => None,
        })
    }
}

/// Generated text plus token accounting, when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name for logs and error messages, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Run one generation.
    ///
    /// Implementations return [`TutorError::ProviderSafetyBlock`] when the
    /// provider refuses on content-safety grounds and
    /// [`TutorError::ProviderFailure`] for every other failure, including an
    /// empty response.
    async fn generate(&self, request: &ProviderRequest) -> Result<Generation, TutorError>;
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** (`config.provider_name`): `gemini` builds a
///    [`GeminiProvider`]; any other name goes through the `edgequake-llm`
///    factory with `config.model` (default `gpt-4.1-nano`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini key** (`config.api_key` or `GEMINI_API_KEY`).
/// 5. **Full auto-detection** via `edgequake-llm`.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn Provider>, TutorError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        if name.eq_ignore_ascii_case("gemini") {
            return Ok(Arc::new(GeminiProvider::from_config(config)?));
        }
        let model = config.model.as_deref().unwrap_or(edgequake::DEFAULT_MODEL);
        return Ok(Arc::new(EdgequakeProvider::create(name, model)?));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            if prov.eq_ignore_ascii_case("gemini") {
                return Ok(Arc::new(GeminiProvider::from_config(config)?));
            }
            return Ok(Arc::new(EdgequakeProvider::create(&prov, &model)?));
        }
    }

    if gemini::api_key(config).is_some() {
        return Ok(Arc::new(GeminiProvider::from_config(config)?));
    }

    Ok(Arc::new(EdgequakeProvider::from_env()?))
}
