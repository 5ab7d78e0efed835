//! Google Gemini backend (`generateContent` REST API).
//!
//! Gemini is the one backend that takes per-category safety thresholds in the
//! request and reports refusals in a structured way, so a content-safety block
//! can be told apart from an outage:
//!
//! * `promptFeedback.blockReason` set → the prompt itself was blocked
//! * candidate `finishReason` of `SAFETY`, `PROHIBITED_CONTENT`, `BLOCKLIST`
//!   or `SPII` with no text → the answer was blocked
//!
//! Both surface as [`TutorError::ProviderSafetyBlock`]. Anything else that
//! leaves us without text is a [`TutorError::ProviderFailure`].

use super::{Generation, Part, Provider, ProviderRequest};
use crate::config::{HarmCategory, SafetyThreshold, ServiceConfig};
use crate::error::TutorError;
use crate::pipeline::encode::to_base64;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

const SAFETY_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini REST client.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build from config, reading the key from `config.api_key` or
    /// `GEMINI_API_KEY`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TutorError> {
        let key = api_key(config).ok_or_else(|| TutorError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Set GEMINI_API_KEY or pass --api-key.".to_string(),
        })?;
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        Ok(Self::new(key, model).with_base_url(config.gemini_base_url.clone()))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini key from config, else from a non-empty `GEMINI_API_KEY`.
pub(crate) fn api_key(config: &ServiceConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()))
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Generation, TutorError> {
        let body = build_body(request);
        debug!("Sending generateContent request to {}", self.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorError::provider_failure("gemini", e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TutorError::provider_failure("gemini", e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(TutorError::provider_failure(
                "gemini",
                format!("HTTP {status}: {detail}"),
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            TutorError::provider_failure("gemini", format!("Unreadable response: {e}"))
        })?;
        interpret(parsed)
    }
}

/// Serialise a provider request into Gemini's wire format.
fn build_body(request: &ProviderRequest) -> GenerateContentRequest {
    let parts = request
        .parts
        .iter()
        .map(|p| match p {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::Inline { mime_type, data } => WirePart::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: to_base64(data),
                },
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: WireGenerationConfig {
            temperature: request.params.temperature,
            top_k: request.params.top_k,
            top_p: request.params.top_p,
            max_output_tokens: request.params.max_output_tokens,
        },
        safety_settings: request
            .safety
            .categories
            .iter()
            .map(|&category| WireSafetySetting {
                category,
                threshold: request.safety.threshold,
            })
            .collect(),
    }
}

/// Map a parsed response onto text, a safety block, or a failure.
fn interpret(response: GenerateContentResponse) -> Result<Generation, TutorError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
    {
        warn!("Gemini blocked the prompt: {}", reason);
        return Err(TutorError::ProviderSafetyBlock { reason });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| TutorError::provider_failure("gemini", "response had no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if SAFETY_FINISH_REASONS.contains(&reason.as_str()) => {
                warn!("Gemini blocked the response: {}", reason);
                Err(TutorError::ProviderSafetyBlock { reason })
            }
            other => Err(TutorError::provider_failure(
                "gemini",
                format!(
                    "empty response (finish reason: {})",
                    other.as_deref().unwrap_or("none")
                ),
            )),
        };
    }

    let usage = response.usage_metadata.unwrap_or_default();
    Ok(Generation {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: WireGenerationConfig,
    safety_settings: Vec<WireSafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireSafetySetting {
    category: HarmCategory,
    threshold: SafetyThreshold,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
