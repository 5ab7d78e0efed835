//! Provider interaction: assemble the request for each job kind and run it.
//!
//! All prompt text lives in [`crate::prompts`]; this module decides which
//! parts go in which order and applies the per-call timeout. There is no
//! retry: a failed or refused generation ends the job.

use crate::config::{GenerationParams, SafetySettings};
use crate::error::TutorError;
use crate::pipeline::input::{MediaType, RgbColor};
use crate::prompts::{recolor_prompt, template_instruction, SELF_CONTAINED_INSTRUCTION, SOLVE_BASE_PROMPT};
use crate::provider::{Generation, Part, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Request for the image/PDF → solution call.
///
/// Part order: base instructions, the upload, then the template or
/// self-contained instruction. A blank template counts as none.
pub fn solve_request(
    file: &[u8],
    media_type: MediaType,
    template: Option<&str>,
    params: GenerationParams,
    safety: SafetySettings,
) -> ProviderRequest {
    let closing = match template.filter(|t| !t.trim().is_empty()) {
        Some(t) => template_instruction(t),
        None => SELF_CONTAINED_INSTRUCTION.to_string(),
    };
    ProviderRequest {
        parts: vec![
            Part::Text(SOLVE_BASE_PROMPT.to_string()),
            Part::Inline {
                mime_type: media_type.as_mime().to_string(),
                data: file.to_vec(),
            },
            Part::Text(closing),
        ],
        params,
        safety,
    }
}

/// Request for the recolor call: a single text prompt.
pub fn recolor_request(
    latex: &str,
    color: RgbColor,
    params: GenerationParams,
    safety: SafetySettings,
) -> ProviderRequest {
    ProviderRequest {
        parts: vec![Part::Text(recolor_prompt(latex, &color.latex_triple()))],
        params,
        safety,
    }
}

/// Run one generation, bounded by `timeout_secs` (`0` = unbounded).
pub async fn generate(
    provider: &Arc<dyn Provider>,
    request: &ProviderRequest,
    timeout_secs: u64,
    job_id: Uuid,
) -> Result<Generation, TutorError> {
    let start = Instant::now();
    info!(job_id = %job_id, provider = provider.name(), "Sending request to provider");

    let call = provider.generate(request);
    let generation = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), call)
            .await
            .map_err(|_| {
                TutorError::provider_failure(
                    provider.name(),
                    format!("timed out after {timeout_secs}s"),
                )
            })??
    } else {
        call.await?
    };

    debug!(
        job_id = %job_id,
        "Provider returned {} chars, {} input tokens, {} output tokens, {:?}",
        generation.text.len(),
        generation.input_tokens,
        generation.output_tokens,
        start.elapsed()
    );
    Ok(generation)
}
