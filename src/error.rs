//! Error types for the latex-tutor library.
//!
//! Every job runs as one linear pipeline and every failure is terminal for
//! that job, so a single error enum covers the whole crate. Variants are
//! grouped by the stage that raises them. [`TutorError::status_code`] maps
//! each one onto the HTTP status the server answers with; the CLI only prints
//! the `Display` form.
//!
//! Client errors (bad input, unsupported media, provider safety refusals) are
//! 400-class. Everything else is the service's problem and maps to 500.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the latex-tutor library.
#[derive(Debug, Error)]
pub enum TutorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required field is missing or malformed (empty source, bad colour,
    /// missing upload).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The uploaded media type is not on the allow-list.
    #[error(
        "Unsupported file type: {media_type}. Please upload an image (PNG, JPEG, WEBP, HEIC, HEIF) or PDF."
    )]
    UnsupportedMediaType { media_type: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The provider declined to answer because of its content-safety policy.
    #[error("Request blocked due to safety settings: {reason}")]
    ProviderSafetyBlock { reason: String },

    /// The provider call errored, timed out, or returned nothing usable.
    #[error("LLM provider '{provider}' failed: {message}")]
    ProviderFailure { provider: String, message: String },

    /// The configured provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Compile errors ────────────────────────────────────────────────────
    /// The compiler ran but no PDF was produced.
    ///
    /// `log` carries the compiler's log file when it could be read.
    #[error("Failed to compile LaTeX code: {message}")]
    CompileFailure {
        message: String,
        log: Option<String>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Scratch-directory create/write/read failed.
    #[error("{context} '{path}': {source}")]
    InternalIo {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TutorError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn provider_failure(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InternalIo {
            context,
            path: path.into(),
            source,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TutorError::InvalidRequest { .. }
                | TutorError::UnsupportedMediaType { .. }
                | TutorError::ProviderSafetyBlock { .. }
        )
    }

    /// Short user-facing summary used as the `message` field of error bodies.
    pub fn summary(&self) -> String {
        match self {
            TutorError::InvalidRequest { message } => message.clone(),
            TutorError::UnsupportedMediaType { .. } => self.to_string(),
            TutorError::ProviderSafetyBlock { .. } => {
                "Request blocked due to safety settings.".to_string()
            }
            TutorError::CompileFailure { .. } => "Failed to compile LaTeX code.".to_string(),
            _ => "Error processing request.".to_string(),
        }
    }

    /// Compiler log attached to a compile failure, if any.
    pub fn compile_log(&self) -> Option<&str> {
        match self {
            TutorError::CompileFailure { log, .. } => log.as_deref(),
            _ => None,
        }
    }
}
