//! Configuration types for the tutoring pipeline.
//!
//! All pipeline behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The config is constructed once at startup and
//! handed to [`crate::job::Pipeline`]; nothing in the crate reads provider
//! settings from globals. Tests swap in a stub provider or a fake compiler by
//! setting [`ServiceConfig::provider`] / [`ServiceConfig::compiler`].

use crate::error::TutorError;
use crate::pipeline::compile::Compiler;
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the solve / recolor / compile pipeline.
///
/// # Example
/// ```rust
/// use latex_tutor::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .scratch_root("/var/tmp/latex-tutor")
///     .compile_timeout_secs(30)
///     .max_concurrent_compiles(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory under which every job creates its own scratch directory.
    /// Created on demand. Default: `$TMPDIR/latex-tutor/temp_jobs`.
    pub scratch_root: PathBuf,

    /// LLM provider name (`gemini`, `openai`, `anthropic`, `ollama`, …).
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, each backend uses its own default
    /// (`gemini-1.5-flash-latest` for Gemini).
    pub model: Option<String>,

    /// API key for the Gemini backend. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API. Overridable for proxies and tests.
    pub gemini_base_url: String,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn Provider>>,

    /// Pre-constructed compiler. Takes precedence over `compiler_program`.
    pub compiler: Option<Arc<dyn Compiler>>,

    /// Compiler executable. Default: `latexmk`.
    pub compiler_program: String,

    /// Arguments passed before `-output-directory` and the source file.
    /// Default: `-pdf -interaction=nonstopmode`.
    ///
    /// Non-stop mode keeps a broken document from blocking on terminal input.
    pub compiler_args: Vec<String>,

    /// Generation parameters for the image → solution call.
    pub solve_params: GenerationParams,

    /// Generation parameters for the recolor call. Lower temperature because
    /// the document should come back nearly unchanged.
    pub recolor_params: GenerationParams,

    /// Provider-side content-safety thresholds.
    pub safety: SafetySettings,

    /// Per-provider-call timeout in seconds. `0` disables. Default: 120.
    pub provider_timeout_secs: u64,

    /// Per-compile timeout in seconds. `0` disables. Default: 90.
    ///
    /// A runaway `\loop` or a package that waits for input would otherwise
    /// hold a subprocess forever.
    pub compile_timeout_secs: u64,

    /// Maximum number of compiler subprocesses running at once across all
    /// jobs. `0` means unbounded. Default: 4.
    pub max_concurrent_compiles: usize,

    /// Maximum accepted request body in bytes (uploads included).
    /// Default: 25 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("latex-tutor").join("temp_jobs"),
            provider_name: None,
            model: None,
            api_key: None,
            gemini_base_url: crate::provider::gemini::DEFAULT_BASE_URL.to_string(),
            provider: None,
            compiler: None,
            compiler_program: "latexmk".to_string(),
            compiler_args: vec!["-pdf".to_string(), "-interaction=nonstopmode".to_string()],
            solve_params: GenerationParams {
                temperature: 0.4,
                ..GenerationParams::default()
            },
            recolor_params: GenerationParams {
                temperature: 0.2,
                ..GenerationParams::default()
            },
            safety: SafetySettings::default(),
            provider_timeout_secs: 120,
            compile_timeout_secs: 90,
            max_concurrent_compiles: 4,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("scratch_root", &self.scratch_root)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("compiler", &self.compiler.as_ref().map(|c| c.name().to_string()))
            .field("compiler_program", &self.compiler_program)
            .field("compiler_args", &self.compiler_args)
            .field("solve_params", &self.solve_params)
            .field("recolor_params", &self.recolor_params)
            .field("safety", &self.safety)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("max_concurrent_compiles", &self.max_concurrent_compiles)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = dir.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.config.compiler = Some(compiler);
        self
    }

    pub fn compiler_program(mut self, program: impl Into<String>) -> Self {
        self.config.compiler_program = program.into();
        self
    }

    pub fn compiler_args(mut self, args: Vec<String>) -> Self {
        self.config.compiler_args = args;
        self
    }

    pub fn solve_params(mut self, params: GenerationParams) -> Self {
        self.config.solve_params = params.clamped();
        self
    }

    pub fn recolor_params(mut self, params: GenerationParams) -> Self {
        self.config.recolor_params = params.clamped();
        self
    }

    pub fn safety_threshold(mut self, threshold: SafetyThreshold) -> Self {
        self.config.safety.threshold = threshold;
        self
    }

    pub fn provider_timeout_secs(mut self, secs: u64) -> Self {
        self.config.provider_timeout_secs = secs;
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_compiles(mut self, n: usize) -> Self {
        self.config.max_concurrent_compiles = n;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes.max(1024);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, TutorError> {
        let c = &self.config;
        if c.scratch_root.as_os_str().is_empty() {
            return Err(TutorError::InvalidConfig(
                "scratch root must not be empty".into(),
            ));
        }
        if c.compiler.is_none() && c.compiler_program.trim().is_empty() {
            return Err(TutorError::InvalidConfig(
                "compiler program must not be empty".into(),
            ));
        }
        for (name, p) in [("solve", &c.solve_params), ("recolor", &c.recolor_params)] {
            if p.max_output_tokens == 0 {
                return Err(TutorError::InvalidConfig(format!(
                    "{name} max_output_tokens must be ≥ 1"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Generation parameters ────────────────────────────────────────────────

/// Sampling parameters sent with each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature, 0.0–2.0.
    pub temperature: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Nucleus sampling cutoff, 0.0–1.0.
    pub top_p: f32,
    /// Upper bound on generated tokens. Full solution documents run long;
    /// 8192 leaves room for multi-problem sheets.
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens: 8192,
        }
    }
}

impl GenerationParams {
    fn clamped(self) -> Self {
        Self {
            temperature: self.temperature.clamp(0.0, 2.0),
            top_p: self.top_p.clamp(0.0, 1.0),
            ..self
        }
    }
}

// ── Safety settings ──────────────────────────────────────────────────────

/// Harm categories the provider filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

/// Severity at or above which the provider blocks a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    BlockNone,
    BlockOnlyHigh,
    #[default]
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// Category × threshold pairs applied to every provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySettings {
    pub categories: Vec<HarmCategory>,
    pub threshold: SafetyThreshold,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            categories: HarmCategory::ALL.to_vec(),
            threshold: SafetyThreshold::default(),
        }
    }
}
