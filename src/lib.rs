//! # latex-tutor
//!
//! Turn photographed or scanned math problems into worked solutions typeset
//! with LaTeX, and restyle existing solutions, using an LLM provider and a
//! local TeX toolchain.
//!
//! ## Jobs
//!
//! | Job | Input | LLM call | Output |
//! |-----|-------|----------|--------|
//! | Solve | image or PDF, optional template | transcribe + solve | LaTeX + PDF |
//! | Recolor | LaTeX + `#RRGGBB` | colour the solution parts | LaTeX + PDF |
//! | Compile | LaTeX | none | LaTeX + PDF |
//!
//! Each job gets its own scratch directory under
//! [`ServiceConfig::scratch_root`], which is removed before the result is
//! returned, whether the job succeeded or not.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latex_tutor::{Pipeline, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let pipeline = Pipeline::new(ServiceConfig::default())?;
//!     let out = pipeline
//!         .recolor(Some(r"\documentclass{article}..."), Some("#C0392B"))
//!         .await?;
//!     std::fs::write("recolored.pdf", &out.pdf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `latex-tutor` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GenerationParams, HarmCategory, SafetySettings, SafetyThreshold, ServiceConfig,
    ServiceConfigBuilder,
};
pub use error::TutorError;
pub use job::{JobOutput, Pipeline, SolveRequest};
pub use pipeline::compile::{Compiler, Latexmk};
pub use pipeline::input::{MediaType, RgbColor};
pub use pipeline::workspace::JobKind;
pub use provider::{Generation, Part, Provider, ProviderRequest};
pub use server::{router, serve};
