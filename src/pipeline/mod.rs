//! Pipeline stages for turning a request into compiled LaTeX.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others and the two external collaborators (provider, compiler) can be
//! swapped for fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ llm ──▶ postprocess ──▶ workspace ──▶ compile ──▶ encode
//! (check)  (LLM)   (fences/xcolor)  (job dir)    (latexmk)   (base64)
//! ```
//!
//! 1. [`input`]      : media-type allow-list, colour parsing, blank checks
//! 2. [`llm`]        : build the provider request and run it with a timeout;
//!    the only stage with network I/O
//! 3. [`postprocess`]: fence stripping and preamble repair
//! 4. [`workspace`]  : per-job scratch directory, removed on every exit path
//! 5. [`compile`]    : external TeX compiler as a subprocess
//! 6. [`encode`]     : base64 for attachments and the returned PDF

pub mod compile;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod workspace;
