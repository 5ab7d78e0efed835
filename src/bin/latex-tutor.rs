//! CLI binary for latex-tutor.
//!
//! `serve` runs the HTTP service; `solve`, `recolor` and `compile` run a
//! single job against local files and write the PDF next to the input.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use latex_tutor::{
    JobOutput, MediaType, Pipeline, SafetyThreshold, ServiceConfig, SolveRequest,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service
  latex-tutor serve --bind 127.0.0.1:3000

  # Solve a photographed worksheet
  latex-tutor solve worksheet.jpg -o worksheet.pdf --latex-out worksheet.tex

  # Solve into an existing layout
  latex-tutor solve exam.pdf --template exam-template.tex

  # Colour the solution parts red
  latex-tutor recolor solution.tex --color '#C0392B'

  # Gemini without safety filtering
  latex-tutor --safety off solve problem.png

  # Compile LaTeX without calling a provider
  latex-tutor compile notes.tex

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider to use when none is given
  EDGEQUAKE_MODEL         Model to use with EDGEQUAKE_LLM_PROVIDER
  LATEX_TUTOR_*           Fallback for every flag below

REQUIREMENTS:
  A TeX distribution with latexmk on PATH (TeX Live, MiKTeX, MacTeX).
"#;

/// Solve math problems into compiled LaTeX using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "latex-tutor",
    version,
    about = "Solve and restyle math problems as compiled LaTeX using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Directory that holds per-job scratch directories.
    #[arg(long, global = true, env = "LATEX_TUTOR_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "LATEX_TUTOR_PROVIDER")]
    provider: Option<String>,

    /// Model ID for the chosen provider.
    #[arg(long, global = true, env = "LATEX_TUTOR_MODEL")]
    model: Option<String>,

    /// Gemini API key.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Safety threshold sent with every Gemini request.
    #[arg(long, global = true, env = "LATEX_TUTOR_SAFETY", value_enum, default_value = "medium")]
    safety: SafetyArg,

    /// Provider call timeout in seconds (0 = none).
    #[arg(long, global = true, env = "LATEX_TUTOR_PROVIDER_TIMEOUT", default_value_t = 120)]
    provider_timeout: u64,

    /// Compile timeout in seconds (0 = none).
    #[arg(long, global = true, env = "LATEX_TUTOR_COMPILE_TIMEOUT", default_value_t = 90)]
    compile_timeout: u64,

    /// Maximum compiles running at once (0 = unbounded).
    #[arg(long, global = true, env = "LATEX_TUTOR_MAX_COMPILES", default_value_t = 4)]
    max_compiles: usize,

    /// LaTeX build driver to invoke.
    #[arg(long, global = true, env = "LATEX_TUTOR_COMPILER", default_value = "latexmk")]
    compiler: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "LATEX_TUTOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "LATEX_TUTOR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "LATEX_TUTOR_BIND", default_value = "0.0.0.0:3000")]
        bind: String,

        /// Maximum request body size in bytes.
        #[arg(long, env = "LATEX_TUTOR_MAX_UPLOAD", default_value_t = 25 * 1024 * 1024)]
        max_upload: usize,
    },
    /// Transcribe and solve an image or PDF of math problems.
    Solve {
        /// Image (png, jpg, webp, heic, heif) or PDF.
        input: PathBuf,

        /// LaTeX template to re-flow the solution into.
        #[arg(long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },
    /// Colour the solution parts of a LaTeX file.
    Recolor {
        /// LaTeX source file.
        input: PathBuf,

        /// Target colour as #RRGGBB.
        #[arg(long)]
        color: String,

        #[command(flatten)]
        out: OutputArgs,
    },
    /// Compile a LaTeX file as-is.
    Compile {
        /// LaTeX source file.
        input: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the PDF here (default: input name with .pdf).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the final LaTeX source here.
    #[arg(long)]
    latex_out: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SafetyArg {
    Off,
    High,
    Medium,
    Low,
}

impl From<SafetyArg> for SafetyThreshold {
    fn from(v: SafetyArg) -> Self {
        match v {
            SafetyArg::Off => SafetyThreshold::BlockNone,
            SafetyArg::High => SafetyThreshold::BlockOnlyHigh,
            SafetyArg::Medium => SafetyThreshold::BlockMediumAndAbove,
            SafetyArg::Low => SafetyThreshold::BlockLowAndAbove,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if g.verbose {
        "debug"
    } else if g.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let max_upload = match cli.command {
        Command::Serve { max_upload, .. } => Some(max_upload),
        _ => None,
    };
    let config = build_config(g, max_upload)?;
    let pipeline = Pipeline::new(config).context("Failed to initialise pipeline")?;

    match cli.command {
        Command::Serve { ref bind, .. } => {
            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            latex_tutor::serve(listener, pipeline)
                .await
                .context("HTTP server failed")?;
        }
        Command::Solve {
            ref input,
            ref template,
            ref out,
        } => {
            let file = tokio::fs::read(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let template = match template {
                Some(path) => Some(
                    tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read template {}", path.display()))?,
                ),
                None => None,
            };
            let request = SolveRequest {
                file,
                media_type: MediaType::guess_mime(input).to_string(),
                template,
            };
            let spinner = spinner(g.quiet, "Solving");
            let result = pipeline.solve(&request).await;
            spinner.finish_and_clear();
            let output = result.context("Solve failed")?;
            write_outputs(input, out, &output, g.quiet).await?;
        }
        Command::Recolor {
            ref input,
            ref color,
            ref out,
        } => {
            let latex = read_source(input).await?;
            let spinner = spinner(g.quiet, "Recoloring");
            let result = pipeline.recolor(Some(&latex), Some(color)).await;
            spinner.finish_and_clear();
            let output = result.context("Recolor failed")?;
            write_outputs(input, out, &output, g.quiet).await?;
        }
        Command::Compile { ref input, ref out } => {
            let latex = read_source(input).await?;
            let spinner = spinner(g.quiet, "Compiling");
            let result = pipeline.compile(Some(&latex)).await;
            spinner.finish_and_clear();
            let output = result.context("Compile failed")?;
            write_outputs(input, out, &output, g.quiet).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(g: &GlobalArgs, max_upload: Option<usize>) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .compiler_program(g.compiler.clone())
        .safety_threshold(g.safety.into())
        .provider_timeout_secs(g.provider_timeout)
        .compile_timeout_secs(g.compile_timeout)
        .max_concurrent_compiles(g.max_compiles);

    if let Some(ref dir) = g.scratch_dir {
        builder = builder.scratch_root(dir.clone());
    }
    if let Some(ref p) = g.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref m) = g.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref k) = g.api_key {
        builder = builder.api_key(k.clone());
    }
    if let Some(bytes) = max_upload {
        builder = builder.max_upload_bytes(bytes);
    }

    builder.build().context("Invalid configuration")
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn spinner(quiet: bool, prefix: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix(prefix);
    bar.set_message("waiting for provider and compiler…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// `sheet.jpg` → `sheet.pdf`; a PDF input gets `_solution` so it is not overwritten.
fn default_pdf_path(input: &Path) -> PathBuf {
    let is_pdf = input
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        input.with_file_name(format!("{stem}_solution.pdf"))
    } else {
        input.with_extension("pdf")
    }
}

async fn write_outputs(
    input: &Path,
    out: &OutputArgs,
    output: &JobOutput,
    quiet: bool,
) -> Result<()> {
    let pdf_path = out
        .output
        .clone()
        .unwrap_or_else(|| default_pdf_path(input));
    tokio::fs::write(&pdf_path, &output.pdf)
        .await
        .with_context(|| format!("Failed to write {}", pdf_path.display()))?;

    if let Some(ref tex_path) = out.latex_out {
        tokio::fs::write(tex_path, &output.latex)
            .await
            .with_context(|| format!("Failed to write {}", tex_path.display()))?;
    }

    if !quiet {
        eprintln!(
            "{}  {}  →  {}",
            green("✔"),
            output.message(),
            bold(&pdf_path.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!("job {}  ·  {} bytes", output.job_id, output.pdf.len()))
        );
    }
    Ok(())
}
