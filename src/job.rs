//! Job entry points: solve, recolor and compile.
//!
//! A [`Pipeline`] is built once at startup from a [`ServiceConfig`] and shared
//! by every request. Each call runs one job from validation to cleanup:
//!
//! ```text
//! validate ─▶ provider ─▶ extract ─▶ (repair) ─▶ create job dir ─▶ write
//!          ─▶ compile ─▶ collect PDF ─▶ release job dir ─▶ JobOutput
//! ```
//!
//! Rejected input never touches the provider, the compiler or the disk, and
//! the job directory only exists once there is a source to compile. From
//! then on every exit path goes through [`JobWorkspace::release`];
//! the workspace's `Drop` covers the case where the caller abandons the
//! future mid-job.

use crate::config::ServiceConfig;
use crate::error::TutorError;
use crate::pipeline::compile::{Compiler, Latexmk};
use crate::pipeline::encode::to_base64;
use crate::pipeline::input::{require_source, MediaType, RgbColor};
use crate::pipeline::llm;
use crate::pipeline::postprocess::{ensure_package, extract_source};
use crate::pipeline::workspace::{read_log_lossy, JobKind, JobWorkspace};
use crate::provider::{resolve_provider, Provider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

/// An uploaded problem sheet.
#[derive(Debug, Clone, Default)]
pub struct SolveRequest {
    /// Raw file bytes.
    pub file: Vec<u8>,
    /// Declared `Content-Type` of the upload.
    pub media_type: String,
    /// Optional LaTeX template to re-flow the solution into.
    pub template: Option<String>,
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub job_id: Uuid,
    pub kind: JobKind,
    /// The Final Source that was compiled.
    pub latex: String,
    /// The compiled PDF.
    pub pdf: Vec<u8>,
}

impl JobOutput {
    pub fn pdf_base64(&self) -> String {
        to_base64(&self.pdf)
    }

    /// Human-readable success message for response bodies.
    pub fn message(&self) -> &'static str {
        match self.kind {
            JobKind::Solve => "LaTeX solution generated and PDF compiled successfully.",
            JobKind::Recolor => "LaTeX recolored and PDF compiled successfully.",
            JobKind::Compile => "PDF generated successfully.",
        }
    }
}

/// Shared, cheaply clonable handle that runs jobs.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<ServiceConfig>,
    provider: Arc<dyn Provider>,
    compiler: Arc<dyn Compiler>,
    compile_slots: Option<Arc<Semaphore>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &self.provider.name())
            .field("compiler", &self.compiler.name())
            .field("scratch_root", &self.config.scratch_root)
            .finish()
    }
}

impl Pipeline {
    /// Resolve the provider and compiler from `config`.
    pub fn new(config: ServiceConfig) -> Result<Self, TutorError> {
        let provider = resolve_provider(&config)?;
        let compiler: Arc<dyn Compiler> = match config.compiler {
            Some(ref c) => Arc::clone(c),
            None => Arc::new(Latexmk::new(
                config.compiler_program.clone(),
                config.compiler_args.clone(),
                config.compile_timeout_secs,
            )),
        };
        info!(
            provider = provider.name(),
            compiler = compiler.name(),
            scratch_root = %config.scratch_root.display(),
            "Pipeline ready"
        );
        Ok(Self::with_parts(config, provider, compiler))
    }

    /// Assemble a pipeline from explicit collaborators.
    pub fn with_parts(
        config: ServiceConfig,
        provider: Arc<dyn Provider>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        let compile_slots = (config.max_concurrent_compiles > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_compiles)));
        Self {
            config: Arc::new(config),
            provider,
            compiler,
            compile_slots,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Transcribe and solve every problem in an uploaded image or PDF.
    pub async fn solve(&self, request: &SolveRequest) -> Result<JobOutput, TutorError> {
        let media_type = MediaType::parse(&request.media_type)?;
        if request.file.is_empty() {
            return Err(TutorError::invalid_request("Uploaded file is empty."));
        }

        let job_id = Uuid::new_v4();
        info!(
            job_id = %job_id,
            media_type = %media_type,
            bytes = request.file.len(),
            template = request.template.as_deref().is_some_and(|t| !t.trim().is_empty()),
            "Starting solve job"
        );
        let result = self.solve_in(job_id, request, media_type).await;
        report(job_id, JobKind::Solve, result)
    }

    /// Colour the solution parts of a LaTeX document.
    ///
    /// Both fields are optional so that missing JSON fields and blank values
    /// produce the same [`TutorError::InvalidRequest`].
    pub async fn recolor(
        &self,
        latex_input: Option<&str>,
        target_color: Option<&str>,
    ) -> Result<JobOutput, TutorError> {
        let latex = require_source(latex_input, "LaTeX input string")?;
        let color = match target_color {
            Some(c) => RgbColor::from_hex(c)?,
            None => return Err(TutorError::invalid_request("Target color hex string is required.")),
        };

        let job_id = Uuid::new_v4();
        info!(
            job_id = %job_id,
            color = %color.latex_triple(),
            chars = latex.len(),
            "Starting recolor job"
        );
        let result = self.recolor_in(job_id, latex, color).await;
        report(job_id, JobKind::Recolor, result)
    }

    /// Compile caller-supplied LaTeX as-is.
    pub async fn compile(&self, latex_code: Option<&str>) -> Result<JobOutput, TutorError> {
        let latex = require_source(latex_code, "LaTeX code")?;

        let job_id = Uuid::new_v4();
        info!(job_id = %job_id, chars = latex.len(), "Starting compile job");
        let result = self.run_in_workspace(job_id, JobKind::Compile, latex.to_string()).await;
        report(job_id, JobKind::Compile, result)
    }

    async fn solve_in(
        &self,
        job_id: Uuid,
        request: &SolveRequest,
        media_type: MediaType,
    ) -> Result<JobOutput, TutorError> {
        let provider_request = llm::solve_request(
            &request.file,
            media_type,
            request.template.as_deref(),
            self.config.solve_params,
            self.config.safety.clone(),
        );
        let generation = llm::generate(
            &self.provider,
            &provider_request,
            self.config.provider_timeout_secs,
            job_id,
        )
        .await?;

        let source = extract_source(&generation.text);
        self.run_in_workspace(job_id, JobKind::Solve, source).await
    }

    async fn recolor_in(
        &self,
        job_id: Uuid,
        latex: &str,
        color: RgbColor,
    ) -> Result<JobOutput, TutorError> {
        let provider_request = llm::recolor_request(
            latex,
            color,
            self.config.recolor_params,
            self.config.safety.clone(),
        );
        let generation = llm::generate(
            &self.provider,
            &provider_request,
            self.config.provider_timeout_secs,
            job_id,
        )
        .await?;

        let source = ensure_package(&extract_source(&generation.text), "xcolor");
        self.run_in_workspace(job_id, JobKind::Recolor, source).await
    }

    /// Materialise the job directory, compile, then remove the directory.
    /// Cleanup problems are logged inside `release` and never change the result.
    async fn run_in_workspace(
        &self,
        job_id: Uuid,
        kind: JobKind,
        source: String,
    ) -> Result<JobOutput, TutorError> {
        let workspace = JobWorkspace::create(&self.config.scratch_root, kind, job_id).await?;
        let result = self.compile_in(&workspace, source).await;
        workspace.release().await;
        result
    }

    /// Write, compile and collect. Shared by every job kind.
    async fn compile_in(
        &self,
        workspace: &JobWorkspace,
        source: String,
    ) -> Result<JobOutput, TutorError> {
        let source_path = workspace.write_source(&source).await?;

        let _permit = match self.compile_slots {
            Some(ref slots) => Some(slots.acquire().await.map_err(|_| {
                TutorError::CompileFailure {
                    message: "compile queue is closed".to_string(),
                    log: None,
                }
            })?),
            None => None,
        };

        let start = Instant::now();
        let paths = self
            .compiler
            .compile(&source_path, workspace.dir())
            .await
            .map_err(|d| TutorError::CompileFailure {
                message: d.message,
                log: d.log,
            })?;
        debug!(job_id = %workspace.id(), "Compiled in {:?}", start.elapsed());

        if !tokio::fs::try_exists(&paths.pdf).await.unwrap_or(false) {
            return Err(TutorError::CompileFailure {
                message: format!("compiler finished but {} was not produced", paths.pdf.display()),
                log: read_log_lossy(&paths.log).await,
            });
        }

        let pdf = tokio::fs::read(&paths.pdf)
            .await
            .map_err(|e| TutorError::io("Failed to read compiled PDF", &paths.pdf, e))?;

        Ok(JobOutput {
            job_id: workspace.id(),
            kind: workspace.kind(),
            latex: source,
            pdf,
        })
    }
}

/// Log the outcome once at the job boundary.
fn report(
    job_id: Uuid,
    kind: JobKind,
    result: Result<JobOutput, TutorError>,
) -> Result<JobOutput, TutorError> {
    match &result {
        Ok(output) => info!(
            job_id = %job_id,
            kind = kind.as_str(),
            pdf_bytes = output.pdf.len(),
            "Job complete"
        ),
        Err(e) => error!(
            job_id = %job_id,
            kind = kind.as_str(),
            error = %e,
            "Job failed"
        ),
    }
    result
}
