//! Document compilation: run an external TeX toolchain as a subprocess.
//!
//! The pipeline only needs one capability from the toolchain: given a source
//! file and an output directory, either produce `<stem>.pdf` next to a
//! `<stem>.log`, or explain why not. [`Compiler`] is that capability, so tests
//! can substitute a fake that writes a canned PDF without a TeX install.
//!
//! [`Latexmk`] is the production backend. It runs in non-stop mode so a
//! single LaTeX error ends the run instead of waiting on terminal input, and
//! `kill_on_drop` ties the child's lifetime to the job: if the job is
//! abandoned or times out, the subprocess is killed with it.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::workspace::read_log_lossy;

/// Where a successful compile left its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub pdf: PathBuf,
    pub log: PathBuf,
}

impl ArtifactPaths {
    /// The deterministic output paths for `source` compiled into `out_dir`.
    pub fn for_source(source: &Path, out_dir: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Self {
            pdf: out_dir.join(format!("{stem}.pdf")),
            log: out_dir.join(format!("{stem}.log")),
        }
    }
}

/// Why a compile did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostics {
    pub message: String,
    /// Contents of the compiler log, when it could be read.
    pub log: Option<String>,
}

impl fmt::Display for CompileDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[async_trait]
pub trait Compiler: Send + Sync {
    /// Short name for logs, e.g. `"latexmk"`.
    fn name(&self) -> &str;

    /// Compile `source`, writing every output into `out_dir`.
    async fn compile(
        &self,
        source: &Path,
        out_dir: &Path,
    ) -> Result<ArtifactPaths, CompileDiagnostics>;
}

/// `latexmk` (or any CLI with the same `-output-directory=` convention).
#[derive(Debug, Clone)]
pub struct Latexmk {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Latexmk {
    /// `timeout_secs == 0` disables the timeout.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    fn command(&self, source: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(format!("-output-directory={}", out_dir.display()))
            .arg(source)
            .current_dir(out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for Latexmk {
    fn default() -> Self {
        Self::new(
            "latexmk",
            vec!["-pdf".to_string(), "-interaction=nonstopmode".to_string()],
            90,
        )
    }
}

#[async_trait]
impl Compiler for Latexmk {
    fn name(&self) -> &str {
        &self.program
    }

    async fn compile(
        &self,
        source: &Path,
        out_dir: &Path,
    ) -> Result<ArtifactPaths, CompileDiagnostics> {
        let paths = ArtifactPaths::for_source(source, out_dir);
        let start = Instant::now();
        info!("Compiling {} with {}", source.display(), self.program);

        let run = self.command(source, out_dir).output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} timed out after {}s", self.program, limit.as_secs());
                    return Err(CompileDiagnostics {
                        message: format!(
                            "{} timed out after {}s",
                            self.program,
                            limit.as_secs()
                        ),
                        log: read_log_lossy(&paths.log).await,
                    });
                }
            },
            None => run.await,
        };

        let output = output.map_err(|e| CompileDiagnostics {
            message: format!("Failed to run {}: {}", self.program, e),
            log: None,
        })?;

        debug!(
            "{} finished with {} in {:?}\nstdout:\n{}\nstderr:\n{}",
            self.program,
            output.status,
            start.elapsed(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        if !output.status.success() {
            return Err(CompileDiagnostics {
                message: format!("{} exited with {}", self.program, output.status),
                log: read_log_lossy(&paths.log).await,
            });
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_follow_source_stem() {
        let paths = ArtifactPaths::for_source(
            Path::new("/jobs/lab_job_1/solution.tex"),
            Path::new("/jobs/lab_job_1"),
        );
        assert_eq!(paths.pdf, PathBuf::from("/jobs/lab_job_1/solution.pdf"));
        assert_eq!(paths.log, PathBuf::from("/jobs/lab_job_1/solution.log"));
    }

    #[test]
    fn command_puts_outputs_in_job_dir() {
        let c = Latexmk::default();
        let cmd = c.command(Path::new("/j/document.tex"), Path::new("/j"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-pdf",
                "-interaction=nonstopmode",
                "-output-directory=/j",
                "/j/document.tex"
            ]
        );
    }

    #[test]
    fn zero_timeout_disables_limit() {
        assert!(Latexmk::new("latexmk", vec![], 0).timeout.is_none());
        assert_eq!(
            Latexmk::new("latexmk", vec![], 5).timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let c = Latexmk::new("definitely-not-a-tex-compiler-xyz", vec![], 5);
        let err = c
            .compile(&dir.path().join("document.tex"), dir.path())
            .await
            .unwrap_err();
        assert!(err.message.contains("Failed to run"), "got: {}", err.message);
        assert!(err.log.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_reports_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("document.log"), "! LaTeX Error: boom").unwrap();
        let c = Latexmk::new("false", vec![], 5);
        let err = c
            .compile(&dir.path().join("document.tex"), dir.path())
            .await
            .unwrap_err();
        assert!(err.message.contains("exited with"), "got: {}", err.message);
        assert_eq!(err.log.as_deref(), Some("! LaTeX Error: boom"));
    }
}
