//! Job workspace: one scratch directory per job, removed on every exit path.
//!
//! ## Lifecycle
//!
//! [`JobWorkspace::create`] makes `<root>/<prefix>_job_<uuid>/`. The pipeline
//! calls [`JobWorkspace::release`] once the job has an outcome, success or
//! failure, which removes the directory asynchronously. If the job future is
//! dropped before that (client disconnect, panic unwinding through the
//! handler), `Drop` removes the directory synchronously instead.
//!
//! Removal is best-effort. A missing directory counts as removed, and any
//! other failure is logged and swallowed so it can never replace the job's
//! own result.

use crate::error::TutorError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Which pipeline a job belongs to. Controls directory and file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Image/PDF → solution.
    Solve,
    /// LaTeX + colour → recoloured LaTeX.
    Recolor,
    /// LaTeX → PDF, no provider call.
    Compile,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Solve => "solve",
            JobKind::Recolor => "recolor",
            JobKind::Compile => "compile",
        }
    }

    fn dir_prefix(&self) -> &'static str {
        match self {
            JobKind::Solve => "lab",
            JobKind::Recolor => "studio",
            JobKind::Compile => "latex",
        }
    }

    /// File stem shared by the `.tex`, `.pdf` and `.log` files.
    pub fn file_stem(&self) -> &'static str {
        match self {
            JobKind::Solve => "solution",
            JobKind::Recolor => "recolored_solution",
            JobKind::Compile => "document",
        }
    }
}

/// A job's scratch directory and the deterministic paths inside it.
#[derive(Debug)]
pub struct JobWorkspace {
    id: Uuid,
    kind: JobKind,
    dir: PathBuf,
    released: bool,
}

impl JobWorkspace {
    /// Create a fresh directory for job `id` under `root`.
    ///
    /// `root` is created if missing. The job directory itself must not exist
    /// yet; a name collision is reported rather than shared.
    pub async fn create(root: &Path, kind: JobKind, id: Uuid) -> Result<Self, TutorError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| TutorError::io("Failed to create scratch root", root, e))?;

        // The compiler runs with the job dir as cwd, so paths must be absolute.
        let root = std::path::absolute(root)
            .map_err(|e| TutorError::io("Failed to resolve scratch root", root, e))?;

        let dir = root.join(format!("{}_job_{}", kind.dir_prefix(), id));
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| TutorError::io("Failed to create job directory", &dir, e))?;

        debug!(job_id = %id, dir = %dir.display(), "Created job directory");
        Ok(Self {
            id,
            kind,
            dir,
            released: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tex", self.kind.file_stem()))
    }

    /// Write the Final Source to the job's `.tex` file.
    pub async fn write_source(&self, source: &str) -> Result<PathBuf, TutorError> {
        let path = self.source_path();
        tokio::fs::write(&path, source)
            .await
            .map_err(|e| TutorError::io("Failed to write LaTeX source", &path, e))?;
        debug!(job_id = %self.id, "Wrote {} bytes to {}", source.len(), path.display());
        Ok(path)
    }

    /// Remove the job directory. Never fails; problems are logged.
    pub async fn release(mut self) {
        self.released = true;
        match remove_job_dir(&self.dir).await {
            Ok(()) => debug!(job_id = %self.id, "Cleaned up job directory"),
            Err(e) => warn!(
                job_id = %self.id,
                dir = %self.dir.display(),
                "Error cleaning up job directory: {}", e
            ),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(job_id = %self.id, "Job ended before release; removing directory");
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %self.id,
                dir = %self.dir.display(),
                "Error cleaning up job directory: {}", e
            ),
        }
    }
}

/// Recursively remove `dir`. Removing a directory that is already gone is
/// not an error, so calling this twice is safe.
pub async fn remove_job_dir(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Best-effort read of a compiler log file.
pub async fn read_log_lossy(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("Failed to read log file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_lays_out_named_paths() {
        let root = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let ws = JobWorkspace::create(root.path(), JobKind::Recolor, id).await.unwrap();

        let name = ws.dir().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("studio_job_{id}"));
        assert_eq!(ws.id(), id);
        assert!(ws.dir().is_dir());
        assert!(ws.source_path().ends_with("recolored_solution.tex"));
        ws.release().await;
    }

    #[tokio::test]
    async fn create_makes_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let ws = JobWorkspace::create(&nested, JobKind::Solve, Uuid::new_v4()).await.unwrap();
        assert!(ws.dir().starts_with(&nested));
        ws.release().await;
    }

    #[tokio::test]
    async fn release_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), JobKind::Solve, Uuid::new_v4()).await.unwrap();
        ws.write_source("\\documentclass{article}").await.unwrap();
        let dir = ws.dir().to_path_buf();

        ws.release().await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn remove_twice_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("lab_job_gone");
        std::fs::create_dir(&dir).unwrap();

        remove_job_dir(&dir).await.expect("first removal");
        remove_job_dir(&dir).await.expect("second removal is a no-op");
    }

    #[tokio::test]
    async fn release_after_external_removal_is_quiet() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), JobKind::Compile, Uuid::new_v4()).await.unwrap();
        std::fs::remove_dir_all(ws.dir()).unwrap();
        ws.release().await;
    }

    #[test]
    fn drop_without_release_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = tokio_test::block_on(async {
            let ws = JobWorkspace::create(root.path(), JobKind::Solve, Uuid::new_v4()).await.unwrap();
            ws.dir().to_path_buf()
        });
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn read_log_is_lossy_and_optional() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), JobKind::Compile, Uuid::new_v4()).await.unwrap();
        let log_path = ws.dir().join("document.log");
        assert_eq!(read_log_lossy(&log_path).await, None);

        std::fs::write(&log_path, b"! Missing $ inserted.\xff").unwrap();
        let log = read_log_lossy(&log_path).await.unwrap();
        assert!(log.starts_with("! Missing $ inserted."));
        ws.release().await;
    }
}
