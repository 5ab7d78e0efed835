//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use latex_tutor::pipeline::compile::{ArtifactPaths, CompileDiagnostics};
use latex_tutor::{
    Compiler, Generation, Pipeline, Provider, ProviderRequest, ServiceConfig, TutorError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SOLVED_DOC: &str = "\\documentclass{article}\n\
\\usepackage{amsmath}\n\
\\begin{document}\n\
\\section*{Problem 1}\n\
Solve $x^2 - 4 = 0$.\n\
\\subsection*{Solution}\n\
$x = \\pm 2$.\n\
\\end{document}";

/// A recolored document that forgot to load `xcolor`.
pub const RECOLORED_DOC: &str = "\\documentclass[11pt]{article}\n\
\\begin{document}\n\
Solve $x^2 - 4 = 0$.\n\
\\textcolor[rgb]{1.000, 0.000, 0.000}{$x = \\pm 2$.}\n\
\\end{document}";

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

pub enum Reply {
    Text(String),
    Blocked,
    Fail,
}

/// Counts calls, keeps every request, answers with a canned [`Reply`].
pub struct StubProvider {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl StubProvider {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: impl Into<String>) -> Arc<Self> {
        Self::new(Reply::Text(text.into()))
    }

    /// Wrap `text` the way chat models usually do.
    pub fn fenced(text: &str) -> Arc<Self> {
        Self::text(format!("```latex\n{text}\n```"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Generation, TutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Text(t) => Ok(Generation {
                text: t.clone(),
                ..Default::default()
            }),
            Reply::Blocked => Err(TutorError::ProviderSafetyBlock {
                reason: "SAFETY".into(),
            }),
            Reply::Fail => Err(TutorError::provider_failure("stub", "HTTP 503")),
        }
    }
}

/// Writes a tiny PDF (or only a log) into the job directory.
pub struct FakeCompiler {
    produce_pdf: bool,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    dirs: Mutex<Vec<PathBuf>>,
    sources: Mutex<Vec<String>>,
}

impl FakeCompiler {
    pub fn ok() -> Arc<Self> {
        Self::build(true, Duration::ZERO)
    }

    pub fn broken() -> Arc<Self> {
        Self::build(false, Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(true, delay)
    }

    fn build(produce_pdf: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            produce_pdf,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            dirs: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most compiles that were ever running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Job directories seen, in call order.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }

    /// Sources as they were on disk when the compiler ran.
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    fn name(&self) -> &str {
        "fake"
    }

    async fn compile(
        &self,
        source: &Path,
        out_dir: &Path,
    ) -> Result<ArtifactPaths, CompileDiagnostics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dirs.lock().unwrap().push(out_dir.to_path_buf());
        let text = std::fs::read_to_string(source).unwrap_or_default();
        self.sources.lock().unwrap().push(text);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let paths = ArtifactPaths::for_source(source, out_dir);
        std::fs::write(&paths.log, "! Undefined control sequence.\nl.7 \\foo").unwrap();
        if self.produce_pdf {
            std::fs::write(&paths.pdf, b"%PDF-1.4\n%fake\n%%EOF\n").unwrap();
        }
        Ok(paths)
    }
}

pub fn config(root: &Path) -> ServiceConfig {
    ServiceConfig::builder()
        .scratch_root(root)
        .build()
        .expect("valid config")
}

pub fn pipeline(
    root: &Path,
    provider: Arc<StubProvider>,
    compiler: Arc<FakeCompiler>,
) -> Pipeline {
    Pipeline::with_parts(config(root), provider, compiler)
}

/// Pipeline capped at `max_compiles` concurrent compiles (`0` = unbounded).
pub fn capped_pipeline(
    root: &Path,
    max_compiles: usize,
    provider: Arc<StubProvider>,
    compiler: Arc<FakeCompiler>,
) -> Pipeline {
    let config = ServiceConfig::builder()
        .scratch_root(root)
        .max_concurrent_compiles(max_compiles)
        .build()
        .expect("valid config");
    Pipeline::with_parts(config, provider, compiler)
}

/// Number of entries left under the scratch root.
pub fn leftover(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
