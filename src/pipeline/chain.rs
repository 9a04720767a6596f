//! Strategy planning and the fallback chain.
//!
//! ```text
//! pandoc-full ──▶ pandoc-minimal ──▶ html-engine ──▶ pandoc-html ──▶ builtin-html
//! └──────────── PDF ───────────────────────────┘   └──── HTML fallback ──────┘
//! ```
//!
//! Each strategy writes to a hidden temp file next to its final path and the
//! file is renamed into place only after it validated, so a failed attempt
//! never leaves a truncated PDF behind.

use crate::config::{Backend, ConversionConfig};
use crate::error::{AttemptError, Md2PdfError};
use crate::output::{AttemptRecord, Strategy};
use crate::pipeline::engine::engine_invocation;
use crate::pipeline::exec::{self, Invocation};
use crate::pipeline::html::{render_html_document, DocumentContext};
use crate::pipeline::pandoc::{self, PandocJob, PandocVersion};
use crate::pipeline::toolchain::Toolchain;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempPath;
use tracing::{info, warn};

/// Decide which strategies to try, in order, given the installed tools.
///
/// A plan without any PDF-producing strategy is rejected: the HTML fallbacks
/// exist for PDF runs that fail, not as a substitute for missing tools.
pub fn plan_strategies(
    backend: Backend,
    toolchain: &Toolchain,
    html_fallback: bool,
) -> Result<Vec<Strategy>, Md2PdfError> {
    let candidates: &[Strategy] = match (backend, html_fallback) {
        (Backend::Pandoc, false) => &[Strategy::PandocFull, Strategy::PandocMinimal],
        (Backend::Pandoc, true) => &[
            Strategy::PandocFull,
            Strategy::PandocMinimal,
            Strategy::PandocHtml,
        ],
        (Backend::Html, false) => &[Strategy::HtmlEngine],
        (Backend::Html, true) => &[Strategy::HtmlEngine, Strategy::BuiltinHtml],
        (Backend::Auto, false) => &[
            Strategy::PandocFull,
            Strategy::PandocMinimal,
            Strategy::HtmlEngine,
        ],
        (Backend::Auto, true) => &[
            Strategy::PandocFull,
            Strategy::PandocMinimal,
            Strategy::HtmlEngine,
            Strategy::PandocHtml,
            Strategy::BuiltinHtml,
        ],
    };

    let plan: Vec<Strategy> = candidates
        .iter()
        .copied()
        .filter(|s| strategy_runnable(*s, toolchain))
        .collect();

    if !plan.iter().any(|s| s.artifact() == crate::output::ArtifactKind::Pdf) {
        return Err(Md2PdfError::NoStrategyAvailable {
            backend: backend.to_string(),
            missing: if toolchain.missing.is_empty() {
                "no PDF-producing tool configured".to_string()
            } else {
                toolchain.missing.join("; ")
            },
        });
    }
    Ok(plan)
}

fn strategy_runnable(strategy: Strategy, toolchain: &Toolchain) -> bool {
    match strategy {
        Strategy::PandocFull | Strategy::PandocMinimal => {
            toolchain.pandoc.is_some() && toolchain.latex.is_some()
        }
        Strategy::PandocHtml => toolchain.pandoc.is_some(),
        Strategy::HtmlEngine => toolchain.html_engine.is_some(),
        Strategy::BuiltinHtml => true,
    }
}

/// One document going through the chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainJob<'a> {
    /// 1-based batch position, for progress events.
    pub index: usize,
    /// The input as the user gave it.
    pub input: &'a str,
    /// Normalised Markdown.
    pub source: &'a str,
    /// Directory relative links resolve against.
    pub source_dir: Option<&'a Path>,
    pub title: &'a str,
    /// Requested PDF path.
    pub target: &'a Path,
    /// Directory for intermediate files; removed by the caller.
    pub scratch: &'a Path,
}

/// What the successful strategy left behind.
#[derive(Debug)]
pub struct ChainOutcome {
    pub strategy: Strategy,
    pub output: PathBuf,
    pub output_bytes: u64,
    pub failed_attempts: Vec<AttemptRecord>,
    pub kept_html: Option<PathBuf>,
}

/// Run `plan` in order until one strategy produces a valid artefact.
pub async fn run_chain(
    plan: &[Strategy],
    job: &ChainJob<'_>,
    toolchain: &Toolchain,
    config: &ConversionConfig,
) -> Result<ChainOutcome, Md2PdfError> {
    let mut runner = Runner {
        job,
        toolchain,
        config,
        markdown_file: None,
        html: None,
    };
    let mut failed: Vec<AttemptRecord> = Vec::new();

    for &strategy in plan {
        info!("{}: trying {}", job.input, strategy);
        let started = Instant::now();
        match runner.attempt(strategy).await? {
            Ok((output, output_bytes, kept_html)) => {
                if !failed.is_empty() {
                    warn!(
                        "{}: {} succeeded after {} failed attempt(s)",
                        job.input,
                        strategy,
                        failed.len()
                    );
                }
                return Ok(ChainOutcome {
                    strategy,
                    output,
                    output_bytes,
                    failed_attempts: failed,
                    kept_html,
                });
            }
            Err(error) => {
                warn!("{}: {} failed: {}", job.input, strategy, error);
                if let Some(cb) = &config.progress_callback {
                    cb.on_attempt_failed(job.index, strategy, &error);
                }
                failed.push(AttemptRecord {
                    strategy,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error,
                });
            }
        }
    }

    let first_error = failed
        .first()
        .map(|a| a.error.to_string())
        .unwrap_or_else(|| "no strategy was planned".to_string());
    let last_error = failed
        .last()
        .map(|a| a.error.to_string())
        .unwrap_or_else(|| first_error.clone());
    Err(Md2PdfError::AllStrategiesFailed {
        input: job.input.to_string(),
        attempts: failed.len(),
        first_error,
        last_error,
    })
}

type AttemptResult = Result<(PathBuf, u64, Option<PathBuf>), AttemptError>;

struct Runner<'j, 'a> {
    job: &'j ChainJob<'a>,
    toolchain: &'j Toolchain,
    config: &'j ConversionConfig,
    /// Normalised Markdown written for pandoc, created on first use.
    markdown_file: Option<PathBuf>,
    /// Rendered HTML document, created on first use.
    html: Option<String>,
}

impl Runner<'_, '_> {
    /// The outer `Result` is fatal for the whole chain; the inner one is a
    /// failed attempt.
    async fn attempt(&mut self, strategy: Strategy) -> Result<AttemptResult, Md2PdfError> {
        let expect_pdf = strategy.artifact() == crate::output::ArtifactKind::Pdf;
        let final_path = if expect_pdf {
            self.job.target.to_path_buf()
        } else {
            self.job.target.with_extension("html")
        };
        let temp = match sibling_temp(&final_path) {
            Ok(t) => t,
            Err(e) => {
                return Err(Md2PdfError::OutputWriteFailed {
                    path: final_path,
                    source: e,
                })
            }
        };

        let produced = match strategy {
            Strategy::PandocFull | Strategy::PandocMinimal | Strategy::PandocHtml => {
                self.run_pandoc(strategy, &temp).await
            }
            Strategy::HtmlEngine => self.run_engine(&temp).await,
            Strategy::BuiltinHtml => match self.html() {
                Ok(html) => tokio::fs::write(&temp, html)
                    .await
                    .map_err(AttemptError::from),
                Err(fatal) => return Err(fatal),
            },
        };
        if let Err(e) = produced {
            return Ok(Err(e));
        }

        let bytes = match exec::validate_artifact(&temp, expect_pdf).await {
            Ok(b) => b,
            Err(e) => return Ok(Err(e)),
        };

        temp.persist(&final_path)
            .map_err(|e| Md2PdfError::OutputWriteFailed {
                path: final_path.clone(),
                source: e.error,
            })?;
        info!("Wrote {} ({} bytes)", final_path.display(), bytes);

        let kept_html = if strategy == Strategy::HtmlEngine && self.config.keep_html {
            Some(self.keep_html().await?)
        } else {
            None
        };
        Ok(Ok((final_path, bytes, kept_html)))
    }

    async fn run_pandoc(&mut self, strategy: Strategy, out: &Path) -> Result<(), AttemptError> {
        let pandoc = self
            .toolchain
            .pandoc
            .as_ref()
            .ok_or_else(|| not_found("pandoc"))?;
        let latex = match (&self.toolchain.latex, strategy) {
            (Some(p), _) => p.clone(),
            (None, Strategy::PandocHtml) => PathBuf::from(self.config.latex_engine.as_str()),
            (None, _) => return Err(not_found(self.config.latex_engine.as_str())),
        };
        let input = self.markdown_file().await?;
        let job = PandocJob {
            pandoc: &pandoc.path,
            version: PandocVersion::from_banner_or_current(&pandoc.version),
            input: &input,
            output: out,
            resource_dir: self.job.source_dir,
            latex_engine: &latex,
            title: self.job.title,
        };
        let inv: Invocation = match strategy {
            Strategy::PandocFull => pandoc::full_invocation(&job, self.config),
            Strategy::PandocMinimal => pandoc::minimal_invocation(&job, self.config),
            _ => pandoc::html_invocation(&job),
        };
        exec::run(&inv, self.config.process_timeout_secs).await?;
        Ok(())
    }

    async fn run_engine(&mut self, out: &Path) -> Result<(), AttemptError> {
        let program = self
            .toolchain
            .html_engine
            .clone()
            .ok_or_else(|| not_found(self.config.html_engine.tool().name()))?;
        let html_path = self.job.scratch.join("document.html");
        let html = self.html().map_err(|e| AttemptError::Io {
            detail: e.to_string(),
        })?;
        tokio::fs::write(&html_path, html).await?;
        let inv = engine_invocation(
            self.config.html_engine,
            &program,
            &html_path,
            out,
            self.job.source_dir,
            self.config,
        );
        exec::run(&inv, self.config.process_timeout_secs).await?;
        Ok(())
    }

    async fn markdown_file(&mut self) -> Result<PathBuf, AttemptError> {
        if let Some(p) = &self.markdown_file {
            return Ok(p.clone());
        }
        let path = self.job.scratch.join("document.md");
        tokio::fs::write(&path, self.job.source).await?;
        self.markdown_file = Some(path.clone());
        Ok(path)
    }

    fn html(&mut self) -> Result<String, Md2PdfError> {
        if let Some(h) = &self.html {
            return Ok(h.clone());
        }
        let ctx = DocumentContext {
            base_dir: self.job.source_dir,
            fallback_title: Some(self.job.title),
        };
        let html = render_html_document(self.job.source, self.config, &ctx)?;
        self.html = Some(html.clone());
        Ok(html)
    }

    async fn keep_html(&mut self) -> Result<PathBuf, Md2PdfError> {
        let path = self.job.target.with_extension("html");
        let html = self.html()?;
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| Md2PdfError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        Ok(path)
    }
}

fn not_found(program: &str) -> AttemptError {
    AttemptError::Spawn {
        program: program.to_string(),
        detail: "not found".into(),
    }
}

/// A hidden temp file next to `target` with the same extension.
fn sibling_temp(target: &Path) -> std::io::Result<TempPath> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let suffix = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok(tempfile::Builder::new()
        .prefix(".md2pdf-")
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path())
}
