//! Eager conversion entry points.
//!
//! [`convert`] and [`convert_to_file`] handle one document; [`convert_batch`]
//! handles many and returns once all are done. Use
//! [`crate::stream::convert_stream`] to receive per-file results as they
//! complete instead.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::output::{
    ArtifactKind, BatchOutput, BatchStats, ConversionOutput, ConversionStats, FileResult,
};
use crate::pipeline::chain::{self, ChainJob};
use crate::pipeline::normalize::{extract_title, normalize_source};
use crate::pipeline::toolchain::{self, DependencyReport, Toolchain};
use crate::pipeline::input;
use crate::stream::convert_stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One input and the PDF path it should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: String,
    pub output: PathBuf,
}

/// Convert a Markdown file or URL to a PDF next to it.
///
/// This is the primary entry point for the library. The output path is the
/// input with a `.pdf` extension; for URLs it is `<stem>.pdf` in the current
/// directory.
///
/// # Returns
/// `Ok(ConversionOutput)` once any strategy produced an artefact. Check
/// [`ConversionOutput::is_pdf`]: when every PDF strategy failed and HTML
/// fallback is enabled, the artefact is an `.html` file. Use
/// [`ConversionOutput::into_pdf_result`] to treat that as an error.
///
/// # Errors
/// Returns `Err(Md2PdfError)` only for fatal errors:
/// - File not found / permission denied / not UTF-8
/// - No tool installed for the configured backend
/// - Every strategy failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let input_str = input_str.as_ref();
    convert_to_file(input_str, input::default_output_path(input_str), config).await
}

/// Convert a Markdown file or URL to the PDF at `output_path`.
///
/// Missing parent directories are created. If only an HTML fallback can be
/// produced it is written next to `output_path` with an `.html` extension.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let job = Job {
        input: input_str.as_ref().to_string(),
        output: output_path.as_ref().to_path_buf(),
    };
    let toolchain = toolchain::discover(config).await;
    convert_job(&job, 1, 1, &toolchain, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally, so it must not be called
/// from inside an async context. Front-ends use it from a worker thread to
/// stay responsive while a conversion runs.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Render Markdown text straight to PDF bytes.
///
/// Only PDF-producing strategies are tried; HTML fallback is never used.
/// Relative links resolve against the current directory.
///
/// # Example
/// ```rust,no_run
/// use md2pdf::{render_markdown, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pdf = render_markdown("# Hello\n\n$e^{i\\pi} + 1 = 0$\n", &ConversionConfig::default()).await?;
/// std::fs::write("hello.pdf", pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn render_markdown(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<Vec<u8>, Md2PdfError> {
    let toolchain = toolchain::discover(config).await;
    let plan = chain::plan_strategies(config.backend, &toolchain, false)?;

    let scratch = tempfile::tempdir().map_err(|e| Md2PdfError::Internal(format!("tempdir: {e}")))?;
    let target = scratch.path().join("document.pdf");
    let source = normalize_source(markdown);
    let title = config
        .title
        .clone()
        .or_else(|| extract_title(&source))
        .unwrap_or_else(|| "Document".to_string());
    let cwd = std::env::current_dir().ok();

    let job = ChainJob {
        index: 1,
        input: "<memory>",
        source: &source,
        source_dir: cwd.as_deref(),
        title: &title,
        target: &target,
        scratch: scratch.path(),
    };
    let outcome = chain::run_chain(&plan, &job, &toolchain, config).await?;
    tokio::fs::read(&outcome.output)
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Failed to read rendered PDF: {e}")))
}

/// Convert several inputs, at most `config.concurrency` at a time.
///
/// With `output_dir`, each PDF is written there as `<stem>.pdf`; without
/// it, next to its input. A failed file does not stop the batch: its
/// [`FileResult::error`] is set and the others continue.
///
/// # Errors
/// Only when the batch itself is invalid (no inputs, two inputs mapping to
/// the same output).
pub async fn convert_batch<S: AsRef<str>>(
    inputs: &[S],
    output_dir: Option<&Path>,
    config: &ConversionConfig,
) -> Result<BatchOutput, Md2PdfError> {
    let jobs = plan_jobs(inputs, output_dir)?;
    convert_jobs(jobs, config).await
}

/// Convert already-planned jobs and collect the results in input order.
pub async fn convert_jobs(
    jobs: Vec<Job>,
    config: &ConversionConfig,
) -> Result<BatchOutput, Md2PdfError> {
    let started = Instant::now();
    let total = jobs.len();
    info!("Converting {} file(s)", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut files: Vec<FileResult> = convert_stream(jobs, config).await?.collect().await;
    files.sort_by_key(|f| f.index);

    let pdf_files = files.iter().filter(|f| f.is_pdf()).count();
    let failed_files = files.iter().filter(|f| f.error.is_some()).count();
    let stats = BatchStats {
        total_files: total,
        pdf_files,
        html_fallbacks: total - pdf_files - failed_files,
        failed_files,
        total_duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} PDF, {} HTML fallback, {} failed, {}ms",
        stats.pdf_files, total, stats.html_fallbacks, stats.failed_files, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, pdf_files);
    }

    Ok(BatchOutput { files, stats })
}

/// Probe the external tools the configured backend needs.
pub fn check_dependencies(config: &ConversionConfig) -> DependencyReport {
    toolchain::check_dependencies(config)
}

/// Work out each input's PDF path.
///
/// # Errors
/// `InvalidConfig` when `inputs` is empty or two inputs would write the same
/// output file.
pub fn plan_jobs<S: AsRef<str>>(
    inputs: &[S],
    output_dir: Option<&Path>,
) -> Result<Vec<Job>, Md2PdfError> {
    if inputs.is_empty() {
        return Err(Md2PdfError::InvalidConfig("No input files given".into()));
    }

    let mut seen: HashMap<PathBuf, String> = HashMap::new();
    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let input = input.as_ref();
        let output = match output_dir {
            Some(dir) => dir.join(format!("{}.pdf", input::input_stem(input))),
            None => input::default_output_path(input),
        };
        if let Some(previous) = seen.insert(collision_key(&output), input.to_string()) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "'{}' and '{}' would both be written to '{}'",
                previous,
                input,
                output.display()
            )));
        }
        jobs.push(Job {
            input: input.to_string(),
            output,
        });
    }
    Ok(jobs)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// `path` without `.` components, so `./a.pdf` and `a.pdf` compare equal.
fn collision_key(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Convert one job, firing its progress events.
pub(crate) async fn convert_job(
    job: &Job,
    index: usize,
    total: usize,
    toolchain: &Toolchain,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(index, total, &job.input);
    }

    let result = convert_job_inner(job, index, toolchain, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(out) => cb.on_file_complete(index, total, &out.output, out.is_pdf()),
            Err(e) => cb.on_file_error(index, total, &e.to_string()),
        }
    }
    result
}

async fn convert_job_inner(
    job: &Job,
    index: usize,
    toolchain: &Toolchain,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    info!("Starting conversion: {} → {}", job.input, job.output.display());

    // ── Step 1: Resolve and read input ───────────────────────────────────
    let resolved = input::resolve_input(&job.input, config.download_timeout_secs).await?;
    let raw = resolved.read_text().await?;
    let source = normalize_source(&raw);
    debug!("Read {} bytes from {}", raw.len(), resolved.path().display());

    // ── Step 2: Plan strategies ──────────────────────────────────────────
    let plan = chain::plan_strategies(config.backend, toolchain, config.html_fallback)?;
    debug!(
        "Plan: {}",
        plan.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" → ")
    );

    // ── Step 3: Prepare output location ──────────────────────────────────
    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Md2PdfError::OutputWriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    let scratch = tempfile::tempdir().map_err(|e| Md2PdfError::Internal(format!("tempdir: {e}")))?;

    let title = config
        .title
        .clone()
        .or_else(|| extract_title(&source))
        .unwrap_or_else(|| input::input_stem(&job.input));

    // ── Step 4: Run the fallback chain ───────────────────────────────────
    let chain_job = ChainJob {
        index,
        input: &job.input,
        source: &source,
        source_dir: resolved.base_dir(),
        title: &title,
        target: &job.output,
        scratch: scratch.path(),
    };
    let outcome = chain::run_chain(&plan, &chain_job, toolchain, config).await?;

    let artifact = outcome.strategy.artifact();
    if artifact == ArtifactKind::Html {
        warn!(
            "PDF conversion failed for {}; wrote HTML fallback {}. Open it in a browser and print to PDF.",
            job.input,
            outcome.output.display()
        );
    }

    let stats = ConversionStats {
        input_bytes: raw.len() as u64,
        output_bytes: outcome.output_bytes,
        attempts: outcome.failed_attempts.len() + 1,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} via {} in {}ms",
        outcome.output.display(),
        outcome.strategy,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        input: job.input.clone(),
        output: outcome.output,
        artifact,
        strategy: outcome.strategy,
        failed_attempts: outcome.failed_attempts,
        kept_html: outcome.kept_html,
        stats,
    })
}
