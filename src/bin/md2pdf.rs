//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    check_dependencies, convert_jobs, plan_jobs, AttemptError, Backend, BatchOutput,
    ConversionConfig, ConversionProgressCallback, DependencyReport, HtmlEngine, Job, LatexEngine,
    Margin, MathMode, PaperSize, ProgressCallback, Strategy,
};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over the batch plus one log line
/// per file. Works when files complete out of order (`-j > 1`).
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Looking for pandoc and friends…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn on_file_start(&self, index: usize, _total: usize, input: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(input.to_string());
    }

    fn on_attempt_failed(&self, _index: usize, strategy: Strategy, error: &AttemptError) {
        let msg = truncate(&error.to_string(), 100);
        self.bar
            .println(format!("    {} {}", dim(&format!("{strategy} failed:")), dim(&msg)));
    }

    fn on_file_complete(&self, index: usize, total: usize, output: &Path, is_pdf: bool) {
        let secs = self.elapsed_secs(index);
        let mark = if is_pdf { green("✓") } else { yellow("⚠") };
        let note = if is_pdf { "" } else { "  (HTML fallback)" };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}{}  {}",
            mark,
            index,
            total,
            output.display(),
            yellow(note),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&truncate(first_line, 100)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, pdf_count: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        let fallbacks = total.saturating_sub(pdf_count + errors);
        if pdf_count == total {
            eprintln!(
                "{} {} file(s) converted to PDF",
                green("✔"),
                bold(&pdf_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} PDF  ({} HTML fallback, {} failed)",
                if pdf_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&pdf_count.to_string()),
                total,
                fallbacks,
                red(&errors.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (notes.pdf)
  md2pdf notes.md

  # Choose the output file
  md2pdf notes.md -o build/notes.pdf

  # Batch into a folder, two at a time
  md2pdf chapters/*.md --output-dir build -j 2

  # XeLaTeX for Unicode-heavy documents
  md2pdf --pdf-engine xelatex thesis.md

  # Skip LaTeX, print HTML with WeasyPrint
  md2pdf --backend html --paper letter --margin 2cm notes.md

  # Fail instead of writing an HTML fallback
  md2pdf --require-pdf notes.md

  # Check which tools are installed
  md2pdf --check-deps

STRATEGIES (tried in order, first valid PDF wins):
  pandoc-full      pandoc + LaTeX, all layout options
  pandoc-minimal   pandoc + LaTeX, options needing no extra packages
  html-engine      comrak HTML printed by weasyprint / wkhtmltopdf / chromium
  pandoc-html      standalone HTML with MathJax      (fallback, not a PDF)
  builtin-html     comrak HTML with the print CSS    (fallback, not a PDF)

ENVIRONMENT VARIABLES:
  MD2PDF_PANDOC, MD2PDF_PDFLATEX, MD2PDF_XELATEX, MD2PDF_LUALATEX,
  MD2PDF_WEASYPRINT, MD2PDF_WKHTMLTOPDF, MD2PDF_CHROMIUM
                          Path to a specific tool binary
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Convert Markdown files (with LaTeX math) to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files (with $…$ / $$…$$ math) to PDF",
    long_about = "Convert Markdown documents (local files or URLs) to PDF. pandoc with a LaTeX \
engine is tried first, then a headless HTML engine (WeasyPrint, wkhtmltopdf or Chromium). \
When every PDF route fails an HTML file is written instead, ready to print from a browser.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "check_deps")]
    inputs: Vec<String>,

    /// Write the PDF to this file (single input only).
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write every PDF into this directory as <stem>.pdf.
    #[arg(long, env = "MD2PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Which strategies to try.
    #[arg(long, env = "MD2PDF_BACKEND", value_enum, default_value = "auto")]
    backend: BackendArg,

    /// LaTeX engine for pandoc.
    #[arg(long, env = "MD2PDF_PDF_ENGINE", value_enum, default_value = "pdflatex")]
    pdf_engine: LatexArg,

    /// Headless HTML-to-PDF engine.
    #[arg(long, env = "MD2PDF_HTML_ENGINE", value_enum, default_value = "weasyprint")]
    html_engine: HtmlEngineArg,

    /// Paper size.
    #[arg(long, env = "MD2PDF_PAPER", value_enum, default_value = "a4")]
    paper: PaperArg,

    /// Page margin: a number followed by in, cm, mm or pt.
    #[arg(long, env = "MD2PDF_MARGIN", default_value = "1in")]
    margin: String,

    /// Body font size in points (8–20).
    #[arg(long, env = "MD2PDF_FONT_SIZE", default_value_t = 12,
          value_parser = clap::value_parser!(u8).range(8..=20))]
    font_size: u8,

    /// LaTeX document class.
    #[arg(long, env = "MD2PDF_DOCUMENT_CLASS", default_value = "article")]
    document_class: String,

    /// pandoc highlight style for the first attempt.
    #[arg(long, env = "MD2PDF_HIGHLIGHT_STYLE", default_value = "tango")]
    highlight_style: String,

    /// How math is emitted by the HTML backend.
    #[arg(long, env = "MD2PDF_MATH", value_enum, default_value = "markers")]
    math: MathArg,

    /// Extra CSS appended to the built-in stylesheet (HTML backend).
    #[arg(long, env = "MD2PDF_STYLESHEET")]
    stylesheet: Option<PathBuf>,

    /// Document title (default: front matter, first heading, or file name).
    #[arg(long)]
    title: Option<String>,

    /// Fail instead of writing an HTML file when no PDF could be produced.
    #[arg(long, env = "MD2PDF_NO_HTML_FALLBACK")]
    no_html_fallback: bool,

    /// Keep the intermediate HTML of the HTML backend next to the PDF.
    #[arg(long, env = "MD2PDF_KEEP_HTML")]
    keep_html: bool,

    /// Treat an HTML fallback as a failure (exit code 1).
    #[arg(long, env = "MD2PDF_REQUIRE_PDF")]
    require_pdf: bool,

    /// Open each produced PDF with the system viewer.
    #[arg(long)]
    open: bool,

    /// Number of files converted at once.
    #[arg(short = 'j', long, env = "MD2PDF_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Per-process timeout in seconds for pandoc and the HTML engines.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MD2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Report which external tools are installed, then exit.
    #[arg(long)]
    check_deps: bool,

    /// Print the results as JSON on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level logs and verbose tool output.
    #[arg(short, long, alias = "debug", env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET", conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs to this file.
    #[arg(long, env = "MD2PDF_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Pandoc,
    Html,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Pandoc => Backend::Pandoc,
            BackendArg::Html => Backend::Html,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LatexArg {
    Pdflatex,
    Xelatex,
    Lualatex,
}

impl From<LatexArg> for LatexEngine {
    fn from(v: LatexArg) -> Self {
        match v {
            LatexArg::Pdflatex => LatexEngine::PdfLatex,
            LatexArg::Xelatex => LatexEngine::XeLatex,
            LatexArg::Lualatex => LatexEngine::LuaLatex,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HtmlEngineArg {
    Weasyprint,
    Wkhtmltopdf,
    Chromium,
}

impl From<HtmlEngineArg> for HtmlEngine {
    fn from(v: HtmlEngineArg) -> Self {
        match v {
            HtmlEngineArg::Weasyprint => HtmlEngine::WeasyPrint,
            HtmlEngineArg::Wkhtmltopdf => HtmlEngine::Wkhtmltopdf,
            HtmlEngineArg::Chromium => HtmlEngine::Chromium,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    A4,
    A5,
    Letter,
    Legal,
}

impl From<PaperArg> for PaperSize {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::A4 => PaperSize::A4,
            PaperArg::A5 => PaperSize::A5,
            PaperArg::Letter => PaperSize::Letter,
            PaperArg::Legal => PaperSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MathArg {
    Markers,
    Katex,
}

impl From<MathArg> for MathMode {
    fn from(v: MathArg) -> Self {
        match v {
            MathArg::Markers => MathMode::Markers,
            MathArg::Katex => MathMode::Katex,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_deps;
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    init_logging(level, cli.verbose, cli.log_file.as_deref())?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    debug!("{:?}", config);

    // ── Dependency check ─────────────────────────────────────────────────
    if cli.check_deps {
        let report = tokio::task::spawn_blocking({
            let config = config.clone();
            move || check_dependencies(&config)
        })
        .await
        .context("Dependency check panicked")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            print_report(&report);
        }
        return Ok(if report.is_ready() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // ── Plan ─────────────────────────────────────────────────────────────
    let jobs: Vec<Job> = match &cli.output {
        Some(output) => {
            if cli.inputs.len() != 1 {
                anyhow::bail!(
                    "-o/--output takes a single input ({} given); use --output-dir for batches",
                    cli.inputs.len()
                );
            }
            vec![Job {
                input: cli.inputs[0].clone(),
                output: output.clone(),
            }]
        }
        None => plan_jobs(&cli.inputs, cli.output_dir.as_deref()).context("Invalid inputs")?,
    };

    // ── Run conversion ───────────────────────────────────────────────────
    let batch = convert_jobs(jobs, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&batch).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.quiet {
        print_failures(&batch);
    } else {
        print_summary(&batch, show_progress);
    }

    if cli.open {
        for file in batch.files.iter().filter(|f| f.is_pdf()) {
            if let Some(out) = &file.output {
                open_with_viewer(&out.output);
            }
        }
    }

    let html_failures = if cli.require_pdf {
        batch.stats.html_fallbacks
    } else {
        0
    };
    if batch.stats.failed_files + html_failures > 0 {
        if cli.require_pdf && batch.stats.html_fallbacks > 0 {
            eprintln!(
                "{} {} file(s) produced only HTML and --require-pdf is set",
                red("✘"),
                batch.stats.html_fallbacks
            );
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Stderr gets the level chosen from the flags (`RUST_LOG` wins); the
/// optional log file always gets at least INFO, without colours.
fn init_logging(level: &str, verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let file_filter = EnvFilter::new(if verbose { "debug" } else { "info" });
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let margin: Margin = cli
        .margin
        .parse()
        .with_context(|| format!("Invalid --margin '{}'", cli.margin))?;

    let mut builder = ConversionConfig::builder()
        .backend(cli.backend.into())
        .latex_engine(cli.pdf_engine.into())
        .html_engine(cli.html_engine.into())
        .paper_size(cli.paper.into())
        .margin(margin)
        .font_size(cli.font_size)
        .document_class(&cli.document_class)
        .highlight_style(&cli.highlight_style)
        .math(cli.math.into())
        .html_fallback(!cli.no_html_fallback)
        .keep_html(cli.keep_html)
        .verbose_tools(cli.verbose)
        .concurrency(cli.jobs)
        .process_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref css) = cli.stylesheet {
        builder = builder.stylesheet(css);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_report(report: &DependencyReport) {
    println!("Backend: {}", report.backend);
    for t in &report.tools {
        let role = if t.required { "" } else { " (optional)" };
        match (&t.path, &t.version) {
            (Some(path), version) => println!(
                "{} {}{}  {}  {}",
                green("✓"),
                bold(&t.tool),
                role,
                path.display(),
                dim(version.as_deref().unwrap_or(""))
            ),
            (None, _) => {
                println!(
                    "{} {}{}  {}",
                    red("✗"),
                    bold(&t.tool),
                    role,
                    t.error.as_deref().unwrap_or("not found")
                );
                println!("    {}", dim(t.install_hint));
            }
        }
    }
    if report.is_ready() {
        println!("{} Ready to convert", green("✔"));
    } else {
        let missing: Vec<&str> = report.missing_required().map(|t| t.tool.as_str()).collect();
        println!(
            "{} Missing required tools: {}",
            red("✘"),
            missing.join(", ")
        );
    }
}

fn print_summary(batch: &BatchOutput, progress_shown: bool) {
    for file in &batch.files {
        match (&file.output, &file.error) {
            (Some(out), _) if out.is_pdf() => {
                if !progress_shown {
                    eprintln!(
                        "{} {} → {}  {}",
                        green("✓"),
                        file.input,
                        bold(&out.output.display().to_string()),
                        dim(&format!("{} · {}ms", out.strategy, out.stats.total_duration_ms)),
                    );
                }
            }
            (Some(out), _) => {
                eprintln!(
                    "{} PDF conversion failed for {}. Wrote HTML instead: {}",
                    yellow("⚠"),
                    file.input,
                    bold(&out.output.display().to_string()),
                );
                eprintln!("   Open it in a browser and print to PDF.");
                if let Some(last) = out.failed_attempts.last() {
                    eprintln!("   {}", dim(&format!("last error: {}", last.error)));
                }
            }
            (None, Some(e)) => {
                if !progress_shown {
                    eprintln!("{} {}: {}", red("✗"), file.input, e);
                }
            }
            (None, None) => {}
        }
    }
    if !progress_shown && batch.files.len() > 1 {
        eprintln!(
            "{} PDF, {} HTML fallback, {} failed in {}ms",
            batch.stats.pdf_files,
            batch.stats.html_fallbacks,
            batch.stats.failed_files,
            batch.stats.total_duration_ms
        );
    }
}

/// Quiet mode still names every file that produced nothing.
fn print_failures(batch: &BatchOutput) {
    for file in &batch.files {
        if let (None, Some(e)) = (&file.output, &file.error) {
            eprintln!("{} {}: {}", red("✗"), file.input, e);
        }
    }
}

/// Open `path` with the platform's default viewer, without waiting for it.
fn open_with_viewer(path: &Path) {
    #[cfg(target_os = "macos")]
    let result = std::process::Command::new("open").arg(path).spawn();
    #[cfg(target_os = "windows")]
    let result = std::process::Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(path)
        .spawn();
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let result = std::process::Command::new("xdg-open").arg(path).spawn();

    if let Err(e) = result {
        warn!("Could not open {}: {}", path.display(), e);
    }
}
