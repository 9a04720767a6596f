//! # md2pdf
//!
//! Convert Markdown documents, including `$…$` and `$$…$$` LaTeX math, to PDF.
//!
//! The crate typesets nothing itself. It drives tools that already do it
//! well and falls back from one to the next when a run fails:
//!
//! 1. pandoc with a LaTeX engine, full layout options
//! 2. pandoc with a LaTeX engine, options needing no extra packages
//! 3. comrak-rendered HTML printed by WeasyPrint, wkhtmltopdf or Chromium
//! 4. pandoc standalone HTML with MathJax (for printing from a browser)
//! 5. comrak-rendered HTML written as-is
//!
//! The last two produce an `.html` next to the requested PDF rather than a
//! PDF; they can be switched off with
//! [`ConversionConfigBuilder::html_fallback`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Normalize  BOM, line endings, title
//!  ├─ 3. Toolchain  locate pandoc / LaTeX / HTML engine
//!  ├─ 4. Chain      run strategies until one yields a valid artefact
//!  └─ 5. Output     PDF (or HTML fallback) + per-attempt records
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("notes.md", &config).await?;
//!     println!("{} via {}", output.output.display(), output.strategy);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `katex` | off     | Server-side KaTeX rendering for the HTML backend |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! Tools are found on `PATH`, or through `MD2PDF_PANDOC`, `MD2PDF_PDFLATEX`,
//! `MD2PDF_XELATEX`, `MD2PDF_LUALATEX`, `MD2PDF_WEASYPRINT`,
//! `MD2PDF_WKHTMLTOPDF` and `MD2PDF_CHROMIUM`. [`check_dependencies`]
//! reports what was found.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Backend, ConversionConfig, ConversionConfigBuilder, HtmlEngine, LatexEngine, LengthUnit,
    Margin, MathMode, PaperSize,
};
pub use convert::{
    check_dependencies, convert, convert_batch, convert_jobs, convert_sync, convert_to_file,
    plan_jobs, render_markdown, Job,
};
pub use error::{AttemptError, Md2PdfError};
pub use output::{
    ArtifactKind, AttemptRecord, BatchOutput, BatchStats, ConversionOutput, ConversionStats,
    FileResult, Strategy,
};
pub use pipeline::html::markdown_to_html;
pub use pipeline::math::{extract_math, preprocess_math, MathFragment, PreparedMarkdown};
pub use pipeline::toolchain::{DependencyReport, ToolStatus};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, FileStream};
pub use toolchain_probe::Tool;
