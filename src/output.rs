//! Result types returned by the conversion entry points.

use crate::error::{AttemptError, Md2PdfError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// pandoc with every layout option and strict LaTeX engine flags.
    PandocFull,
    /// pandoc with only the options that need no extra LaTeX packages.
    PandocMinimal,
    /// comrak HTML printed by the configured headless engine.
    HtmlEngine,
    /// pandoc standalone HTML with MathJax (fallback, not a PDF).
    PandocHtml,
    /// comrak HTML written as-is (fallback, needs no external tool).
    BuiltinHtml,
}

impl Strategy {
    /// Kind of artefact this strategy writes.
    pub fn artifact(self) -> ArtifactKind {
        match self {
            Strategy::PandocFull | Strategy::PandocMinimal | Strategy::HtmlEngine => {
                ArtifactKind::Pdf
            }
            Strategy::PandocHtml | Strategy::BuiltinHtml => ArtifactKind::Html,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::PandocFull => "pandoc-full",
            Strategy::PandocMinimal => "pandoc-minimal",
            Strategy::HtmlEngine => "html-engine",
            Strategy::PandocHtml => "pandoc-html",
            Strategy::BuiltinHtml => "builtin-html",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful conversion left on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pdf,
    /// HTML to be opened in a browser and printed to PDF by hand.
    Html,
}

/// One strategy that ran and failed before the chain moved on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub strategy: Strategy,
    pub duration_ms: u64,
    pub error: AttemptError,
}

/// Timing and size figures for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Bytes of Markdown read.
    pub input_bytes: u64,
    /// Bytes of the produced artefact.
    pub output_bytes: u64,
    /// Strategies run, including the successful one.
    pub attempts: usize,
    pub total_duration_ms: u64,
}

/// The outcome of converting one Markdown document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The input as given (path or URL).
    pub input: String,
    /// Path of the artefact written. For HTML fallbacks this is the `.html`
    /// sibling of the requested PDF path.
    pub output: PathBuf,
    pub artifact: ArtifactKind,
    /// The strategy that produced `output`.
    pub strategy: Strategy,
    /// Strategies that failed before `strategy` succeeded, in order.
    pub failed_attempts: Vec<AttemptRecord>,
    /// Intermediate HTML kept next to the PDF, when requested.
    pub kept_html: Option<PathBuf>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn is_pdf(&self) -> bool {
        self.artifact == ArtifactKind::Pdf
    }

    /// Treat an HTML fallback as a failure.
    pub fn into_pdf_result(self) -> Result<Self, Md2PdfError> {
        if self.is_pdf() {
            Ok(self)
        } else {
            Err(Md2PdfError::PdfNotProduced { path: self.output })
        }
    }
}

/// Per-file outcome inside a batch.
///
/// Exactly one of `output` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// 1-based position in the batch.
    pub index: usize,
    pub input: String,
    pub output: Option<ConversionOutput>,
    pub error: Option<String>,
}

impl FileResult {
    pub fn is_pdf(&self) -> bool {
        self.output.as_ref().is_some_and(ConversionOutput::is_pdf)
    }
}

/// Aggregate figures for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub pdf_files: usize,
    pub html_fallbacks: usize,
    pub failed_files: usize,
    pub total_duration_ms: u64,
}

/// The outcome of a batch, files in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub files: Vec<FileResult>,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(strategy: Strategy) -> ConversionOutput {
        ConversionOutput {
            input: "a.md".into(),
            output: PathBuf::from("a.html"),
            artifact: strategy.artifact(),
            strategy,
            failed_attempts: vec![],
            kept_html: None,
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn fallback_strategies_produce_html() {
        assert_eq!(Strategy::PandocFull.artifact(), ArtifactKind::Pdf);
        assert_eq!(Strategy::HtmlEngine.artifact(), ArtifactKind::Pdf);
        assert_eq!(Strategy::PandocHtml.artifact(), ArtifactKind::Html);
        assert_eq!(Strategy::BuiltinHtml.artifact(), ArtifactKind::Html);
    }

    #[test]
    fn into_pdf_result_rejects_html_fallback() {
        let err = output(Strategy::PandocHtml).into_pdf_result().unwrap_err();
        assert!(matches!(err, Md2PdfError::PdfNotProduced { .. }));
        assert!(output(Strategy::PandocMinimal).into_pdf_result().is_ok());
    }

    #[test]
    fn strategy_serialises_kebab_case() {
        let json = serde_json::to_string(&Strategy::PandocMinimal).unwrap();
        assert_eq!(json, "\"pandoc-minimal\"");
        assert_eq!(Strategy::BuiltinHtml.to_string(), "builtin-html");
    }

    #[test]
    fn file_result_is_pdf_only_with_pdf_output() {
        let ok = FileResult {
            index: 1,
            input: "a.md".into(),
            output: Some(output(Strategy::HtmlEngine)),
            error: None,
        };
        let failed = FileResult {
            index: 2,
            input: "b.md".into(),
            output: None,
            error: Some("boom".into()),
        };
        assert!(ok.is_pdf());
        assert!(!failed.is_pdf());
    }
}
