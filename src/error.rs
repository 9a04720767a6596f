//! Error types for the md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] is **fatal**: this input cannot be converted at all
//!   (missing file, bad configuration, every strategy failed). Returned as
//!   `Err(Md2PdfError)` from the top-level `convert*` functions.
//!
//! * [`AttemptError`] is **non-fatal**: one strategy of the fallback chain
//!   failed (pandoc exited non-zero, the engine timed out, the output was not
//!   a PDF). Stored in [`crate::output::AttemptRecord`] while the next
//!   strategy is tried.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The Markdown source is not valid UTF-8.
    #[error("'{path}' is not valid UTF-8 (byte offset {offset})")]
    NotUtf8 { path: PathBuf, offset: usize },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Toolchain errors ──────────────────────────────────────────────────
    /// None of the strategies the backend allows can run on this machine.
    #[error("No conversion strategy available for backend '{backend}'.\nMissing: {missing}")]
    NoStrategyAvailable { backend: String, missing: String },

    /// Every strategy of the fallback chain was tried and failed.
    #[error(
        "All {attempts} conversion strategies failed for '{input}'.\n\
First error: {first_error}\nLast error: {last_error}"
    )]
    AllStrategiesFailed {
        input: String,
        attempts: usize,
        first_error: String,
        last_error: String,
    },

    /// Only an HTML fallback was produced, and the caller required a PDF.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_pdf_result`].
    #[error("PDF conversion failed; only an HTML fallback was written to '{path}'")]
    PdfNotProduced { path: PathBuf },

    /// KaTeX rejected a math span.
    #[error("Math rendering failed for '{expr}': {detail}")]
    MathRender { expr: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or the batch plan is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single strategy of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// The program could not be started.
    #[error("failed to start '{program}': {detail}")]
    Spawn { program: String, detail: String },

    /// The program ran but exited unsuccessfully.
    #[error("'{program}' exited with {}: {stderr}", exit_code_label(.code))]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program did not finish within the process timeout.
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The program reported success but the artefact is missing or invalid.
    #[error("invalid output '{path}': {detail}")]
    InvalidOutput { path: PathBuf, detail: String },

    /// Writing an intermediate file failed.
    #[error("I/O error: {detail}")]
    Io { detail: String },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "a signal".to_string(),
    }
}

impl From<std::io::Error> for AttemptError {
    fn from(e: std::io::Error) -> Self {
        AttemptError::Io {
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_strategies_failed_display() {
        let e = Md2PdfError::AllStrategiesFailed {
            input: "notes.md".into(),
            attempts: 3,
            first_error: "pdflatex missing".into(),
            last_error: "pandoc exited".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3"), "got: {msg}");
        assert!(msg.contains("notes.md"));
        assert!(msg.contains("pdflatex missing"));
    }

    #[test]
    fn exit_status_display_with_code() {
        let e = AttemptError::ExitStatus {
            program: "pandoc".into(),
            code: Some(43),
            stderr: "Error producing PDF.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit code 43"), "got: {msg}");
        assert!(msg.contains("Error producing PDF."));
    }

    #[test]
    fn exit_status_display_killed_by_signal() {
        let e = AttemptError::ExitStatus {
            program: "weasyprint".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(e.to_string().contains("a signal"));
    }

    #[test]
    fn timeout_display() {
        let e = AttemptError::Timeout {
            program: "xelatex".into(),
            secs: 300,
        };
        assert!(e.to_string().contains("300s"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e: AttemptError = io.into();
        assert!(e.to_string().contains("disk full"));
    }
}
