//! Input resolution: normalise a user-supplied path or URL to a local file
//! and read it as UTF-8 Markdown.
//!
//! pandoc and the HTML engines take file paths, and relative image links are
//! resolved against the document's directory, so URL inputs are downloaded
//! into a `TempDir` that lives as long as the [`ResolvedInput`].

use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input, either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the Markdown was downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path of the Markdown file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Directory relative links in the document resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.path().parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Read the file and check it is UTF-8.
    pub async fn read_text(&self) -> Result<String, Md2PdfError> {
        let path = self.path();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::NotFound => Md2PdfError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Md2PdfError::Internal(format!("Failed to read '{}': {e}", path.display())),
        })?;
        String::from_utf8(bytes).map_err(|e| Md2PdfError::NotUtf8 {
            path: path.to_path_buf(),
            offset: e.utf8_error().valid_up_to(),
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local Markdown file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Md2PdfError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Where the PDF goes when the caller did not name an output.
///
/// Local inputs get a `.pdf` sibling; URL inputs get `<stem>.pdf` in the
/// current directory.
pub fn default_output_path(input: &str) -> PathBuf {
    if is_url(input) {
        let name = url_file_name(input).unwrap_or_else(|| "downloaded.md".to_string());
        Path::new(&name).with_extension("pdf")
    } else {
        Path::new(input).with_extension("pdf")
    }
}

/// The file stem used for titles and batch output names.
pub fn input_stem(input: &str) -> String {
    let name = if is_url(input) {
        url_file_name(input).unwrap_or_else(|| "downloaded.md".to_string())
    } else {
        input.to_string()
    };
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Md2PdfError> {
    if path_str.trim().is_empty() {
        return Err(Md2PdfError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Md2PdfError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(Md2PdfError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Md2PdfError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Md2PdfError::FileNotFound { path });
        }
    }

    debug!("Resolved local Markdown: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Md2PdfError> {
    info!("Downloading Markdown from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Md2PdfError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Md2PdfError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Md2PdfError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Md2PdfError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = url_file_name(url).unwrap_or_else(|| "downloaded.md".to_string());

    let temp_dir = TempDir::new().map_err(|e| Md2PdfError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            Md2PdfError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Md2PdfError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of a URL when it looks like a file name.
fn url_file_name(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() || !last.contains('.') {
        return None;
    }
    Some(last.to_string())
}
