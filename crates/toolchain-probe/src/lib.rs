//! # toolchain-probe
//!
//! Locate the external programs a Markdown-to-PDF conversion delegates to,
//! and read their version banners, so callers can report a missing
//! dependency before spending time on a conversion that cannot succeed.
//!
//! ## How it works
//!
//! On a call to [`locate`]:
//!
//! 1. If the tool's override variable (for example `MD2PDF_PANDOC`) is set,
//!    that path is used. It must point to an existing file.
//! 2. Otherwise each candidate binary name is looked up on `PATH`
//!    (`chromium`, then `chromium-browser`, and so on).
//!
//! `PATH` lookups are memoised for the lifetime of the process; overrides are
//! re-read on every call so tests and wrappers can swap them.
//!
//! [`probe`] additionally runs `<tool> --version` and keeps the first
//! non-empty line of its output.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use toolchain_probe::{probe, Tool};
//!
//! match probe(Tool::Pandoc) {
//!     Ok(info) => println!("found {} at {}", info.version, info.path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! | Tool        | Variable              |
//! |-------------|-----------------------|
//! | pandoc      | `MD2PDF_PANDOC`       |
//! | pdflatex    | `MD2PDF_PDFLATEX`     |
//! | xelatex     | `MD2PDF_XELATEX`      |
//! | lualatex    | `MD2PDF_LUALATEX`     |
//! | weasyprint  | `MD2PDF_WEASYPRINT`   |
//! | wkhtmltopdf | `MD2PDF_WKHTMLTOPDF`  |
//! | chromium    | `MD2PDF_CHROMIUM`     |

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Banner reported when a tool runs fine but prints nothing useful.
pub const UNKNOWN_VERSION: &str = "version information not available";

/// How long [`read_version`] waits for `--version`.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by toolchain-probe operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No candidate binary was found on `PATH`.
    #[error("{tool} not found on PATH (set {var} to point at it)")]
    NotFound { tool: Tool, var: &'static str },

    /// The override variable points at a file that does not exist.
    #[error("{var} is set to '{path}', but that file does not exist")]
    OverrideMissing { var: &'static str, path: PathBuf },

    /// The binary exists but could not be started.
    #[error("failed to run '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `--version` exited unsuccessfully.
    #[error("'{path} --version' exited with {status}")]
    VersionFailed { path: PathBuf, status: String },

    /// `--version` did not finish in time and was killed.
    #[error("'{path} --version' did not finish within {secs}s")]
    VersionTimeout { path: PathBuf, secs: f32 },
}

// ── Tools ────────────────────────────────────────────────────────────────────

/// An external program used by the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Pandoc,
    PdfLatex,
    XeLatex,
    LuaLatex,
    WeasyPrint,
    Wkhtmltopdf,
    Chromium,
}

impl Tool {
    /// Every known tool, in display order.
    pub const ALL: [Tool; 7] = [
        Tool::Pandoc,
        Tool::PdfLatex,
        Tool::XeLatex,
        Tool::LuaLatex,
        Tool::WeasyPrint,
        Tool::Wkhtmltopdf,
        Tool::Chromium,
    ];

    /// Short human-readable name, also the primary binary name.
    pub fn name(self) -> &'static str {
        self.candidates()[0]
    }

    /// Binary names searched on `PATH`, most preferred first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Tool::Pandoc => &["pandoc"],
            Tool::PdfLatex => &["pdflatex"],
            Tool::XeLatex => &["xelatex"],
            Tool::LuaLatex => &["lualatex"],
            Tool::WeasyPrint => &["weasyprint"],
            Tool::Wkhtmltopdf => &["wkhtmltopdf"],
            Tool::Chromium => &[
                "chromium",
                "chromium-browser",
                "google-chrome",
                "google-chrome-stable",
            ],
        }
    }

    /// Environment variable that overrides the `PATH` lookup.
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Pandoc => "MD2PDF_PANDOC",
            Tool::PdfLatex => "MD2PDF_PDFLATEX",
            Tool::XeLatex => "MD2PDF_XELATEX",
            Tool::LuaLatex => "MD2PDF_LUALATEX",
            Tool::WeasyPrint => "MD2PDF_WEASYPRINT",
            Tool::Wkhtmltopdf => "MD2PDF_WKHTMLTOPDF",
            Tool::Chromium => "MD2PDF_CHROMIUM",
        }
    }

    /// Where to get the tool, shown next to "not found" diagnostics.
    pub fn install_hint(self) -> &'static str {
        match self {
            Tool::Pandoc => "Install pandoc from https://pandoc.org/installing.html",
            Tool::PdfLatex | Tool::XeLatex | Tool::LuaLatex => {
                "Install a TeX distribution (TeX Live or MiKTeX)"
            }
            Tool::WeasyPrint => "Install WeasyPrint: pip install weasyprint",
            Tool::Wkhtmltopdf => "Install wkhtmltopdf from https://wkhtmltopdf.org",
            Tool::Chromium => "Install Chromium or Google Chrome",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A located tool and its version banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub tool: Tool,
    pub path: PathBuf,
    /// First non-empty line of `--version`, or [`UNKNOWN_VERSION`].
    pub version: String,
}

// ── Thread-safe lookup cache ─────────────────────────────────────────────────

static RESOLVED: OnceLock<Mutex<HashMap<Tool, PathBuf>>> = OnceLock::new();

fn cache() -> &'static Mutex<HashMap<Tool, PathBuf>> {
    RESOLVED.get_or_init(|| Mutex::new(HashMap::new()))
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the path to `tool`, honouring its override variable.
pub fn locate(tool: Tool) -> Result<PathBuf, ProbeError> {
    if let Some(path) = override_path(tool)? {
        return Ok(path);
    }

    if let Some(path) = cache().lock().ok().and_then(|c| c.get(&tool).cloned()) {
        return Ok(path);
    }

    let path = find_in(tool, std::env::var_os("PATH")).ok_or(ProbeError::NotFound {
        tool,
        var: tool.env_var(),
    })?;

    if let Ok(mut c) = cache().lock() {
        c.insert(tool, path.clone());
    }
    Ok(path)
}

/// First candidate name of `tool` found in the `PATH`-style list `paths`.
fn find_in(tool: Tool, paths: Option<OsString>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    tool.candidates()
        .iter()
        .find_map(|name| which::which_in(name, paths.as_ref(), &cwd).ok())
}

/// Returns `true` if [`locate`] would succeed.
pub fn is_available(tool: Tool) -> bool {
    locate(tool).is_ok()
}

/// Locates `tool` and reads its version banner.
pub fn probe(tool: Tool) -> Result<ToolInfo, ProbeError> {
    let path = locate(tool)?;
    let version = read_version(&path)?;
    Ok(ToolInfo {
        tool,
        path,
        version,
    })
}

/// Runs `<path> --version` and returns the first non-empty output line.
///
/// Output is decoded lossily: some TeX distributions print banners in the
/// console code page rather than UTF-8. A tool still running after
/// [`VERSION_TIMEOUT`] is killed.
pub fn read_version(path: &Path) -> Result<String, ProbeError> {
    read_version_within(path, VERSION_TIMEOUT)
}

/// [`read_version`] with an explicit deadline.
pub fn read_version_within(path: &Path, timeout: Duration) -> Result<String, ProbeError> {
    let spawn_err = |source| ProbeError::Spawn {
        path: path.to_path_buf(),
        source,
    };
    let mut child = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    // Banners are a few lines, well inside the pipe buffer, so polling
    // cannot block the child on a full pipe.
    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait().map_err(spawn_err)?.is_some() {
            break;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProbeError::VersionTimeout {
                path: path.to_path_buf(),
                secs: timeout.as_secs_f32(),
            });
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    let output = child.wait_with_output().map_err(spawn_err)?;

    if !output.status.success() {
        return Err(ProbeError::VersionFailed {
            path: path.to_path_buf(),
            status: output.status.to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(first_line(&stdout)
        .or_else(|| first_line(&stderr))
        .unwrap_or(UNKNOWN_VERSION)
        .to_string())
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn override_path(tool: Tool) -> Result<Option<PathBuf>, ProbeError> {
    let var = tool.env_var();
    match std::env::var_os(var) {
        Some(value) if !value.is_empty() => {
            let path = PathBuf::from(value);
            if path.is_file() {
                Ok(Some(path))
            } else {
                Err(ProbeError::OverrideMissing { var, path })
            }
        }
        _ => Ok(None),
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
