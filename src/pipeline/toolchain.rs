//! Which external tools this machine has, for the configured backend.

use crate::config::{Backend, ConversionConfig};
use serde::Serialize;
use std::path::PathBuf;
use toolchain_probe::{ProbeError, Tool, ToolInfo};
use tracing::{debug, info};

/// Tools found for one conversion run.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    /// pandoc with its version banner.
    pub pandoc: Option<ToolInfo>,
    /// The configured LaTeX engine.
    pub latex: Option<PathBuf>,
    /// The configured HTML engine.
    pub html_engine: Option<PathBuf>,
    /// `tool: reason` for each tool that was looked for and not found.
    pub missing: Vec<String>,
}

/// Probe the tools `config.backend` can use.
///
/// Probing runs `--version`, so it is done on the blocking pool.
pub async fn discover(config: &ConversionConfig) -> Toolchain {
    let backend = config.backend;
    let latex = config.latex_engine.tool();
    let html = config.html_engine.tool();
    let handle = tokio::task::spawn_blocking(move || discover_blocking(backend, latex, html));
    match handle.await {
        Ok(toolchain) => toolchain,
        Err(e) => Toolchain {
            missing: vec![format!("toolchain probe panicked: {e}")],
            ..Toolchain::default()
        },
    }
}

fn discover_blocking(backend: Backend, latex: Tool, html: Tool) -> Toolchain {
    let mut toolchain = Toolchain::default();

    if backend != Backend::Html {
        match toolchain_probe::probe(Tool::Pandoc) {
            Ok(info) => {
                debug!("Found pandoc at {} ({})", info.path.display(), info.version);
                toolchain.pandoc = Some(info);
            }
            Err(e) => toolchain.missing.push(e.to_string()),
        }
        match toolchain_probe::locate(latex) {
            Ok(path) => toolchain.latex = Some(path),
            Err(e) => toolchain.missing.push(e.to_string()),
        }
    }
    if backend != Backend::Pandoc {
        match toolchain_probe::locate(html) {
            Ok(path) => toolchain.html_engine = Some(path),
            Err(e) => toolchain.missing.push(e.to_string()),
        }
    }
    toolchain
}

/// One line of `md2pdf --check-deps`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    /// Whether the configured backend needs the tool for its first strategy.
    pub required: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub install_hint: &'static str,
}

impl ToolStatus {
    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }
}

/// Result of [`check_dependencies`].
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub backend: String,
    pub tools: Vec<ToolStatus>,
    ready: bool,
}

impl DependencyReport {
    /// True when at least one PDF-producing strategy can run.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &ToolStatus> {
        self.tools.iter().filter(|t| t.required && !t.is_found())
    }
}

/// Probe every tool the configured backend could use.
///
/// pandoc and the configured LaTeX engine are required unless the backend is
/// `html`; the HTML engine is required for `html` and optional for `auto`.
pub fn check_dependencies(config: &ConversionConfig) -> DependencyReport {
    let mut tools = Vec::new();
    let latex_tool = config.latex_engine.tool();
    let html_tool = config.html_engine.tool();

    if config.backend != Backend::Html {
        tools.push(status(Tool::Pandoc, true, true));
        tools.push(status(latex_tool, true, false));
    }
    if config.backend != Backend::Pandoc {
        tools.push(status(html_tool, config.backend == Backend::Html, true));
    }

    let found = |tool: Tool| tools.iter().any(|t| t.tool == tool.name() && t.is_found());
    let pandoc_ready = found(Tool::Pandoc) && found(latex_tool);
    let html_ready = found(html_tool);
    let ready = match config.backend {
        Backend::Pandoc => pandoc_ready,
        Backend::Html => html_ready,
        Backend::Auto => pandoc_ready || html_ready,
    };

    for t in &tools {
        match &t.path {
            Some(p) => info!("{}: {}", t.tool, p.display()),
            None => info!("{}: not found", t.tool),
        }
    }

    DependencyReport {
        backend: config.backend.to_string(),
        tools,
        ready,
    }
}

fn status(tool: Tool, required: bool, with_version: bool) -> ToolStatus {
    let mut s = ToolStatus {
        tool: tool.name().to_string(),
        path: None,
        version: None,
        required,
        error: None,
        install_hint: tool.install_hint(),
    };
    let located: Result<ToolInfo, ProbeError> = if with_version {
        toolchain_probe::probe(tool)
    } else {
        toolchain_probe::locate(tool).map(|path| ToolInfo {
            tool,
            path,
            version: String::new(),
        })
    };
    match located {
        Ok(found) => {
            s.path = Some(found.path);
            s.version = Some(found.version).filter(|v| !v.is_empty());
        }
        Err(e) => s.error = Some(e.to_string()),
    }
    s
}
