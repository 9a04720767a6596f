//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so a
//! config can be shared across the tasks of a batch and logged as a unit.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use toolchain_probe::Tool;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf::{Backend, ConversionConfig, PaperSize};
///
/// let config = ConversionConfig::builder()
///     .backend(Backend::Pandoc)
///     .paper_size(PaperSize::Letter)
///     .font_size(11)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which family of strategies to use. Default: [`Backend::Auto`].
    pub backend: Backend,

    /// LaTeX engine pandoc hands the document to. Default: pdflatex.
    pub latex_engine: LatexEngine,

    /// Headless engine that prints HTML to PDF. Default: WeasyPrint.
    pub html_engine: HtmlEngine,

    /// Page size for both backends. Default: A4.
    pub paper_size: PaperSize,

    /// Page margin on all four sides. Default: 1in.
    pub margin: Margin,

    /// Body font size in points. Range: 8–20. Default: 12.
    pub font_size: u8,

    /// LaTeX document class. Default: "article".
    pub document_class: String,

    /// Pandoc highlight style for the full-options attempt. Default: "tango".
    ///
    /// The minimal attempt ignores this and uses pandoc's plain style:
    /// "default" on pandoc 3.8 and later, "pygments" before that.
    pub highlight_style: String,

    /// How `$…$` / `$$…$$` spans are emitted by the HTML backend.
    pub math: MathMode,

    /// Extra CSS appended after the built-in stylesheet (HTML backend).
    pub stylesheet: Option<PathBuf>,

    /// Document title. If None, taken from front matter, the first heading,
    /// or the file name.
    pub title: Option<String>,

    /// Write an HTML file when every PDF strategy fails. Default: true.
    pub html_fallback: bool,

    /// Keep the intermediate HTML of the HTML backend next to the PDF.
    pub keep_html: bool,

    /// Ask the external tools for verbose output (pandoc `-v`, weasyprint `-v`).
    pub verbose_tools: bool,

    /// Number of files converted at once in a batch. Default: 1.
    ///
    /// A LaTeX run is CPU- and disk-heavy; more than a few in parallel rarely
    /// helps.
    pub concurrency: usize,

    /// Per-process timeout in seconds for pandoc and the HTML engines. Default: 300.
    pub process_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            latex_engine: LatexEngine::default(),
            html_engine: HtmlEngine::default(),
            paper_size: PaperSize::default(),
            margin: Margin::default(),
            font_size: 12,
            document_class: "article".to_string(),
            highlight_style: "tango".to_string(),
            math: MathMode::default(),
            stylesheet: None,
            title: None,
            html_fallback: true,
            keep_html: false,
            verbose_tools: false,
            concurrency: 1,
            process_timeout_secs: 300,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("backend", &self.backend)
            .field("latex_engine", &self.latex_engine)
            .field("html_engine", &self.html_engine)
            .field("paper_size", &self.paper_size)
            .field("margin", &self.margin)
            .field("font_size", &self.font_size)
            .field("document_class", &self.document_class)
            .field("highlight_style", &self.highlight_style)
            .field("math", &self.math)
            .field("stylesheet", &self.stylesheet)
            .field("title", &self.title)
            .field("html_fallback", &self.html_fallback)
            .field("keep_html", &self.keep_html)
            .field("concurrency", &self.concurrency)
            .field("process_timeout_secs", &self.process_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn latex_engine(mut self, engine: LatexEngine) -> Self {
        self.config.latex_engine = engine;
        self
    }

    pub fn html_engine(mut self, engine: HtmlEngine) -> Self {
        self.config.html_engine = engine;
        self
    }

    pub fn paper_size(mut self, size: PaperSize) -> Self {
        self.config.paper_size = size;
        self
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.config.margin = margin;
        self
    }

    pub fn font_size(mut self, pt: u8) -> Self {
        self.config.font_size = pt.clamp(8, 20);
        self
    }

    pub fn document_class(mut self, class: impl Into<String>) -> Self {
        self.config.document_class = class.into();
        self
    }

    pub fn highlight_style(mut self, style: impl Into<String>) -> Self {
        self.config.highlight_style = style.into();
        self
    }

    pub fn math(mut self, mode: MathMode) -> Self {
        self.config.math = mode;
        self
    }

    pub fn stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stylesheet = Some(path.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn html_fallback(mut self, v: bool) -> Self {
        self.config.html_fallback = v;
        self
    }

    pub fn keep_html(mut self, v: bool) -> Self {
        self.config.keep_html = v;
        self
    }

    pub fn verbose_tools(mut self, v: bool) -> Self {
        self.config.verbose_tools = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if !(8..=20).contains(&c.font_size) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Font size must be 8–20pt, got {}",
                c.font_size
            )));
        }
        if c.concurrency == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.process_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Process timeout must be ≥ 1s".into(),
            ));
        }
        if c.document_class.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "Document class must not be empty".into(),
            ));
        }
        if c.math == MathMode::Katex && !cfg!(feature = "katex") {
            return Err(Md2PdfError::InvalidConfig(
                "KaTeX math requires building md2pdf with the `katex` feature".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which family of conversion strategies to try.
///
/// | Backend | PDF strategies | HTML fallback |
/// |---------|----------------|---------------|
/// | `Pandoc` | pandoc full → pandoc minimal | pandoc standalone HTML |
/// | `Html`   | HTML engine | built-in HTML |
/// | `Auto`   | pandoc full → pandoc minimal → HTML engine | pandoc HTML → built-in HTML |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Everything that is installed, pandoc first. (default)
    #[default]
    Auto,
    /// pandoc with a LaTeX engine.
    Pandoc,
    /// comrak + headless HTML engine.
    Html,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Auto => "auto",
            Backend::Pandoc => "pandoc",
            Backend::Html => "html",
        })
    }
}

/// LaTeX engine passed to pandoc's `--pdf-engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatexEngine {
    #[default]
    PdfLatex,
    XeLatex,
    LuaLatex,
}

impl LatexEngine {
    pub fn as_str(self) -> &'static str {
        self.tool().name()
    }

    pub fn tool(self) -> Tool {
        match self {
            LatexEngine::PdfLatex => Tool::PdfLatex,
            LatexEngine::XeLatex => Tool::XeLatex,
            LatexEngine::LuaLatex => Tool::LuaLatex,
        }
    }
}

/// Headless HTML-to-PDF engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlEngine {
    #[default]
    WeasyPrint,
    Wkhtmltopdf,
    Chromium,
}

impl HtmlEngine {
    pub fn tool(self) -> Tool {
        match self {
            HtmlEngine::WeasyPrint => Tool::WeasyPrint,
            HtmlEngine::Wkhtmltopdf => Tool::Wkhtmltopdf,
            HtmlEngine::Chromium => Tool::Chromium,
        }
    }
}

/// Page size shared by the LaTeX and CSS paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Value for pandoc's `-V papersize=`.
    pub fn latex_name(self) -> &'static str {
        match self {
            PaperSize::A4 => "a4",
            PaperSize::A5 => "a5",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
        }
    }

    /// Value for the CSS `@page { size: … }` rule.
    pub fn css_name(self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
        }
    }

    /// Value for wkhtmltopdf's `--page-size`.
    pub fn wkhtml_name(self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::Letter => "Letter",
            PaperSize::Legal => "Legal",
        }
    }
}

/// How math spans are emitted into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    /// `<span class="math inline">` / `<div class="math">` holding the TeX. (default)
    #[default]
    Markers,
    /// KaTeX-rendered HTML (requires the `katex` feature).
    Katex,
}

/// Length unit accepted for margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    In,
    Cm,
    Mm,
    Pt,
}

impl LengthUnit {
    fn as_str(self) -> &'static str {
        match self {
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::Pt => "pt",
        }
    }

    fn millimetres(self) -> f32 {
        match self {
            LengthUnit::In => 25.4,
            LengthUnit::Cm => 10.0,
            LengthUnit::Mm => 1.0,
            LengthUnit::Pt => 25.4 / 72.0,
        }
    }
}

/// A page margin such as `1in`, `2.5cm`, `20mm` or `72pt`.
///
/// The same value must mean the same thing to LaTeX's `geometry` package,
/// CSS and wkhtmltopdf, so only units all three understand are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub value: f32,
    pub unit: LengthUnit,
}

impl Margin {
    pub fn new(value: f32, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    /// The margin in millimetres, rounded to 0.1mm.
    pub fn to_mm(self) -> f32 {
        (self.value * self.unit.millimetres() * 10.0).round() / 10.0
    }
}

impl Default for Margin {
    fn default() -> Self {
        Self::new(1.0, LengthUnit::In)
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

impl FromStr for Margin {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| invalid_margin(&s))?;
        let (number, unit) = s.split_at(split);
        let value: f32 = number.trim().parse().map_err(|_| invalid_margin(&s))?;
        let unit = match unit {
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            "pt" => LengthUnit::Pt,
            _ => return Err(invalid_margin(&s)),
        };
        if !value.is_finite() || value < 0.0 {
            return Err(invalid_margin(&s));
        }
        Ok(Margin::new(value, unit))
    }
}

fn invalid_margin(s: &str) -> Md2PdfError {
    Md2PdfError::InvalidConfig(format!(
        "Invalid margin '{s}': expected a number followed by in, cm, mm or pt"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.backend, Backend::Auto);
        assert_eq!(c.latex_engine, LatexEngine::PdfLatex);
        assert_eq!(c.html_engine, HtmlEngine::WeasyPrint);
        assert_eq!(c.paper_size, PaperSize::A4);
        assert_eq!(c.margin.to_string(), "1in");
        assert_eq!(c.font_size, 12);
        assert_eq!(c.document_class, "article");
        assert!(c.html_fallback);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_clamps_font_size_and_concurrency() {
        let c = ConversionConfig::builder()
            .font_size(40)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.font_size, 20);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_document_class() {
        let err = ConversionConfig::builder()
            .document_class("  ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Document class"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ConversionConfig::builder()
            .process_timeout_secs(0)
            .build()
            .is_err());
    }

    #[cfg(not(feature = "katex"))]
    #[test]
    fn katex_without_feature_is_rejected() {
        let err = ConversionConfig::builder()
            .math(MathMode::Katex)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("katex"));
    }

    #[test]
    fn margin_parses_supported_units() {
        assert_eq!("1in".parse::<Margin>().unwrap().to_mm(), 25.4);
        assert_eq!("2.5cm".parse::<Margin>().unwrap().to_mm(), 25.0);
        assert_eq!(" 20 MM ".parse::<Margin>().unwrap().to_mm(), 20.0);
        assert_eq!("72pt".parse::<Margin>().unwrap().to_mm(), 25.4);
    }

    #[test]
    fn margin_rejects_garbage() {
        assert!("".parse::<Margin>().is_err());
        assert!("12".parse::<Margin>().is_err());
        assert!("1px".parse::<Margin>().is_err());
        assert!("-1in".parse::<Margin>().is_err());
        assert!("abcin".parse::<Margin>().is_err());
    }

    #[test]
    fn margin_display_round_trips_the_input_form() {
        assert_eq!("2.5cm".parse::<Margin>().unwrap().to_string(), "2.5cm");
    }

    #[test]
    fn paper_names_per_consumer() {
        assert_eq!(PaperSize::A4.latex_name(), "a4");
        assert_eq!(PaperSize::Letter.css_name(), "letter");
        assert_eq!(PaperSize::Legal.wkhtml_name(), "Legal");
    }

    #[test]
    fn engines_map_to_tools() {
        assert_eq!(LatexEngine::XeLatex.as_str(), "xelatex");
        assert_eq!(HtmlEngine::Chromium.tool(), Tool::Chromium);
    }
}
