//! pandoc command lines for the three pandoc strategies.
//!
//! pandoc 3.8 renamed `--highlight-style` to `--syntax-highlighting`; the
//! flag is picked from the version banner so both old and new installs work.

use crate::config::ConversionConfig;
use crate::pipeline::exec::Invocation;
use std::fmt;
use std::path::Path;

/// A pandoc release number, from `pandoc --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PandocVersion {
    pub major: u32,
    pub minor: u32,
}

impl PandocVersion {
    /// The version assumed when the banner cannot be parsed.
    pub const CURRENT: PandocVersion = PandocVersion { major: 3, minor: 8 };

    /// Parse a banner such as `pandoc 3.1.11.1` or `pandoc.exe 2.19.2`.
    pub fn parse(banner: &str) -> Option<Self> {
        let token = banner
            .split_whitespace()
            .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
        let mut parts = token.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts
            .next()
            .and_then(|m| {
                let digits: String = m.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .unwrap_or(0);
        Some(Self { major, minor })
    }

    pub fn from_banner_or_current(banner: &str) -> Self {
        Self::parse(banner).unwrap_or(Self::CURRENT)
    }

    fn has_syntax_highlighting_flag(self) -> bool {
        self >= Self::CURRENT
    }

    /// `--syntax-highlighting=STYLE` or `--highlight-style=STYLE`.
    pub fn highlight_arg(self, style: &str) -> String {
        if self.has_syntax_highlighting_flag() {
            format!("--syntax-highlighting={style}")
        } else {
            format!("--highlight-style={style}")
        }
    }

    /// The style needing the fewest LaTeX packages.
    ///
    /// Before 3.8 there is no style called `default`; `pygments` is what
    /// pandoc falls back to there.
    pub fn plain_style(self) -> &'static str {
        if self.has_syntax_highlighting_flag() {
            "default"
        } else {
            "pygments"
        }
    }
}

impl fmt::Display for PandocVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Paths and facts shared by the pandoc command builders.
#[derive(Debug, Clone, Copy)]
pub struct PandocJob<'a> {
    pub pandoc: &'a Path,
    pub version: PandocVersion,
    pub input: &'a Path,
    pub output: &'a Path,
    pub resource_dir: Option<&'a Path>,
    pub latex_engine: &'a Path,
    pub title: &'a str,
}

/// Every layout option, strict LaTeX engine flags.
pub fn full_invocation(job: &PandocJob<'_>, config: &ConversionConfig) -> Invocation {
    let mut inv = Invocation::new(job.pandoc)
        .arg(job.input)
        .arg("-o")
        .arg(job.output)
        .arg("--from=markdown+raw_html+tex_math_dollars");
    if let Some(dir) = job.resource_dir {
        let mut arg = std::ffi::OsString::from("--resource-path=");
        arg.push(dir);
        inv = inv.arg(arg);
    }
    let mut engine = std::ffi::OsString::from("--pdf-engine=");
    engine.push(job.latex_engine);
    inv = inv
        .arg(engine)
        .arg("--pdf-engine-opt=-interaction=nonstopmode")
        .arg("--pdf-engine-opt=-halt-on-error")
        .arg(job.version.highlight_arg(&config.highlight_style))
        .arg("-V")
        .arg(format!("geometry:margin={}", config.margin))
        .arg("-V")
        .arg(format!("documentclass={}", config.document_class))
        .arg("-V")
        .arg(format!("fontsize={}pt", config.font_size))
        .arg("-V")
        .arg(format!("papersize={}", config.paper_size.latex_name()));
    if let Some(title) = &config.title {
        inv = inv.arg(format!("--metadata=title:{title}"));
    }
    if config.verbose_tools {
        inv = inv.arg("-v");
    }
    inv
}

/// Only the options that need no extra LaTeX packages.
pub fn minimal_invocation(job: &PandocJob<'_>, config: &ConversionConfig) -> Invocation {
    let mut engine = std::ffi::OsString::from("--pdf-engine=");
    engine.push(job.latex_engine);
    Invocation::new(job.pandoc)
        .arg(job.input)
        .arg("-o")
        .arg(job.output)
        .arg(engine)
        .arg(job.version.highlight_arg(job.version.plain_style()))
        .arg("-V")
        .arg(format!("geometry:margin={}", config.margin))
        .arg("-V")
        .arg(format!("documentclass={}", config.document_class))
        .arg("-V")
        .arg(format!("fontsize={}pt", config.font_size))
}

/// Standalone HTML with MathJax, for printing from a browser.
pub fn html_invocation(job: &PandocJob<'_>) -> Invocation {
    let mut inv = Invocation::new(job.pandoc)
        .arg(job.input)
        .arg("-o")
        .arg(job.output)
        .arg("-s")
        .arg("--mathjax")
        .arg(job.version.highlight_arg(job.version.plain_style()))
        .arg("-V")
        .arg("charset=utf-8")
        .arg(format!("--metadata=title:{}", job.title));
    if let Some(dir) = job.resource_dir {
        let mut arg = std::ffi::OsString::from("--resource-path=");
        arg.push(dir);
        inv = inv.arg(arg);
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaperSize;

    fn job<'a>(version: PandocVersion) -> PandocJob<'a> {
        PandocJob {
            pandoc: Path::new("pandoc"),
            version,
            input: Path::new("in.md"),
            output: Path::new("out.pdf"),
            resource_dir: Some(Path::new("/docs")),
            latex_engine: Path::new("pdflatex"),
            title: "Notes",
        }
    }

    #[test]
    fn parses_banners() {
        assert_eq!(
            PandocVersion::parse("pandoc 3.1.11.1"),
            Some(PandocVersion { major: 3, minor: 1 })
        );
        assert_eq!(
            PandocVersion::parse("pandoc.exe 2.19.2"),
            Some(PandocVersion { major: 2, minor: 19 })
        );
        assert_eq!(
            PandocVersion::parse("pandoc 3.8"),
            Some(PandocVersion { major: 3, minor: 8 })
        );
        assert_eq!(PandocVersion::parse("version information not available"), None);
        assert_eq!(
            PandocVersion::from_banner_or_current("garbage"),
            PandocVersion::CURRENT
        );
    }

    #[test]
    fn highlight_flag_depends_on_version() {
        let old = PandocVersion { major: 3, minor: 1 };
        let new = PandocVersion { major: 3, minor: 8 };
        assert_eq!(old.highlight_arg("tango"), "--highlight-style=tango");
        assert_eq!(new.highlight_arg("tango"), "--syntax-highlighting=tango");
        assert_eq!(old.plain_style(), "pygments");
        assert_eq!(new.plain_style(), "default");
    }

    #[test]
    fn full_command_matches_documented_order() {
        let config = crate::config::ConversionConfig::default();
        let inv = full_invocation(&job(PandocVersion::CURRENT), &config);
        assert_eq!(
            inv.arg_strings(),
            vec![
                "in.md",
                "-o",
                "out.pdf",
                "--from=markdown+raw_html+tex_math_dollars",
                "--resource-path=/docs",
                "--pdf-engine=pdflatex",
                "--pdf-engine-opt=-interaction=nonstopmode",
                "--pdf-engine-opt=-halt-on-error",
                "--syntax-highlighting=tango",
                "-V",
                "geometry:margin=1in",
                "-V",
                "documentclass=article",
                "-V",
                "fontsize=12pt",
                "-V",
                "papersize=a4",
            ]
        );
    }

    #[test]
    fn full_command_optional_flags() {
        let config = crate::config::ConversionConfig::builder()
            .title("Report")
            .verbose_tools(true)
            .paper_size(PaperSize::Letter)
            .build()
            .unwrap();
        let args = full_invocation(&job(PandocVersion::CURRENT), &config).arg_strings();
        assert!(args.contains(&"papersize=letter".to_string()));
        assert!(args.contains(&"--metadata=title:Report".to_string()));
        assert_eq!(args.last().unwrap(), "-v");
    }

    #[test]
    fn minimal_command() {
        let config = crate::config::ConversionConfig::default();
        let inv = minimal_invocation(&job(PandocVersion { major: 2, minor: 19 }), &config);
        assert_eq!(
            inv.arg_strings(),
            vec![
                "in.md",
                "-o",
                "out.pdf",
                "--pdf-engine=pdflatex",
                "--highlight-style=pygments",
                "-V",
                "geometry:margin=1in",
                "-V",
                "documentclass=article",
                "-V",
                "fontsize=12pt",
            ]
        );
    }

    #[test]
    fn html_command_is_standalone_with_mathjax() {
        let mut j = job(PandocVersion::CURRENT);
        j.output = Path::new("out.html");
        let args = html_invocation(&j).arg_strings();
        assert_eq!(
            &args[..9],
            [
                "in.md",
                "-o",
                "out.html",
                "-s",
                "--mathjax",
                "--syntax-highlighting=default",
                "-V",
                "charset=utf-8",
                "--metadata=title:Notes",
            ]
        );
    }
}
