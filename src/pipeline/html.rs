//! Markdown → standalone HTML document.
//!
//! comrak does the Markdown; this module only decides the options, moves
//! math out of comrak's way and wraps the body in the print template.

use crate::config::{ConversionConfig, MathMode};
use crate::error::Md2PdfError;
use crate::pipeline::math::extract_math;
use crate::pipeline::normalize::{extract_title, normalize_source};
use comrak::options::Options;
use std::path::Path;

/// KaTeX stylesheet linked when math is rendered server-side.
pub const KATEX_CSS_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist/katex.min.css";

/// Per-document facts the template needs besides the config.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentContext<'a> {
    /// Directory relative links resolve against.
    pub base_dir: Option<&'a Path>,
    /// Title used when neither the config nor the document provides one.
    pub fallback_title: Option<&'a str>,
}

fn comrak_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;
    options
}

/// Convert Markdown to a complete HTML document with the default context.
pub fn markdown_to_html(markdown: &str, config: &ConversionConfig) -> Result<String, Md2PdfError> {
    render_html_document(markdown, config, &DocumentContext::default())
}

/// Convert Markdown to a complete HTML document.
pub fn render_html_document(
    markdown: &str,
    config: &ConversionConfig,
    ctx: &DocumentContext<'_>,
) -> Result<String, Md2PdfError> {
    let source = normalize_source(markdown);
    let title = config
        .title
        .clone()
        .or_else(|| extract_title(&source))
        .or_else(|| ctx.fallback_title.map(str::to_string))
        .unwrap_or_else(|| "Document".to_string());

    let prepared = extract_math(&source);
    let body = comrak::markdown_to_html(&prepared.markdown, &comrak_options());
    let body = prepared.restore(&body, config.math);

    let user_css = match &config.stylesheet {
        Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
            Md2PdfError::InvalidConfig(format!(
                "Cannot read stylesheet '{}': {e}",
                path.display()
            ))
        })?),
        None => None,
    };

    Ok(wrap_document(
        &body,
        &title,
        config,
        ctx.base_dir,
        user_css.as_deref(),
        config.math == MathMode::Katex && prepared.has_math(),
    ))
}

fn wrap_document(
    body: &str,
    title: &str,
    config: &ConversionConfig,
    base_dir: Option<&Path>,
    user_css: Option<&str>,
    link_katex: bool,
) -> String {
    let mut head = String::new();
    head.push_str("<meta charset=\"utf-8\">\n");
    head.push_str(&format!("<title>{}</title>\n", escape_text(title)));
    if let Some(href) = base_dir.and_then(base_href) {
        head.push_str(&format!("<base href=\"{}\">\n", escape_text(&href)));
    }
    if link_katex {
        head.push_str(&format!("<link rel=\"stylesheet\" href=\"{KATEX_CSS_URL}\">\n"));
    }
    head.push_str("<style>\n");
    head.push_str(&page_css(config));
    head.push_str(BASE_CSS);
    head.push_str("</style>\n");
    if let Some(css) = user_css {
        head.push_str("<style>\n");
        head.push_str(css);
        head.push_str("\n</style>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{head}</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn page_css(config: &ConversionConfig) -> String {
    format!(
        "@page {{ size: {}; margin: {}; }}\nbody {{ font-size: {}pt; }}\n",
        config.paper_size.css_name(),
        config.margin,
        config.font_size
    )
}

const BASE_CSS: &str = r#"body { font-family: Arial, sans-serif; line-height: 1.6; margin: 40px; }
h1, h2, h3, h4, h5, h6 { margin-top: 24px; margin-bottom: 16px; page-break-after: avoid; }
.math { text-align: center; margin: 1em 0; font-size: 1.2em; }
.math.inline { display: inline; text-align: left; margin: 0; }
span.math.display { display: block; }
code { background-color: #f4f4f4; padding: 2px 4px; border-radius: 3px; }
pre { background-color: #f4f4f4; padding: 10px; border-radius: 5px; overflow-x: auto; }
pre code { padding: 0; }
table { border-collapse: collapse; width: 100%; margin: 1em 0; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
img { max-width: 100%; }
"#;

/// `file://` URL of a directory, with a trailing slash.
fn base_href(dir: &Path) -> Option<String> {
    let abs = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(dir)
    };
    reqwest::Url::from_directory_path(abs)
        .ok()
        .map(|u| u.to_string())
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LengthUnit, Margin, PaperSize};

    #[test]
    fn renders_gfm_tables_and_fenced_code() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";
        let html = markdown_to_html(md, &ConversionConfig::default()).unwrap();
        assert!(html.contains("<table>"), "got: {html}");
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("<pre lang=\"rust\"><code>fn main() {}"));
    }

    #[test]
    fn math_survives_markdown() {
        let md = "Let $a_1 * b_2$ be *real*.\n\n$$\nx_1 = y_2\n$$\n";
        let html = markdown_to_html(md, &ConversionConfig::default()).unwrap();
        assert!(html.contains("<span class=\"math inline\">a_1 * b_2</span>"), "got: {html}");
        assert!(html.contains("<em>real</em>"));
        assert!(html.contains("<div class=\"math\">x_1 = y_2</div>"));
        assert!(!html.contains("<p><div"));
    }

    #[test]
    fn code_keeps_dollars() {
        let md = "Run `echo $HOME$`.\n";
        let html = markdown_to_html(md, &ConversionConfig::default()).unwrap();
        assert!(html.contains("<code>echo $HOME$</code>"), "got: {html}");
    }

    #[test]
    fn front_matter_is_skipped_and_titles_the_document() {
        let md = "---\ntitle: Notes\n---\n\nBody\n";
        let html = markdown_to_html(md, &ConversionConfig::default()).unwrap();
        assert!(html.contains("<title>Notes</title>"));
        assert!(!html.contains("title: Notes</"));
    }

    #[test]
    fn config_title_wins() {
        let config = ConversionConfig::builder().title("A & B").build().unwrap();
        let html = markdown_to_html("# Heading\n", &config).unwrap();
        assert!(html.contains("<title>A &amp; B</title>"));
    }

    #[test]
    fn fallback_title_used_last() {
        let ctx = DocumentContext {
            base_dir: None,
            fallback_title: Some("lecture-03"),
        };
        let html = render_html_document("plain\n", &ConversionConfig::default(), &ctx).unwrap();
        assert!(html.contains("<title>lecture-03</title>"));
    }

    #[test]
    fn page_rule_follows_config() {
        let config = ConversionConfig::builder()
            .paper_size(PaperSize::Letter)
            .margin(Margin::new(2.0, LengthUnit::Cm))
            .font_size(11)
            .build()
            .unwrap();
        let html = markdown_to_html("x\n", &config).unwrap();
        assert!(html.contains("@page { size: letter; margin: 2cm; }"));
        assert!(html.contains("body { font-size: 11pt; }"));
    }

    #[test]
    fn base_href_points_at_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DocumentContext {
            base_dir: Some(dir.path()),
            fallback_title: None,
        };
        let html = render_html_document("x\n", &ConversionConfig::default(), &ctx).unwrap();
        assert!(html.contains("<base href=\"file:///"));
    }

    #[test]
    fn user_stylesheet_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("extra.css");
        std::fs::write(&css, "h1 { color: navy; }").unwrap();
        let config = ConversionConfig::builder().stylesheet(&css).build().unwrap();
        let html = markdown_to_html("# x\n", &config).unwrap();
        let base = html.find("border-collapse").unwrap();
        let user = html.find("color: navy").unwrap();
        assert!(user > base);
    }

    #[test]
    fn missing_stylesheet_is_config_error() {
        let config = ConversionConfig::builder()
            .stylesheet("/no/such/style.css")
            .build()
            .unwrap();
        let err = markdown_to_html("x\n", &config).unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }
}
