//! `$…$` / `$$…$$` math handling for the HTML backend.
//!
//! Math has to be taken out of the Markdown before comrak sees it, or `_`
//! and `*` inside formulas turn into emphasis. Two entry points share one
//! scanner:
//!
//! * [`preprocess_math`] rewrites spans into HTML containers in place.
//! * [`extract_math`] swaps spans for opaque placeholder tokens and keeps
//!   the TeX aside; [`PreparedMarkdown::restore`] puts the final markup back
//!   into the rendered HTML.
//!
//! ## Scanner rules
//!
//! - fenced code blocks and inline code spans are copied verbatim
//! - `\$` outside math is a literal dollar
//! - `$$` opens display math, closed by the next `$$` at brace depth 0
//! - `$` opens inline math only before a non-space character and closes on
//!   the same line at a `$` with no space before it and no digit after it
//! - inside math `\` escapes the next character and `{`/`}` track depth, so
//!   a `$` inside `\text{…}` is content

use crate::config::MathMode;
use tracing::warn;

/// One math span taken out of the Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathFragment {
    pub placeholder: String,
    pub tex: String,
    pub display: bool,
}

/// Markdown with its math spans replaced by placeholders.
#[derive(Debug, Clone, Default)]
pub struct PreparedMarkdown {
    pub markdown: String,
    pub fragments: Vec<MathFragment>,
}

impl PreparedMarkdown {
    /// Replace every placeholder in `html` with the markup for its span.
    ///
    /// A display placeholder that ended up alone in a paragraph replaces the
    /// whole `<p>` so no block element lands inside it.
    pub fn restore(&self, html: &str, mode: MathMode) -> String {
        let mut out = html.to_string();
        for fragment in &self.fragments {
            if fragment.display {
                let para = format!("<p>{}</p>", fragment.placeholder);
                if out.contains(&para) {
                    out = out.replace(&para, &render_fragment(fragment, mode, true));
                    continue;
                }
            }
            out = out.replace(&fragment.placeholder, &render_fragment(fragment, mode, false));
        }
        out
    }

    pub fn has_math(&self) -> bool {
        !self.fragments.is_empty()
    }
}

/// Rewrite math spans into `<div class="math">` / `<span class="math inline">`
/// containers.
///
/// The TeX is written with numeric character references for every character
/// Markdown or HTML would reinterpret, so the containers survive a Markdown
/// renderer unchanged.
pub fn preprocess_math(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    for segment in scan(text) {
        match segment {
            Segment::Text(s) => out.push_str(s),
            Segment::Math { tex, display: true } => {
                out.push_str("<div class=\"math\">");
                out.push_str(&escape_for_markdown(&collapse_blank_lines(tex)));
                out.push_str("</div>");
            }
            Segment::Math { tex, display: false } => {
                out.push_str("<span class=\"math inline\">");
                out.push_str(&escape_for_markdown(tex));
                out.push_str("</span>");
            }
        }
    }
    out
}

/// Replace math spans with placeholder tokens.
pub fn extract_math(text: &str) -> PreparedMarkdown {
    let prefix = placeholder_prefix(text);
    let mut prepared = PreparedMarkdown {
        markdown: String::with_capacity(text.len()),
        fragments: Vec::new(),
    };
    for segment in scan(text) {
        match segment {
            Segment::Text(s) => prepared.markdown.push_str(s),
            Segment::Math { tex, display } => {
                let placeholder = format!("{prefix}{}Z", prepared.fragments.len());
                prepared.markdown.push_str(&placeholder);
                prepared.fragments.push(MathFragment {
                    placeholder,
                    tex: tex.to_string(),
                    display,
                });
            }
        }
    }
    prepared
}

// ── Scanner ──────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Math { tex: &'a str, display: bool },
}

/// Split `text` into literal runs and math spans.
///
/// All delimiters are ASCII, so byte offsets found here are always char
/// boundaries.
fn scan(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;
    let mut at_line_start = true;

    while i < bytes.len() {
        if at_line_start {
            if let Some(end) = fenced_block_end(bytes, i) {
                i = end;
                continue;
            }
        }
        at_line_start = false;

        match bytes[i] {
            b'\n' => {
                at_line_start = true;
                i += 1;
            }
            b'\\' => {
                // An escaped newline is a hard break; keep line tracking intact.
                i += if bytes.get(i + 1).is_some_and(|&b| b != b'\n') { 2 } else { 1 };
            }
            b'`' => {
                let run = run_length(bytes, i, b'`');
                i = match code_span_end(bytes, i, run) {
                    Some(end) => end,
                    None => i + run,
                };
            }
            b'$' if bytes.get(i + 1) == Some(&b'$') => match display_end(bytes, i + 2) {
                Some(close) if !text[i + 2..close].trim().is_empty() => {
                    segments.push(Segment::Text(&text[text_start..i]));
                    segments.push(Segment::Math {
                        tex: &text[i + 2..close],
                        display: true,
                    });
                    i = close + 2;
                    text_start = i;
                }
                _ => i += 2,
            },
            b'$' => match inline_end(bytes, i + 1) {
                Some(close) => {
                    segments.push(Segment::Text(&text[text_start..i]));
                    segments.push(Segment::Math {
                        tex: &text[i + 1..close],
                        display: false,
                    });
                    i = close + 1;
                    text_start = i;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    if text_start < bytes.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments.retain(|s| !matches!(s, Segment::Text("")));
    segments
}

fn run_length(bytes: &[u8], start: usize, c: u8) -> usize {
    bytes[start..].iter().take_while(|&&b| b == c).count()
}

/// If a fenced code block opens at `start`, return the offset just past it.
fn fenced_block_end(bytes: &[u8], start: usize) -> Option<usize> {
    let indent = bytes[start..].iter().take_while(|&&b| b == b' ').count();
    if indent > 3 {
        return None;
    }
    let fence_at = start + indent;
    let c = *bytes.get(fence_at)?;
    if c != b'`' && c != b'~' {
        return None;
    }
    let len = run_length(bytes, fence_at, c);
    if len < 3 {
        return None;
    }
    let mut line_end = next_line(bytes, fence_at);
    // A backtick fence's info string may not contain backticks.
    if c == b'`' && bytes[fence_at + len..line_end].contains(&b'`') {
        return None;
    }

    while line_end < bytes.len() {
        let line = line_end;
        line_end = next_line(bytes, line);
        let indent = bytes[line..].iter().take_while(|&&b| b == b' ').count();
        if indent > 3 {
            continue;
        }
        let at = line + indent;
        let run = run_length(bytes, at, c);
        if run >= len && bytes[at + run..line_end].iter().all(u8::is_ascii_whitespace) {
            return Some(line_end);
        }
    }
    Some(bytes.len())
}

/// Offset just past the newline ending the line that contains `from`.
fn next_line(bytes: &[u8], from: usize) -> usize {
    match bytes[from..].iter().position(|&b| b == b'\n') {
        Some(p) => from + p + 1,
        None => bytes.len(),
    }
}

/// A code span closes at the next backtick run of exactly `run` length,
/// within the same paragraph.
fn code_span_end(bytes: &[u8], start: usize, run: usize) -> Option<usize> {
    let mut j = start + run;
    while j < bytes.len() {
        match bytes[j] {
            b'`' => {
                let n = run_length(bytes, j, b'`');
                if n == run {
                    return Some(j + n);
                }
                j += n;
            }
            b'\n' if bytes.get(j + 1) == Some(&b'\n') => return None,
            _ => j += 1,
        }
    }
    None
}

/// Offset of the closing `$$` for display math whose content starts at `from`.
fn display_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'{' => {
                depth += 1;
                j += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                j += 1;
            }
            b'$' if depth == 0 && bytes.get(j + 1) == Some(&b'$') => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// Offset of the closing `$` for inline math whose content starts at `from`.
fn inline_end(bytes: &[u8], from: usize) -> Option<usize> {
    match bytes.get(from) {
        Some(b) if !b.is_ascii_whitespace() && *b != b'$' => {}
        _ => return None,
    }
    let mut depth = 0usize;
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\n' => return None,
            b'\\' => {
                if bytes.get(j + 1) == Some(&b'\n') {
                    return None;
                }
                j += 2;
            }
            b'{' => {
                depth += 1;
                j += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                j += 1;
            }
            b'$' if depth == 0 => {
                let space_before = bytes[j - 1].is_ascii_whitespace();
                let digit_after = bytes.get(j + 1).is_some_and(u8::is_ascii_digit);
                if j > from && !space_before && !digit_after {
                    return Some(j);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

// ── Output helpers ───────────────────────────────────────────────────────────

fn collapse_blank_lines(tex: &str) -> String {
    tex.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_for_markdown(tex: &str) -> String {
    let mut out = String::with_capacity(tex.len() + 16);
    for c in tex.chars() {
        match c {
            '&' | '<' | '>' | '\\' | '*' | '_' | '`' | '[' | ']' | '~' | '|' | '$' => {
                out.push_str(&format!("&#{};", c as u32));
            }
            _ => out.push(c),
        }
    }
    out
}

fn escape_html(tex: &str) -> String {
    tex.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A prefix that does not occur anywhere in the source.
fn placeholder_prefix(text: &str) -> String {
    let mut prefix = String::from("MD2PDFMATH");
    while text.contains(prefix.as_str()) {
        prefix.push('X');
    }
    prefix
}

fn render_fragment(fragment: &MathFragment, mode: MathMode, own_block: bool) -> String {
    if mode == MathMode::Katex {
        match render_katex(&fragment.tex, fragment.display) {
            Ok(html) if own_block => return format!("<div class=\"math display\">{html}</div>"),
            Ok(html) => return html,
            Err(e) => warn!("{e}; leaving the TeX source in place"),
        }
    }
    let tex = escape_html(fragment.tex.trim());
    match (fragment.display, own_block) {
        (true, true) => format!("<div class=\"math\">{tex}</div>"),
        (true, false) => format!("<span class=\"math display\">{tex}</span>"),
        (false, _) => format!("<span class=\"math inline\">{tex}</span>"),
    }
}

#[cfg(feature = "katex")]
fn render_katex(tex: &str, display: bool) -> Result<String, crate::error::Md2PdfError> {
    use katex::{OptsBuilder, OutputType};

    let mut builder = OptsBuilder::default();
    builder.display_mode(display);
    builder.output_type(OutputType::Html);

    let opts = builder.build().map_err(|err| crate::error::Md2PdfError::MathRender {
        expr: tex.to_string(),
        detail: format!("failed to build KaTeX options: {err}"),
    })?;

    katex::render_with_opts(tex, opts).map_err(|err| crate::error::Md2PdfError::MathRender {
        expr: tex.to_string(),
        detail: err.to_string(),
    })
}

#[cfg(not(feature = "katex"))]
fn render_katex(tex: &str, _display: bool) -> Result<String, crate::error::Md2PdfError> {
    Err(crate::error::Md2PdfError::MathRender {
        expr: tex.to_string(),
        detail: "md2pdf was built without the `katex` feature".into(),
    })
}
