//! Source normalisation and title discovery.
//!
//! Every strategy reads the same normalised text, so pandoc and comrak see
//! identical input whichever one ends up producing the PDF.
//!
//! ## Rule Order
//!
//! The BOM is stripped before line endings are touched so a `\u{feff}\r\n`
//! prefix does not leave an empty first line behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to raw Markdown.
///
/// 1. Strip a leading byte-order mark
/// 2. Normalise line endings (CRLF and lone CR → LF)
/// 3. Ensure the text ends with exactly one newline
pub fn normalize_source(input: &str) -> String {
    let s = strip_bom(input);
    let s = normalise_line_endings(s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip BOM ────────────────────────────────────────────────────────

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{feff}').unwrap_or(input)
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Title discovery ──────────────────────────────────────────────────────────

static RE_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\n(.*?)\n(?:---|\.\.\.)\n").unwrap());

static RE_FM_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^title:\s*(?:"([^"]*)"|'([^']*)'|(.+?))\s*$"#).unwrap());

static RE_ATX_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^ {0,3}#[ \t]+(.+?)[ \t#]*$").unwrap());

/// Find a document title in normalised Markdown.
///
/// The YAML front matter `title:` wins over the first level-one ATX heading.
/// Headings inside fenced code are ignored.
pub fn extract_title(markdown: &str) -> Option<String> {
    if let Some(fm) = RE_FRONT_MATTER.captures(markdown) {
        if let Some(caps) = RE_FM_TITLE.captures(&fm[1]) {
            let title = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            if !title.is_empty() {
                return Some(title);
            }
        }
    }

    let body = match RE_FRONT_MATTER.find(markdown) {
        Some(m) => &markdown[m.end()..],
        None => markdown,
    };
    first_heading_outside_fences(body)
}

fn first_heading_outside_fences(body: &str) -> Option<String> {
    let mut fence: Option<(char, usize)> = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        let run_char = trimmed.chars().next();
        if let Some(c @ ('`' | '~')) = run_char {
            let run = trimmed.chars().take_while(|&x| x == c).count();
            if run >= 3 {
                match fence {
                    None => fence = Some((c, run)),
                    Some((open, len)) if open == c && run >= len => fence = None,
                    _ => {}
                }
                continue;
            }
        }
        if fence.is_some() {
            continue;
        }
        if let Some(caps) = RE_ATX_H1.captures(line) {
            return Some(caps[1].trim().to_string());
        }
    }
    None
}
