//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements one step; the external programs are only ever
//! touched from [`exec`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ toolchain ──▶ chain ──┬─▶ pandoc ──────────────┐
//! (URL/path)  (BOM, EOL)   (which tools)  (plan) └─▶ math ─▶ html ─▶ engine ┴─▶ exec
//! ```
//!
//! 1. [`input`]    : canonicalise the user-supplied path or URL to a local file
//! 2. [`normalize`]: BOM, line endings, final newline; title discovery
//! 3. [`toolchain`]: probe pandoc, the LaTeX engine and the HTML engine
//! 4. [`chain`]    : pick strategies and run them until one produces an artefact
//! 5. [`pandoc`]   : pandoc command lines (full, minimal, standalone HTML)
//! 6. [`math`]     : protect `$…$` / `$$…$$` from the Markdown renderer
//! 7. [`html`]     : comrak rendering plus the print stylesheet
//! 8. [`engine`]   : WeasyPrint / wkhtmltopdf / Chromium command lines
//! 9. [`exec`]     : run a command with a timeout and validate its output

pub mod chain;
pub mod engine;
pub mod exec;
pub mod html;
pub mod input;
pub mod math;
pub mod normalize;
pub mod pandoc;
pub mod toolchain;
