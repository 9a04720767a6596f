//! HTML → PDF through a headless engine.
//!
//! | Engine | Command |
//! |--------|---------|
//! | WeasyPrint | `weasyprint [-v] [--base-url DIR] IN.html OUT.pdf` |
//! | wkhtmltopdf | `wkhtmltopdf --quiet --enable-local-file-access … IN OUT` |
//! | Chromium | `chromium --headless --print-to-pdf=OUT file:///IN` |
//!
//! WeasyPrint and Chromium honour the `@page` rule of the template;
//! wkhtmltopdf ignores it and gets page size and margins as flags.

use crate::config::{ConversionConfig, HtmlEngine};
use crate::pipeline::exec::Invocation;
use std::ffi::OsString;
use std::path::Path;

/// Build the command that prints `html` to `pdf`.
pub fn engine_invocation(
    engine: HtmlEngine,
    program: &Path,
    html: &Path,
    pdf: &Path,
    base_dir: Option<&Path>,
    config: &ConversionConfig,
) -> Invocation {
    let inv = Invocation::new(program);
    match engine {
        HtmlEngine::WeasyPrint => {
            let mut inv = inv;
            if config.verbose_tools {
                inv = inv.arg("-v");
            }
            if let Some(dir) = base_dir {
                inv = inv.arg("--base-url").arg(dir);
            }
            inv.arg(html).arg(pdf)
        }
        HtmlEngine::Wkhtmltopdf => {
            let margin = format!("{}mm", config.margin.to_mm());
            let mut inv = inv;
            if !config.verbose_tools {
                inv = inv.arg("--quiet");
            }
            inv.arg("--enable-local-file-access")
                .arg("--encoding")
                .arg("utf-8")
                .arg("--page-size")
                .arg(config.paper_size.wkhtml_name())
                .arg("-T")
                .arg(&margin)
                .arg("-B")
                .arg(&margin)
                .arg("-L")
                .arg(&margin)
                .arg("-R")
                .arg(&margin)
                .arg(html)
                .arg(pdf)
        }
        HtmlEngine::Chromium => {
            let mut print_to = OsString::from("--print-to-pdf=");
            print_to.push(pdf);
            inv.arg("--headless")
                .arg("--disable-gpu")
                .arg("--no-pdf-header-footer")
                .arg("--allow-file-access-from-files")
                .arg(print_to)
                .arg(file_url(html))
        }
    }
}

fn file_url(path: &Path) -> String {
    match reqwest::Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => format!("file://{}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LengthUnit, Margin, PaperSize};

    fn args(inv: &Invocation) -> Vec<String> {
        inv.arg_strings()
    }

    #[test]
    fn weasyprint_with_base_url() {
        let config = ConversionConfig::default();
        let inv = engine_invocation(
            HtmlEngine::WeasyPrint,
            Path::new("weasyprint"),
            Path::new("/tmp/in.html"),
            Path::new("/tmp/out.pdf"),
            Some(Path::new("/docs")),
            &config,
        );
        assert_eq!(
            args(&inv),
            vec!["--base-url", "/docs", "/tmp/in.html", "/tmp/out.pdf"]
        );
    }

    #[test]
    fn weasyprint_verbose() {
        let config = ConversionConfig::builder().verbose_tools(true).build().unwrap();
        let inv = engine_invocation(
            HtmlEngine::WeasyPrint,
            Path::new("weasyprint"),
            Path::new("in.html"),
            Path::new("out.pdf"),
            None,
            &config,
        );
        assert_eq!(args(&inv), vec!["-v", "in.html", "out.pdf"]);
    }

    #[test]
    fn wkhtmltopdf_gets_page_and_margins_in_mm() {
        let config = ConversionConfig::builder()
            .paper_size(PaperSize::Letter)
            .margin(Margin::new(2.0, LengthUnit::Cm))
            .build()
            .unwrap();
        let inv = engine_invocation(
            HtmlEngine::Wkhtmltopdf,
            Path::new("wkhtmltopdf"),
            Path::new("in.html"),
            Path::new("out.pdf"),
            None,
            &config,
        );
        let a = args(&inv);
        assert_eq!(a[0], "--quiet");
        assert!(a.windows(2).any(|w| w == ["--page-size", "Letter"]));
        assert!(a.windows(2).any(|w| w == ["-L", "20mm"]));
        assert_eq!(&a[a.len() - 2..], ["in.html", "out.pdf"]);
    }

    #[cfg(unix)]
    #[test]
    fn chromium_prints_file_url() {
        let config = ConversionConfig::default();
        let inv = engine_invocation(
            HtmlEngine::Chromium,
            Path::new("chromium"),
            Path::new("/tmp/my doc.html"),
            Path::new("/tmp/out.pdf"),
            None,
            &config,
        );
        let a = args(&inv);
        assert!(a.contains(&"--headless".to_string()));
        assert!(a.contains(&"--print-to-pdf=/tmp/out.pdf".to_string()));
        assert_eq!(a.last().unwrap(), "file:///tmp/my%20doc.html");
    }
}
