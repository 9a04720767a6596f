//! CLI tests with stand-in tools.
//!
//! Each test writes small shell scripts that behave like pandoc or an HTML
//! engine and points md2pdf at them through the `MD2PDF_*` overrides, so the
//! fallback chain can be driven without a TeX installation.

#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// pandoc stand-in. `fail_on` is matched against the argument list; a match
/// makes the run exit 43 without output.
fn fake_pandoc(dir: &Path, fail_on: &str) -> PathBuf {
    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "pandoc 3.8"
  exit 0
fi
case "$*" in
  *{fail_on}*) echo "! LaTeX Error: File \`fancy.sty' not found." >&2; exit 43 ;;
esac
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
case "$out" in
  *.html) echo "<html><body>pandoc</body></html>" > "$out" ;;
  *) echo "%PDF-1.4 stand-in" > "$out" ;;
esac
"#
    );
    write_script(dir, "pandoc", &script)
}

/// HTML engine stand-in that writes its last argument as a PDF.
fn fake_weasyprint(dir: &Path) -> PathBuf {
    let script = r#"#!/bin/sh
for a in "$@"; do out="$a"; done
echo "%PDF-1.4 stand-in" > "$out"
"#;
    write_script(dir, "weasyprint", script)
}

fn failing_tool(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "#!/bin/sh\necho \"boom\" >&2\nexit 1\n")
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

fn write_doc(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "# Notes\n\nInline $x^2$ and\n\n$$\\int_0^1 x\\,dx$$\n")
        .expect("write doc");
    path
}

/// A command with every tool override set; `None` points at a missing file.
fn md2pdf(
    pandoc: Option<&Path>,
    latex: Option<&Path>,
    weasyprint: Option<&Path>,
    scratch: &Path,
) -> Command {
    let missing = scratch.join("not-installed");
    let or_missing = |p: Option<&Path>| p.map(Path::to_path_buf).unwrap_or_else(|| missing.clone());
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("md2pdf"));
    cmd.env_remove("RUST_LOG")
        .env("MD2PDF_PANDOC", or_missing(pandoc))
        .env("MD2PDF_PDFLATEX", or_missing(latex))
        .env("MD2PDF_WEASYPRINT", or_missing(weasyprint))
        .arg("--no-progress");
    cmd
}

struct Fixture {
    dir: TempDir,
    bin: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).expect("mkdir bin");
        Self { dir, bin }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn full_pandoc_run_writes_pdf_next_to_input() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "never-matches");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&doc)
        .assert()
        .success();

    let pdf = std::fs::read(fx.path().join("notes.pdf")).expect("pdf written");
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn minimal_pandoc_run_follows_full_failure() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "-halt-on-error");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");
    let out = fx.path().join("out").join("result.pdf");

    let assert = md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&doc)
        .arg("-o")
        .arg(&out)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    let file = &json["files"][0];
    assert_eq!(file["output"]["strategy"], "pandoc-minimal");
    assert_eq!(file["output"]["failed_attempts"][0]["strategy"], "pandoc-full");
    assert_eq!(json["stats"]["pdf_files"], 1);
    assert!(out.is_file());
}

#[test]
fn html_engine_runs_when_pandoc_fails() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "--pdf-engine");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let weasy = fake_weasyprint(&fx.bin);
    let doc = write_doc(fx.path(), "notes.md");

    let assert = md2pdf(Some(&pandoc), Some(&latex), Some(&weasy), fx.path())
        .arg(&doc)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains("\"strategy\": \"html-engine\""), "{stdout}");
    assert!(fx.path().join("notes.pdf").is_file());
}

#[test]
fn builtin_html_fallback_is_written_and_reported() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "-o");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&doc)
        .assert()
        .success()
        .stderr(contains("Wrote HTML instead"));

    let html = std::fs::read_to_string(fx.path().join("notes.html")).expect("html written");
    assert!(html.contains("<title>Notes</title>"));
    assert!(html.contains("class=\"math inline\""));
    assert!(!fx.path().join("notes.pdf").exists());
}

#[test]
fn require_pdf_turns_html_fallback_into_failure() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "-o");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&doc)
        .arg("--require-pdf")
        .assert()
        .failure()
        .stderr(contains("--require-pdf"));
}

#[test]
fn no_html_fallback_reports_every_attempt() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "-o");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&doc)
        .arg("--no-html-fallback")
        .assert()
        .failure()
        .stderr(contains("fancy.sty"));

    assert!(!fx.path().join("notes.html").exists());
}

#[test]
fn missing_tools_are_fatal_before_any_attempt() {
    let fx = Fixture::new();
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(None, None, None, fx.path())
        .arg(&doc)
        .assert()
        .failure()
        .stderr(contains("MD2PDF_PANDOC"));
}

#[test]
fn missing_input_is_reported() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "never-matches");
    let latex = failing_tool(&fx.bin, "pdflatex");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(fx.path().join("absent.md"))
        .assert()
        .failure()
        .stderr(contains("absent.md"));
}

#[test]
fn quiet_still_reports_failures() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "never-matches");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg("-q")
        .arg("--output-dir")
        .arg(fx.path().join("out"))
        .arg(&doc)
        .arg(fx.path().join("absent.md"))
        .assert()
        .failure()
        .stderr(contains("absent.md").and(contains("notes.md").not()));

    assert!(fx.path().join("out/notes.pdf").exists());
}

#[test]
fn output_flag_rejects_multiple_inputs() {
    let fx = Fixture::new();
    let a = write_doc(fx.path(), "a.md");
    let b = write_doc(fx.path(), "b.md");

    md2pdf(None, None, None, fx.path())
        .arg(&a)
        .arg(&b)
        .arg("-o")
        .arg(fx.path().join("out.pdf"))
        .assert()
        .failure()
        .stderr(contains("single input"));
}

#[test]
fn batch_writes_into_output_dir() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "never-matches");
    let latex = failing_tool(&fx.bin, "pdflatex");
    let a = write_doc(fx.path(), "a.md");
    let b = write_doc(fx.path(), "b.md");
    let out_dir = fx.path().join("build");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg(&a)
        .arg(&b)
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("-j")
        .arg("2")
        .assert()
        .success();

    assert!(out_dir.join("a.pdf").is_file());
    assert!(out_dir.join("b.pdf").is_file());
}

#[test]
fn check_deps_reports_ready_toolchain() {
    let fx = Fixture::new();
    let pandoc = fake_pandoc(&fx.bin, "never-matches");
    let latex = failing_tool(&fx.bin, "pdflatex");

    md2pdf(Some(&pandoc), Some(&latex), None, fx.path())
        .arg("--check-deps")
        .assert()
        .success()
        .stdout(contains("pandoc"))
        .stdout(contains("Ready to convert"));
}

#[test]
fn check_deps_fails_without_pandoc() {
    let fx = Fixture::new();
    let latex = failing_tool(&fx.bin, "pdflatex");

    md2pdf(None, Some(&latex), None, fx.path())
        .arg("--check-deps")
        .arg("--json")
        .assert()
        .failure()
        .stdout(contains("\"ready\": false"));
}

#[test]
fn invalid_margin_is_rejected() {
    let fx = Fixture::new();
    let doc = write_doc(fx.path(), "notes.md");

    md2pdf(None, None, None, fx.path())
        .arg(&doc)
        .arg("--margin")
        .arg("wide")
        .assert()
        .failure()
        .stderr(contains("--margin"));
}
