//! Running external converters with a timeout.

use crate::error::AttemptError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// A fully built external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Short program name for messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// The arguments as strings, lossily.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// The command as it would be typed into a shell, for logs.
    pub fn command_line(&self) -> String {
        let mut line = quote(&self.program.display().to_string());
        for arg in self.arg_strings() {
            line.push(' ');
            line.push_str(&quote(&arg));
        }
        line
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Run `invocation`, killing it after `timeout_secs`.
///
/// A non-zero exit becomes [`AttemptError::ExitStatus`] carrying stderr (or
/// stdout when stderr is empty, since pandoc prints LaTeX errors there).
/// Output of a successful run is only logged.
pub async fn run(invocation: &Invocation, timeout_secs: u64) -> Result<(), AttemptError> {
    let program = invocation.program_name();
    debug!("Running: {}", invocation.command_line());

    let mut cmd = tokio::process::Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("Failed to start {}: {}", invocation.command_line(), e);
            return Err(AttemptError::Spawn {
                program,
                detail: e.to_string(),
            });
        }
        Err(_) => {
            error!(
                "Timed out after {}s: {}",
                timeout_secs,
                invocation.command_line()
            );
            return Err(AttemptError::Timeout {
                program,
                secs: timeout_secs,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let elapsed = started.elapsed();

    if !output.status.success() {
        error!(
            command = %invocation.command_line(),
            exit_code = output.status.code().map(i64::from).unwrap_or(-1),
            elapsed_ms = elapsed.as_millis() as u64,
            "External converter failed"
        );
        if !stdout.trim().is_empty() {
            error!("{} stdout:\n{}", program, stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            error!("{} stderr:\n{}", program, stderr.trim_end());
        }
        let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
        return Err(AttemptError::ExitStatus {
            program,
            code: output.status.code(),
            stderr: tail(detail, 20),
        });
    }

    if !stdout.trim().is_empty() {
        debug!("{} stdout:\n{}", program, stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        warn!("{} stderr:\n{}", program, stderr.trim_end());
    }
    debug!("{} finished in {}ms", program, elapsed.as_millis());
    Ok(())
}

/// The last `n` non-empty lines of tool output.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Check that a strategy left a usable artefact at `path`.
pub async fn validate_artifact(path: &Path, expect_pdf: bool) -> Result<u64, AttemptError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AttemptError::InvalidOutput {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(AttemptError::InvalidOutput {
            path: path.to_path_buf(),
            detail: "file is empty".into(),
        });
    }
    if expect_pdf && !bytes.starts_with(b"%PDF") {
        return Err(AttemptError::InvalidOutput {
            path: path.to_path_buf(),
            detail: "file does not start with %PDF".into(),
        });
    }
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_only_when_needed() {
        let inv = Invocation::new("/usr/bin/pandoc")
            .arg("my notes.md")
            .arg("-V")
            .arg("geometry:margin=1in");
        assert_eq!(
            inv.command_line(),
            "/usr/bin/pandoc 'my notes.md' -V geometry:margin=1in"
        );
        assert_eq!(inv.program_name(), "pandoc");
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\n\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("", 3), "");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let inv = Invocation::new("/definitely/not/a/program");
        let err = run(&inv, 5).await.unwrap_err();
        assert!(matches!(err, AttemptError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let inv = Invocation::new("/bin/sh")
            .arg("-c")
            .arg("echo 'LaTeX Error: missing package' >&2; exit 43");
        match run(&inv, 5).await.unwrap_err() {
            AttemptError::ExitStatus { code, stderr, .. } => {
                assert_eq!(code, Some(43));
                assert!(stderr.contains("missing package"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let inv = Invocation::new("/bin/sh").arg("-c").arg("sleep 5");
        let err = run(&inv, 1).await.unwrap_err();
        assert!(matches!(err, AttemptError::Timeout { secs: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chatty_success_is_ok() {
        let inv = Invocation::new("/bin/sh")
            .arg("-c")
            .arg("echo hello; echo 'Overfull \\hbox' >&2");
        assert!(run(&inv, 5).await.is_ok());
    }

    #[tokio::test]
    async fn artifact_validation() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&pdf, b"%PDF-1.5\n").unwrap();
        assert_eq!(validate_artifact(&pdf, true).await.unwrap(), 9);

        let html = dir.path().join("a.html");
        std::fs::write(&html, b"<html>").unwrap();
        assert!(validate_artifact(&html, true).await.is_err());
        assert!(validate_artifact(&html, false).await.is_ok());

        let empty = dir.path().join("e.pdf");
        std::fs::write(&empty, b"").unwrap();
        assert!(validate_artifact(&empty, true).await.is_err());
        assert!(validate_artifact(&dir.path().join("missing.pdf"), true)
            .await
            .is_err());
    }
}
