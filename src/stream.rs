//! Streaming batch API: emit per-file results as they complete.
//!
//! Unlike the eager [`crate::convert::convert_batch`] which returns only
//! after every file finishes, [`convert_stream`] yields a [`FileResult`] as
//! soon as each file is done. With `concurrency > 1` files may arrive out of
//! order (sort by `index` if order matters).

use crate::config::ConversionConfig;
use crate::convert::{convert_job, Job};
use crate::error::Md2PdfError;
use crate::output::FileResult;
use crate::pipeline::toolchain;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file results.
pub type FileStream = Pin<Box<dyn Stream<Item = FileResult> + Send>>;

/// Convert `jobs`, streaming results as files finish.
///
/// Tools are probed once for the whole batch. A file that fails yields a
/// `FileResult` with `error` set; it does not end the stream.
///
/// # Returns
/// - `Ok(FileStream)`: one `FileResult` per job
/// - `Err(Md2PdfError)`: `jobs` is empty
///
/// # Example
/// ```rust,no_run
/// use md2pdf::{convert_stream, plan_jobs, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let jobs = plan_jobs(&["a.md", "b.md"], None)?;
/// let mut stream = convert_stream(jobs, &ConversionConfig::default()).await?;
/// while let Some(file) = stream.next().await {
///     match (&file.output, &file.error) {
///         (Some(out), _) => println!("{} → {}", file.input, out.output.display()),
///         (_, Some(e)) => eprintln!("{}: {e}", file.input),
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    jobs: Vec<Job>,
    config: &ConversionConfig,
) -> Result<FileStream, Md2PdfError> {
    if jobs.is_empty() {
        return Err(Md2PdfError::InvalidConfig("No input files given".into()));
    }
    let total = jobs.len();
    info!("Starting streaming conversion of {} file(s)", total);

    let toolchain = Arc::new(toolchain::discover(config).await);
    let concurrency = config.concurrency;
    let config_clone = config.clone();

    let s = stream::iter(jobs.into_iter().enumerate().map(move |(i, job)| {
        let toolchain = Arc::clone(&toolchain);
        let cfg = config_clone.clone();
        async move {
            let index = i + 1;
            match convert_job(&job, index, total, &toolchain, &cfg).await {
                Ok(output) => FileResult {
                    index,
                    input: job.input,
                    output: Some(output),
                    error: None,
                },
                Err(e) => FileResult {
                    index,
                    input: job.input,
                    output: None,
                    error: Some(e.to_string()),
                },
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
