//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as a batch moves each file from idle → converting → done, fallback
//! or error.
//!
//! The callback keeps the library ignorant of how the host reports progress:
//! a terminal progress bar, a channel to a UI thread, or a log file all fit.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counter {
//!     fn on_file_complete(&self, _index: usize, _total: usize, output: &std::path::Path, _pdf: bool) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("wrote {}", output.display());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::AttemptError;
use crate::output::Strategy;
use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each file.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` several
/// files are converted at once and events for different files interleave.
/// All methods have default no-op implementations.
///
/// `index` is the 1-based position of the file in the batch; a single
/// conversion reports `index = 1, total = 1`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is converted.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a file starts converting.
    fn on_file_start(&self, index: usize, total: usize, input: &str) {
        let _ = (index, total, input);
    }

    /// Called when one strategy of the fallback chain fails and the next
    /// one is about to run.
    fn on_attempt_failed(&self, index: usize, strategy: Strategy, error: &AttemptError) {
        let _ = (index, strategy, error);
    }

    /// Called when a file produced an artefact.
    ///
    /// `is_pdf` is false when only an HTML fallback was written.
    fn on_file_complete(&self, index: usize, total: usize, output: &Path, is_pdf: bool) {
        let _ = (index, total, output, is_pdf);
    }

    /// Called when a file failed for good.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every file has been attempted.
    ///
    /// `pdf_count` counts files that produced a real PDF.
    fn on_batch_complete(&self, total: usize, pdf_count: usize) {
        let _ = (total, pdf_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: AtomicUsize,
        errors: AtomicUsize,
        failed_strategies: Mutex<Vec<Strategy>>,
        pdf_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _input: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _index: usize, strategy: Strategy, _error: &AttemptError) {
            self.failed_strategies.lock().unwrap().push(strategy);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _output: &Path, is_pdf: bool) {
            if is_pdf {
                self.completes.fetch_add(1, Ordering::SeqCst);
            } else {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_file_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, pdf_count: usize) {
            self.pdf_total.store(pdf_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(1, 2, "a.md");
        cb.on_attempt_failed(
            1,
            Strategy::PandocFull,
            &AttemptError::Io {
                detail: "x".into(),
            },
        );
        cb.on_file_complete(1, 2, Path::new("a.pdf"), true);
        cb.on_file_error(2, 2, "boom");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_file_start(1, 3, "a.md");
        tracker.on_file_complete(1, 3, Path::new("a.pdf"), true);
        tracker.on_file_start(2, 3, "b.md");
        tracker.on_attempt_failed(
            2,
            Strategy::PandocFull,
            &AttemptError::Timeout {
                program: "pandoc".into(),
                secs: 1,
            },
        );
        tracker.on_file_complete(2, 3, Path::new("b.html"), false);
        tracker.on_file_start(3, 3, "c.md");
        tracker.on_file_error(3, 3, "not found");
        tracker.on_batch_complete(3, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.failed_strategies.lock().unwrap(),
            vec![Strategy::PandocFull]
        );
        assert_eq!(tracker.pdf_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_file_start(1, 10, "notes.md");
    }
}
