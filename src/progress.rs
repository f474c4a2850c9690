//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn FillProgressCallback>`] via
//! [`crate::config::FillConfigBuilder::progress_callback`] to receive
//! real-time events as a request walks the pipeline stages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal spinner without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` so one
//! config can serve concurrent requests.

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as each stage starts and completes.
///
/// All methods have default no-op implementations so callers only
/// override what they care about.
pub trait FillProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage completes successfully.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once when the whole request has completed successfully.
    ///
    /// # Arguments
    /// * `rows_written` — data rows written into the workbook copy
    /// * `skipped_merged_cells` — writes skipped by the merged-cell rule
    fn on_request_complete(&self, rows_written: usize, skipped_merged_cells: usize) {
        let _ = (rows_written, skipped_merged_cells);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FillConfig`].
pub type ProgressCallback = Arc<dyn FillProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        rows: AtomicUsize,
    }

    impl FillProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request_complete(&self, rows_written: usize, _skipped: usize) {
            self.rows.store(rows_written, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::OcrCall);
        cb.on_stage_complete(Stage::OcrCall);
        cb.on_request_complete(4, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            rows: AtomicUsize::new(0),
        };

        tracker.on_stage_start(Stage::JsonIsolation);
        tracker.on_stage_complete(Stage::JsonIsolation);
        tracker.on_stage_start(Stage::Normalization);
        tracker.on_stage_complete(Stage::Normalization);
        tracker.on_request_complete(7, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn FillProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::TemplateResolution);
        cb.on_request_complete(0, 0);
    }
}
