//! Progress-callback trait for per-image export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events while embedded images are resolved, rasterised and stored.
//! Image resolution is the only stage of an export with noticeable latency
//! (disk reads, SVG rendering, uploads), so it is the only stage that reports.
//!
//! # Example
//!
//! ```rust
//! use notepress::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, path: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("image {index}/{total} ready: {path}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the export pipeline as it resolves each embedded image.
///
/// Implementations must be `Send + Sync`: images within one batch are resolved
/// concurrently, so `on_image_start`, `on_image_complete` and `on_image_error`
/// may interleave. All methods have default no-op implementations.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first image batch starts.
    ///
    /// # Arguments
    /// * `total_images`: number of image embeds extracted from the note
    fn on_export_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before an image is resolved.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position of the embed in the note
    /// * `total`: total number of embeds
    /// * `path`: vault path of the asset
    fn on_image_start(&self, index: usize, total: usize, path: &str) {
        let _ = (index, total, path);
    }

    /// Called when an image was resolved and its replacement markup produced.
    fn on_image_complete(&self, index: usize, total: usize, path: &str) {
        let _ = (index, total, path);
    }

    /// Called when an image degraded to a failure marker.
    ///
    /// # Arguments
    /// * `error`: human-readable error description
    fn on_image_error(&self, index: usize, total: usize, path: &str, error: &str) {
        let _ = (index, total, path, error);
    }

    /// Called once after every image has been attempted.
    ///
    /// # Arguments
    /// * `total_images`: number of embeds
    /// * `success_count`: embeds that resolved without error
    fn on_export_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_export_start(&self, total_images: usize) {
            self.started_total.store(total_images, Ordering::SeqCst);
        }

        fn on_image_start(&self, _index: usize, _total: usize, _path: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _total: usize, _path: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _index: usize, _total: usize, _path: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_complete(&self, _total_images: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(5);
        cb.on_image_start(1, 5, "a.png");
        cb.on_image_complete(1, 5, "a.png");
        cb.on_image_error(2, 5, "b.png", "not found");
        cb.on_export_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_export_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_image_start(1, 3, "a.png");
        tracker.on_image_complete(1, 3, "a.png");
        tracker.on_image_start(2, 3, "b.svg");
        tracker.on_image_complete(2, 3, "b.svg");
        tracker.on_image_start(3, 3, "c.png");
        tracker.on_image_error(3, 3, "c.png", "Image not found: c.png");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_export_complete(3, 2);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ExportProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_export_start(10);
        cb.on_image_start(1, 10, "x.png");
    }
}
