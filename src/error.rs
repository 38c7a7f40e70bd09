//! Error types for the notepress library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NotepressError`] is **fatal**: the export cannot produce anything
//!   meaningful (the Markdown renderer failed, the configuration is invalid,
//!   the output could not be written). Returned as `Err(NotepressError)` from
//!   the top-level `export*` functions.
//!
//! * [`AssetError`] is **non-fatal**: a single image could not be resolved,
//!   read, rasterised or stored. The document is still produced with a
//!   visible marker in place of the asset, and the error is collected in
//!   [`crate::output::HtmlExport::asset_errors`] so callers can report it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error type returned by collaborator implementations (renderer, vault, store).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All fatal errors returned by the notepress library.
///
/// Per-asset failures use [`AssetError`] and never surface here.
#[derive(Debug, Error)]
pub enum NotepressError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The note could not be read from disk.
    #[error("Failed to read note '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The external Markdown renderer failed; there is no partial HTML to salvage.
    #[error("Markdown rendering failed for '{source_path}': {detail}")]
    RenderFailed { source_path: String, detail: String },

    /// Upload mode was requested but no asset store was supplied.
    #[error("Image mode 'upload' requires an asset store.\nConfigure one or use --image-mode embed.")]
    StoreRequired,

    /// A raster backend could not be acquired.
    #[error("Raster canvas unavailable: {detail}")]
    CanvasUnavailable { detail: String },

    /// docx-rs refused to pack the document.
    #[error("Failed to pack DOCX: {0}")]
    DocxPackFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single asset.
///
/// Each variant renders as the visible marker text substituted into the
/// output in place of the asset.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AssetError {
    /// The referenced asset does not exist in the vault.
    #[error("Image not found: {path}")]
    NotFound { path: String },

    /// The asset exists but its bytes could not be read.
    #[error("Image could not be read: {path} ({detail})")]
    ReadFailed { path: String, detail: String },

    /// The vector image could not be rasterised.
    #[error("Image could not be rasterised: {path} ({detail})")]
    RasterizeFailed { path: String, detail: String },

    /// The asset store rejected the upload.
    #[error("Image upload failed: {path} ({detail})")]
    StoreFailed { path: String, detail: String },

    /// A remote or inline image source could not be fetched.
    #[error("Image could not be fetched: {src} ({detail})")]
    FetchFailed { src: String, detail: String },

    /// The fetched bytes are not a decodable image.
    #[error("Image could not be decoded: {src} ({detail})")]
    DecodeFailed { src: String, detail: String },
}

/// Failure of a rasterisation capability (SVG or LaTeX text).
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// The vector source is malformed.
    #[error("decode error: {0}")]
    Decode(String),

    /// No pixel buffer could be allocated for the requested size.
    #[error("raster backend unavailable: {0}")]
    Backend(String),

    /// The pixel buffer could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_path() {
        let e = AssetError::NotFound {
            path: "attachments/pic.png".into(),
        };
        assert_eq!(e.to_string(), "Image not found: attachments/pic.png");
    }

    #[test]
    fn store_failed_display() {
        let e = AssetError::StoreFailed {
            path: "a.png".into(),
            detail: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.png"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn render_failed_display() {
        let e = NotepressError::RenderFailed {
            source_path: "notes/today.md".into(),
            detail: "boom".into(),
        };
        assert!(e.to_string().contains("notes/today.md"));
        assert!(e.to_string().contains("boom"));
    }

    #[test]
    fn asset_error_round_trips_through_json() {
        let e = AssetError::FetchFailed {
            src: "https://x/y.png".into(),
            detail: "timeout".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: AssetError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
