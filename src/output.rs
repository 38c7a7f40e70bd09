//! Results returned by the export entry points.

use crate::docx::{Document, WalkStats};
use crate::error::AssetError;
use crate::pipeline::toc::Toc;
use serde::{Deserialize, Serialize};

/// A finished HTML export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlExport {
    /// Complete, self-contained document (doctype, head, themed body).
    pub html: String,
    /// Cleaned body fragment, TOC included, without the document wrapper.
    pub body: String,
    pub title: String,
    /// Empty unless the TOC was requested and the note has headings.
    pub toc: Toc,
    /// Images that degraded to a visible marker, in note order.
    pub asset_errors: Vec<AssetError>,
    pub stats: ExportStats,
}

/// A finished word-processor export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocxExport {
    /// Packed `.docx` bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub document: Document,
    /// Embed-mode HTML export the document was walked from.
    pub html: HtmlExport,
    pub walk: WalkStats,
}

/// Counters and timings for one export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub code_spans: usize,
    pub math_count: usize,
    pub images_total: usize,
    pub images_failed: usize,
    pub toc_entries: usize,
    /// Time spent in the Markdown renderer.
    pub render_duration_ms: u64,
    /// Time spent resolving, rasterising and storing images.
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ExportStats {
    pub fn images_ok(&self) -> usize {
        self.images_total.saturating_sub(self.images_failed)
    }
}
