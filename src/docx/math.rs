//! LaTeX rendering for the document model.
//!
//! Word processors have no idea what `\(x^2\)` means, so formulas found in
//! text are drawn as pictures. [`ResvgMathRenderer`] does not typeset TeX: it
//! draws the literal source in an italic serif face, measured to its natural
//! bounding box and rendered at 2× for crisp output. A renderer that fails
//! on a formula costs only that formula, which falls back to italic text.

use crate::error::{NotepressError, RasterError};
use crate::pipeline::math::escape_html;
use crate::pipeline::svg::system_fonts;
use resvg::tiny_skia::{self, Pixmap};
use resvg::usvg::{self, fontdb};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DISPLAY_FONT_PX: f32 = 22.0;
pub const INLINE_FONT_PX: f32 = 16.0;

/// Widest a display formula may appear, in pixels.
pub const MAX_DISPLAY_WIDTH: u32 = 520;
/// Widest an inline formula may appear, in pixels.
pub const MAX_INLINE_WIDTH: u32 = 260;

const SCALE: f32 = 2.0;
const PADDING: f32 = 2.0;

/// A formula drawn to PNG. `width`/`height` are the display size; the bitmap
/// itself is larger by the supersampling factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMath {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// LaTeX → raster capability.
pub trait MathRenderer: Send + Sync {
    fn render(&self, latex: &str, display: bool) -> Result<RenderedMath, RasterError>;
}

/// Shrink `(w, h)` to at most `max_w` wide, keeping the aspect ratio.
pub fn fit_width(w: u32, h: u32, max_w: u32) -> (u32, u32) {
    if w <= max_w || w == 0 {
        return (w, h);
    }
    let h = ((h as f64) * (max_w as f64) / (w as f64)).round().max(1.0) as u32;
    (max_w, h)
}

#[derive(Clone)]
pub struct ResvgMathRenderer {
    fontdb: Arc<fontdb::Database>,
}

impl ResvgMathRenderer {
    /// Acquire a raster backend with the system fonts.
    pub fn new() -> Result<Self, NotepressError> {
        Self::with_fonts(system_fonts())
    }

    pub fn with_fonts(fontdb: Arc<fontdb::Database>) -> Result<Self, NotepressError> {
        if Pixmap::new(1, 1).is_none() {
            return Err(NotepressError::CanvasUnavailable {
                detail: "cannot allocate a pixel buffer".into(),
            });
        }
        if fontdb.len() == 0 {
            warn!("No fonts available; formulas will fall back to italic text");
        }
        Ok(Self { fontdb })
    }

    fn svg_for(latex: &str, font_px: f32) -> String {
        // Generous canvas; the real extent is measured after layout.
        let width = (latex.chars().count() as f32 + 4.0) * font_px;
        let height = font_px * 3.0;
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="{font_px}" y="{baseline}" font-family="Latin Modern Math, Cambria Math, STIX Two Math, Times New Roman, serif" font-style="italic" font-size="{font_px}" fill="black">{text}</text></svg>"#,
            baseline = font_px * 2.0,
            text = escape_html(latex),
        )
    }
}

impl MathRenderer for ResvgMathRenderer {
    fn render(&self, latex: &str, display: bool) -> Result<RenderedMath, RasterError> {
        let font_px = if display { DISPLAY_FONT_PX } else { INLINE_FONT_PX };
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(&Self::svg_for(latex, font_px), &options)
            .map_err(|e| RasterError::Decode(e.to_string()))?;

        let bbox = tree.root().abs_bounding_box();
        if bbox.width() < 1.0 || bbox.height() < 1.0 {
            return Err(RasterError::Backend("no glyphs were laid out".into()));
        }
        let w = (bbox.width() + 2.0 * PADDING).ceil();
        let h = (bbox.height() + 2.0 * PADDING).ceil();

        let mut pixmap = Pixmap::new((w * SCALE) as u32, (h * SCALE) as u32)
            .ok_or_else(|| RasterError::Backend(format!("cannot allocate {w}x{h} canvas")))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        let transform = tiny_skia::Transform::from_scale(SCALE, SCALE)
            .pre_translate(PADDING - bbox.x(), PADDING - bbox.y());
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        let png = pixmap.encode_png().map_err(|e| RasterError::Encode(e.to_string()))?;

        let max = if display { MAX_DISPLAY_WIDTH } else { MAX_INLINE_WIDTH };
        let (width, height) = fit_width(w as u32, h as u32, max);
        debug!("Rendered formula ({} chars) at {}x{}", latex.len(), width, height);
        Ok(RenderedMath { png, width, height })
    }
}
