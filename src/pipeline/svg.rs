//! SVG rasterisation, shared by the HTML pipeline and the document model.
//!
//! Target size: 800×600 unless the SVG declares a `viewBox`, in which case
//! its width/height are used, unless explicit `width`/`height` attributes are
//! present, which win. The result is then doubled for crisp output and drawn
//! on opaque white (PNG has alpha, but most consumers of the export don't
//! expect transparent figures on a page).
//!
//! Drawing is behind the [`Rasterizer`] capability so the pipeline can be
//! exercised without a real backend.

use crate::error::RasterError;
use once_cell::sync::Lazy;
use resvg::tiny_skia::{self, Pixmap};
use resvg::usvg::{self, fontdb};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SVG_WIDTH: u32 = 800;
pub const DEFAULT_SVG_HEIGHT: u32 = 600;
pub const SUPERSAMPLE: u32 = 2;

/// Upper bound on either raster edge; protects against absurd declared sizes.
const MAX_EDGE: u32 = 8192;

/// Vector → raster capability.
pub trait Rasterizer: Send + Sync {
    /// Render `svg` to PNG bytes at exactly `width`×`height` pixels.
    fn rasterize(&self, svg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RasterError>;
}

/// Work out the raster size for `svg`, including supersampling.
pub fn svg_target_size(svg: &[u8]) -> Result<(u32, u32), RasterError> {
    let text = std::str::from_utf8(svg).map_err(|e| RasterError::Decode(e.to_string()))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| RasterError::Decode(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RasterError::Decode(format!(
            "root element is <{}>, not <svg>",
            root.tag_name().name()
        )));
    }

    let (mut w, mut h) = (DEFAULT_SVG_WIDTH as f32, DEFAULT_SVG_HEIGHT as f32);
    if let Some((vw, vh)) = root.attribute("viewBox").and_then(parse_view_box) {
        w = vw;
        h = vh;
    }
    if let Some(aw) = root.attribute("width").and_then(parse_length) {
        w = aw;
    }
    if let Some(ah) = root.attribute("height").and_then(parse_length) {
        h = ah;
    }

    let scale = |v: f32| ((v * SUPERSAMPLE as f32).round() as u32).clamp(1, MAX_EDGE);
    Ok((scale(w), scale(h)))
}

fn parse_view_box(value: &str) -> Option<(f32, f32)> {
    let nums: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
        _ => None,
    }
}

/// Absolute lengths only; percentages and font-relative units are ignored.
fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let (num, factor) = if let Some(n) = value.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, 4.0 / 3.0)
    } else if let Some(n) = value.strip_suffix("in") {
        (n, 96.0)
    } else if let Some(n) = value.strip_suffix("mm") {
        (n, 96.0 / 25.4)
    } else if let Some(n) = value.strip_suffix("cm") {
        (n, 96.0 / 2.54)
    } else {
        (value, 1.0)
    };
    let v: f32 = num.trim().parse().ok()?;
    (v > 0.0).then_some(v * factor)
}

static SYSTEM_FONTS: Lazy<Arc<fontdb::Database>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} system font faces", db.len());
    Arc::new(db)
});

/// The process-wide system font database, loaded on first use.
pub fn system_fonts() -> Arc<fontdb::Database> {
    Arc::clone(&SYSTEM_FONTS)
}

/// [`Rasterizer`] backed by resvg.
#[derive(Clone)]
pub struct ResvgRasterizer {
    fontdb: Arc<fontdb::Database>,
}

impl ResvgRasterizer {
    pub fn new() -> Self {
        Self {
            fontdb: system_fonts(),
        }
    }

    pub fn with_fonts(fontdb: Arc<fontdb::Database>) -> Self {
        Self { fontdb }
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for ResvgRasterizer {
    fn rasterize(&self, svg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RasterError> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_data(svg, &options).map_err(|e| RasterError::Decode(e.to_string()))?;

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| RasterError::Backend(format!("cannot allocate {width}x{height} pixmap")))?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        debug!("Rasterised SVG at {}x{}", width, height);

        pixmap.encode_png().map_err(|e| RasterError::Encode(e.to_string()))
    }
}

/// Size and rasterise in one step.
pub fn rasterize_svg(rasterizer: &dyn Rasterizer, svg: &[u8]) -> Result<Vec<u8>, RasterError> {
    let (w, h) = svg_target_size(svg)?;
    rasterizer.rasterize(svg, w, h)
}
