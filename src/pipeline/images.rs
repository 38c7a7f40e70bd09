//! Image embed extraction and post-render resolution.
//!
//! Two syntaxes are recognised, in this order:
//!
//! 1. vault embeds `![[path]]`, `![[path|300]]`, `![[path|300x200]]`,
//!    `![[path|caption]]`: a numeric or `WxH` suffix is a width, anything
//!    else is alt text;
//! 2. Markdown images `![alt](path)` with a percent-encoded path.
//!
//! Only targets with an image extension are taken; remote and `data:` URLs in
//! `![alt](…)` form are left for the renderer, which handles them fine. The
//! renderer would rewrite local paths into something useless outside the
//! vault, which is why the vault path is kept aside in [`ImageExtraction`].
//!
//! Resolution runs after rendering, [`BATCH_SIZE`] images at a time. Every
//! failure becomes a visible inline marker; no image can fail the export.

use super::math::MathExtraction;
use super::placeholder::{
    extract, restore, Extraction, PlaceholderCounter, PlaceholderKind, SpanMatcher, PLACEHOLDER_PREFIX,
};
use super::svg::{rasterize_svg, Rasterizer};
use crate::collab::{AssetResolver, AssetStore};
use crate::config::ImageMode;
use crate::error::AssetError;
use crate::pipeline::math::escape_html;
use crate::progress::ProgressCallback;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of images resolved concurrently; batches run one after another.
pub const BATCH_SIZE: usize = 5;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "avif"];

static RE_WIKI_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[\[([^\]|\n]+?)(?:\|([^\]\n]*))?\]\]").unwrap());

static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]\n]*)\]\(\s*(<[^>\n]+>|[^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#).unwrap()
});

static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)(?:\s*[xX]\s*(\d+))?\s*$").unwrap());

/// One extracted image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtraction {
    pub base: Extraction,
    /// Link target as written in the note, decoded.
    pub vault_path: String,
    pub alt: String,
    pub width: Option<u32>,
    pub is_svg: bool,
}

impl AsRef<Extraction> for ImageExtraction {
    fn as_ref(&self) -> &Extraction {
        &self.base
    }
}

fn extension_of(path: &str) -> String {
    let path = path.split(['#', '?']).next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_image_path(path: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension_of(path).as_str())
}

fn is_remote(path: &str) -> bool {
    path.contains("://") || path.starts_with("data:") || path.starts_with("//")
}

fn decode_md_path(raw: &str) -> String {
    let raw = raw
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// A regex whose matches are only taken when `accept` agrees.
struct FilteredMatcher {
    re: &'static Regex,
    accept: fn(&Captures<'_>) -> bool,
}

impl SpanMatcher for FilteredMatcher {
    fn next_span(&self, text: &str, from: usize) -> Option<Range<usize>> {
        let mut at = from;
        while let Some(caps) = self.re.captures_at(text, at) {
            let m = caps.get(0)?;
            if (self.accept)(&caps) {
                return Some(m.range());
            }
            at = m.end();
        }
        None
    }
}

fn accept_wiki(caps: &Captures<'_>) -> bool {
    caps.get(1).is_some_and(|m| is_image_path(m.as_str().trim()))
}

fn accept_md(caps: &Captures<'_>) -> bool {
    caps.get(2).is_some_and(|m| {
        let path = decode_md_path(m.as_str());
        !is_remote(&path) && is_image_path(&path)
    })
}

fn from_wiki(base: Extraction) -> Option<ImageExtraction> {
    let caps = RE_WIKI_EMBED.captures(&base.original)?;
    let vault_path = caps.get(1)?.as_str().trim().to_string();
    let suffix = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    let (alt, width) = match RE_SIZE.captures(suffix) {
        Some(size) => (String::new(), size.get(1).and_then(|w| w.as_str().parse().ok())),
        None => (suffix.to_string(), None),
    };
    Some(ImageExtraction {
        is_svg: extension_of(&vault_path) == "svg",
        vault_path,
        alt,
        width,
        base,
    })
}

fn from_markdown(base: Extraction) -> Option<ImageExtraction> {
    let caps = RE_MD_IMAGE.captures(&base.original)?;
    let alt = caps.get(1)?.as_str().trim().to_string();
    let vault_path = decode_md_path(caps.get(2)?.as_str());
    Some(ImageExtraction {
        is_svg: extension_of(&vault_path) == "svg",
        vault_path,
        alt,
        width: None,
        base,
    })
}

/// Swap every image embed for a placeholder. Vault embeds come first.
pub fn extract_images(text: &str, counter: &mut PlaceholderCounter) -> (String, Vec<ImageExtraction>) {
    let wiki = FilteredMatcher {
        re: &RE_WIKI_EMBED,
        accept: accept_wiki,
    };
    let md = FilteredMatcher {
        re: &RE_MD_IMAGE,
        accept: accept_md,
    };
    let (text, wiki_recs) = extract(text, &wiki, PlaceholderKind::Image, counter);
    let (text, md_recs) = extract(&text, &md, PlaceholderKind::Image, counter);

    let records: Vec<_> = wiki_recs
        .into_iter()
        .filter_map(from_wiki)
        .chain(md_recs.into_iter().filter_map(from_markdown))
        .collect();
    debug!("Extracted {} image embeds", records.len());
    (text, records)
}

/// Put math and code back into alt text and link targets.
///
/// Embeds are extracted last, so `![[p.png|Plot of $y$]]` carries a math
/// placeholder in its caption. Math originals may hold code placeholders in
/// turn, hence math first, then code.
pub fn restore_nested(records: &mut [ImageExtraction], math: &[MathExtraction], code: &[Extraction]) {
    let expand = |text: &str| restore(&restore(text, math), code);
    for record in records {
        if record.alt.contains(PLACEHOLDER_PREFIX) {
            record.alt = expand(&record.alt);
        }
        if record.vault_path.contains(PLACEHOLDER_PREFIX) {
            record.vault_path = expand(&record.vault_path);
            record.is_svg = extension_of(&record.vault_path) == "svg";
        }
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Everything image resolution needs from the surrounding export.
pub struct ImageResolveContext<'a> {
    pub resolver: &'a dyn AssetResolver,
    pub store: Option<&'a dyn AssetStore>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub mode: ImageMode,
    /// Vault-relative path of the note the embeds came from.
    pub note_path: &'a str,
    pub progress: Option<&'a ProgressCallback>,
}

/// Replacement markup for one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub placeholder: String,
    pub html: String,
    pub error: Option<AssetError>,
}

/// Resolve every record, [`BATCH_SIZE`] at a time.
///
/// Output order matches `records`.
pub async fn resolve_images(records: &[ImageExtraction], ctx: &ImageResolveContext<'_>) -> Vec<ResolvedImage> {
    let total = records.len();
    let mut resolved = Vec::with_capacity(total);
    for (batch_no, batch) in records.chunks(BATCH_SIZE).enumerate() {
        let futures = batch.iter().enumerate().map(|(i, record)| {
            let index = batch_no * BATCH_SIZE + i + 1;
            resolve_with_progress(record, index, total, ctx)
        });
        resolved.extend(join_all(futures).await);
    }
    resolved
}

async fn resolve_with_progress(
    record: &ImageExtraction,
    index: usize,
    total: usize,
    ctx: &ImageResolveContext<'_>,
) -> ResolvedImage {
    if let Some(cb) = ctx.progress {
        cb.on_image_start(index, total, &record.vault_path);
    }
    match resolve_one(record, ctx).await {
        Ok(html) => {
            if let Some(cb) = ctx.progress {
                cb.on_image_complete(index, total, &record.vault_path);
            }
            ResolvedImage {
                placeholder: record.base.placeholder.clone(),
                html,
                error: None,
            }
        }
        Err(err) => {
            warn!("Image {}/{} degraded: {}", index, total, err);
            if let Some(cb) = ctx.progress {
                cb.on_image_error(index, total, &record.vault_path, &err.to_string());
            }
            ResolvedImage {
                placeholder: record.base.placeholder.clone(),
                html: failure_marker(&err),
                error: Some(err),
            }
        }
    }
}

async fn resolve_one(record: &ImageExtraction, ctx: &ImageResolveContext<'_>) -> Result<String, AssetError> {
    let path = record.vault_path.clone();
    let handle = ctx
        .resolver
        .resolve(&record.vault_path, ctx.note_path)
        .await
        .ok_or_else(|| AssetError::NotFound { path: path.clone() })?;

    let mut bytes = ctx
        .resolver
        .read_binary(&handle)
        .await
        .map_err(|e| AssetError::ReadFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;

    let mut name = handle.name.clone();
    let ext = handle.extension();
    let mut mime = if record.is_svg || ext == "svg" {
        let rasterizer = Arc::clone(&ctx.rasterizer);
        bytes = tokio::task::spawn_blocking(move || rasterize_svg(&*rasterizer, &bytes))
            .await
            .map_err(|e| AssetError::RasterizeFailed {
                path: path.clone(),
                detail: format!("rasterizer task panicked: {e}"),
            })?
            .map_err(|e| AssetError::RasterizeFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        name = png_name(&name);
        "image/png".to_string()
    } else {
        sniff_mime(&bytes, &ext)
    };
    mime = normalize_mime(&mime).to_string();
    debug!("Resolved image {} ({}, {} bytes)", name, mime, bytes.len());

    let src = match ctx.mode {
        ImageMode::Upload => {
            let store = ctx.store.ok_or_else(|| AssetError::StoreFailed {
                path: path.clone(),
                detail: "no asset store configured".into(),
            })?;
            store
                .store(&bytes, &name, &mime)
                .await
                .map_err(|e| AssetError::StoreFailed {
                    path: path.clone(),
                    detail: e.to_string(),
                })?
        }
        ImageMode::Embed => data_uri(&mime, &bytes),
    };
    Ok(img_tag(&src, &record.alt, record.width))
}

fn png_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.png"),
        _ => format!("{name}.png"),
    }
}

/// MIME type from content, falling back to the file extension.
fn sniff_mime(bytes: &[u8], ext: &str) -> String {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) if ext.is_empty() => "application/octet-stream".to_string(),
        Err(_) => format!("image/{ext}"),
    }
}

/// Collapse the non-standard `image/jpg` alias.
pub fn normalize_mime(mime: &str) -> &str {
    if mime.eq_ignore_ascii_case("image/jpg") {
        "image/jpeg"
    } else {
        mime
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn img_tag(src: &str, alt: &str, width: Option<u32>) -> String {
    let width_attr = width.map(|w| format!(" width=\"{w}\"")).unwrap_or_default();
    format!(
        "<img src=\"{}\" alt=\"{}\"{} style=\"max-width:100%;height:auto;\">",
        escape_html(src),
        escape_html(alt),
        width_attr
    )
}

/// Visible inline marker for a failed image.
pub fn failure_marker(err: &AssetError) -> String {
    format!(
        "<span style=\"color:#c0392b;font-style:italic;\">[{}]</span>",
        escape_html(&err.to_string())
    )
}

/// Substitute resolved markup into rendered HTML.
///
/// A placeholder the renderer wrapped in its own `<p>` is a block-level image:
/// the whole paragraph is swapped for a centred container. Anywhere else the
/// bare placeholder is replaced in place.
pub fn replace_images(html: &str, resolved: &[ResolvedImage]) -> String {
    let mut out = html.to_string();
    for image in resolved.iter().rev() {
        let wrapped = format!("<p>{}</p>", image.placeholder);
        if out.contains(&wrapped) {
            let block = format!("<div style=\"text-align:center;margin:1em 0;\">{}</div>", image.html);
            out = out.replace(&wrapped, &block);
        }
        if out.contains(&image.placeholder) {
            out = out.replace(&image.placeholder, &image.html);
        }
    }
    out
}
