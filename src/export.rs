//! Export entry points.
//!
//! [`export_html`] runs the extraction/restoration pipeline around the
//! Markdown renderer and returns a themed, self-contained HTML document.
//! [`export_docx`] runs the same pipeline in embed mode, walks the HTML into
//! the document model and packs a `.docx`. [`export_to_file`] picks one of the
//! two from the output extension and writes atomically.
//!
//! Only the renderer call and raster-backend acquisition are fatal. Every
//! image problem degrades to a visible marker and is reported in
//! [`HtmlExport::asset_errors`].

use crate::collab::{AssetResolver, AssetStore, MarkdownRenderer, SourceContext};
use crate::config::{ExportConfig, ImageMode};
use crate::docx::dom::parse_body;
use crate::docx::math::{MathRenderer, ResvgMathRenderer};
use crate::docx::media::MediaLoader;
use crate::docx::walker::html_to_document;
use crate::docx::writer::{write_docx, PageText};
use crate::error::NotepressError;
use crate::markdown::PulldownRenderer;
use crate::output::{DocxExport, ExportStats, HtmlExport};
use crate::pipeline::images::{replace_images, resolve_images, ImageResolveContext};
use crate::pipeline::math::escape_html;
use crate::pipeline::placeholder::{restore, PlaceholderCounter, PLACEHOLDER_PREFIX};
use crate::pipeline::svg::{Rasterizer, ResvgRasterizer};
use crate::pipeline::toc::{build_toc, Toc};
use crate::pipeline::{cleanup, code, frontmatter, images, math};
use crate::theme::{lookup_theme, Theme};
use crate::vault::FsVault;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The environment an export runs against.
///
/// ```rust,no_run
/// use notepress::{Collaborators, ExportConfig, SourceContext, export_html};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let collab = Collaborators::for_vault("/home/me/vault");
/// let note = std::fs::read_to_string("/home/me/vault/notes/today.md")?;
/// let out = export_html(&note, &SourceContext::new("notes/today.md"), &collab, &ExportConfig::default()).await?;
/// println!("{}", out.html);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn MarkdownRenderer>,
    pub assets: Arc<dyn AssetResolver>,
    /// Required for [`ImageMode::Upload`].
    pub store: Option<Arc<dyn AssetStore>>,
    pub rasterizer: Arc<dyn Rasterizer>,
    /// Used by [`export_docx`]; a [`ResvgMathRenderer`] is created when unset.
    pub math_renderer: Option<Arc<dyn MathRenderer>>,
}

impl Collaborators {
    pub fn new(renderer: Arc<dyn MarkdownRenderer>, assets: Arc<dyn AssetResolver>) -> Self {
        Self {
            renderer,
            assets,
            store: None,
            rasterizer: Arc::new(ResvgRasterizer::new()),
            math_renderer: None,
        }
    }

    /// `pulldown-cmark` rendering over a vault directory.
    pub fn for_vault(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(PulldownRenderer::new()), Arc::new(FsVault::new(root)))
    }

    pub fn with_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_math_renderer(mut self, math: Arc<dyn MathRenderer>) -> Self {
        self.math_renderer = Some(math);
        self
    }
}

/// Export a note to a complete HTML document.
///
/// # Errors
/// - [`NotepressError::StoreRequired`] in upload mode without a store
/// - [`NotepressError::RenderFailed`] when the Markdown renderer fails
pub async fn export_html(
    markdown: &str,
    source: &SourceContext,
    collab: &Collaborators,
    config: &ExportConfig,
) -> Result<HtmlExport, NotepressError> {
    let total_start = Instant::now();
    info!("Starting HTML export: {}", source.note_path);

    if config.image_mode == ImageMode::Upload && collab.store.is_none() {
        return Err(NotepressError::StoreRequired);
    }
    let theme = lookup_theme(&config.theme);

    // ── Step 1: Frontmatter ──────────────────────────────────────────────
    let stripped = frontmatter::strip_frontmatter(markdown);

    // ── Step 2: Park code, math and images ───────────────────────────────
    let mut counter = PlaceholderCounter::new();
    let (text, code_records) = code::extract_code(stripped.body, &mut counter);
    let (text, mut math_records) = math::extract_math(&text, &mut counter);
    let (text, mut image_records) = images::extract_images(&text, &mut counter);
    math::restore_nested_code(&mut math_records, &code_records);
    images::restore_nested(&mut image_records, &math_records, &code_records);
    debug!(
        "Extracted {} code spans, {} formulas, {} images",
        code_records.len(),
        math_records.len(),
        image_records.len()
    );

    // ── Step 3: Code back, then render ───────────────────────────────────
    let text = restore(&text, &code_records);
    let render_start = Instant::now();
    let rendered = collab
        .renderer
        .render(&text, source)
        .await
        .map_err(|e| NotepressError::RenderFailed {
            source_path: source.note_path.clone(),
            detail: e.to_string(),
        })?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Step 4: Math back as \( \) / \[ \] ───────────────────────────────
    let html = math::restore_math(&rendered, &math_records);

    // ── Step 5: Resolve images ───────────────────────────────────────────
    let image_start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(image_records.len());
    }
    let ctx = ImageResolveContext {
        resolver: &*collab.assets,
        store: collab.store.as_deref(),
        rasterizer: Arc::clone(&collab.rasterizer),
        mode: config.image_mode,
        note_path: &source.note_path,
        progress: config.progress_callback.as_ref(),
    };
    let resolved = resolve_images(&image_records, &ctx).await;
    let html = replace_images(&html, &resolved);
    let asset_errors: Vec<_> = resolved.into_iter().filter_map(|r| r.error).collect();
    let image_duration_ms = image_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(image_records.len(), image_records.len() - asset_errors.len());
    }

    // ── Step 6: Theme ────────────────────────────────────────────────────
    let html = cleanup::clean_html(&html, theme);

    // ── Step 7: Table of contents ────────────────────────────────────────
    let (body, toc) = if config.include_toc {
        build_toc(&html, theme)
    } else {
        (html, Toc::default())
    };

    if body.contains(PLACEHOLDER_PREFIX) {
        warn!("Unrestored placeholder left in {}", source.note_path);
    }

    // ── Step 8: Title and document wrapper ───────────────────────────────
    let title = config
        .title
        .clone()
        .or(stripped.title)
        .or_else(|| first_h1(&body))
        .or_else(|| source.stem().map(str::to_string))
        .unwrap_or_else(|| "Untitled".to_string());
    let document = wrap_document(
        &body,
        &title,
        theme,
        config.header_text.as_deref(),
        config.footer_text.as_deref(),
    );

    let stats = ExportStats {
        code_spans: code_records.len(),
        math_count: math_records.len(),
        images_total: image_records.len(),
        images_failed: asset_errors.len(),
        toc_entries: toc.len(),
        render_duration_ms,
        image_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "HTML export complete: {}/{} images, {} formulas, {}ms total",
        stats.images_ok(),
        stats.images_total,
        stats.math_count,
        stats.total_duration_ms
    );

    Ok(HtmlExport {
        html: document,
        body,
        title,
        toc,
        asset_errors,
        stats,
    })
}

/// Export a note to `.docx`.
///
/// Images are always embedded for this path, whatever `config.image_mode` says.
///
/// # Errors
/// Everything [`export_html`] returns, plus
/// [`NotepressError::CanvasUnavailable`] when no math renderer was supplied and
/// none can be created, and [`NotepressError::DocxPackFailed`].
pub async fn export_docx(
    markdown: &str,
    source: &SourceContext,
    collab: &Collaborators,
    config: &ExportConfig,
) -> Result<DocxExport, NotepressError> {
    let math: Arc<dyn MathRenderer> = match &collab.math_renderer {
        Some(m) => Arc::clone(m),
        None => Arc::new(ResvgMathRenderer::new()?),
    };

    let mut embed = config.clone();
    embed.image_mode = ImageMode::Embed;
    let html = export_html(markdown, source, collab, &embed).await?;

    let media = MediaLoader::new(
        Arc::clone(&collab.rasterizer),
        config.max_image_width,
        Duration::from_secs(config.fetch_timeout_secs),
    )
    .with_resolver(&*collab.assets, &source.note_path);
    let (document, walk) = html_to_document(&html.body, Some(html.title.clone()), &media, &*math).await;

    let theme = lookup_theme(&config.theme);
    let page = PageText {
        header: config.header_text.clone(),
        footer: config.footer_text.clone(),
    };
    let (document, packed) = tokio::task::spawn_blocking(move || {
        let packed = write_docx(&document, theme, &page);
        (document, packed)
    })
    .await
    .map_err(|e| NotepressError::Internal(format!("DOCX writer task panicked: {e}")))?;
    let bytes = packed?;
    info!("DOCX export complete: {} blocks, {} bytes", document.blocks.len(), bytes.len());

    Ok(DocxExport {
        bytes,
        document,
        html,
        walk,
    })
}

/// Output format chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Docx,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, NotepressError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "html" | "htm" => Ok(Self::Html),
            "docx" => Ok(Self::Docx),
            other => Err(NotepressError::InvalidConfig(format!(
                "unsupported output extension '{other}' (expected .html or .docx)"
            ))),
        }
    }
}

/// Export and write to `output_path`, HTML or DOCX by extension.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn export_to_file(
    markdown: &str,
    source: &SourceContext,
    collab: &Collaborators,
    config: &ExportConfig,
    output_path: impl AsRef<Path>,
) -> Result<ExportStats, NotepressError> {
    let path = output_path.as_ref();
    let format = OutputFormat::from_path(path)?;
    let (bytes, stats) = match format {
        OutputFormat::Html => {
            let out = export_html(markdown, source, collab, config).await?;
            (out.html.into_bytes(), out.stats)
        }
        OutputFormat::Docx => {
            let out = export_docx(markdown, source, collab, config).await?;
            (out.bytes, out.html.stats)
        }
    };
    write_atomic(path, &bytes).await?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(stats)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NotepressError> {
    let fail = |e: std::io::Error| NotepressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}

/// Read a note from disk.
pub async fn read_note(path: impl AsRef<Path>) -> Result<String, NotepressError> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| NotepressError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Synchronous wrapper around [`export_html`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_html_sync(
    markdown: &str,
    source: &SourceContext,
    collab: &Collaborators,
    config: &ExportConfig,
) -> Result<HtmlExport, NotepressError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NotepressError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_html(markdown, source, collab, config))
}

fn first_h1(html: &str) -> Option<String> {
    let text = parse_body(html).find("h1")?.text_content();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Wrap a body fragment in a standalone, themed HTML document.
pub fn wrap_document(
    body: &str,
    title: &str,
    theme: &Theme,
    header: Option<&str>,
    footer: Option<&str>,
) -> String {
    let mut out = String::with_capacity(body.len() + 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n</head>\n", escape_html(title)));
    out.push_str(&format!(
        "<body style=\"margin:0;padding:0;background:{};\">\n",
        theme.background
    ));
    out.push_str(&format!(
        "<div style=\"max-width:800px;margin:0 auto;padding:2em 1.5em;font-family:{};font-size:{};line-height:{};color:{};\">\n",
        theme.font_family, theme.font_size, theme.line_height, theme.text_color
    ));
    let aside = |tag: &str, text: &str, edge: &str| {
        format!(
            "<{tag} style=\"color:{};font-size:0.85em;border-{edge}:1px solid {};padding:0.5em 0;margin:1em 0;\">{}</{tag}>\n",
            theme.blockquote_color,
            theme.border_color,
            escape_html(text)
        )
    };
    if let Some(text) = header.filter(|t| !t.trim().is_empty()) {
        out.push_str(&aside("header", text, "bottom"));
    }
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    if let Some(text) = footer.filter(|t| !t.trim().is_empty()) {
        out.push_str(&aside("footer", text, "top"));
    }
    out.push_str("</div>\n</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::DEFAULT_THEME;

    #[test]
    fn wrapper_escapes_title_and_page_text() {
        let html = wrap_document("<p>x</p>", "A & <B>", &DEFAULT_THEME, Some("Head <1>"), Some("Foot"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>A &amp; &lt;B&gt;</title>"));
        assert!(html.contains(">Head &lt;1&gt;</header>"));
        assert!(html.contains(">Foot</footer>"));
        assert!(html.contains("<p>x</p>"));
    }

    #[test]
    fn blank_header_is_omitted() {
        let html = wrap_document("", "t", &DEFAULT_THEME, Some("  "), None);
        assert!(!html.contains("<header"));
        assert!(!html.contains("<footer"));
    }

    #[test]
    fn output_format_by_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/b.HTML")).unwrap(), OutputFormat::Html);
        assert_eq!(OutputFormat::from_path(Path::new("b.docx")).unwrap(), OutputFormat::Docx);
        assert!(matches!(
            OutputFormat::from_path(Path::new("b.pdf")),
            Err(NotepressError::InvalidConfig(_))
        ));
    }

    #[test]
    fn first_h1_reads_text() {
        assert_eq!(first_h1("<p>a</p><h1 style=\"x\">Big <em>Day</em></h1>").as_deref(), Some("Big Day"));
        assert_eq!(first_h1("<h2>no</h2>"), None);
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/deep/note.html");
        write_atomic(&path, b"hi").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hi");
        assert!(!dir.path().join("out/deep/note.html.tmp").exists());
    }
}
