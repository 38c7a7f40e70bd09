//! HTML → document model.
//!
//! The walker has two modes. In *block* mode it dispatches each child of a
//! container by tag; in *inline* mode it turns text and phrasing elements into
//! runs, carrying bold/italic/monospace/link state down from ancestors.
//!
//! Block dispatch table:
//!
//! | tag | block |
//! |-----|-------|
//! | `h1`–`h6` | [`Block::Heading`] |
//! | `p` | [`Block::Paragraph`], or [`Block::Image`] if it holds nothing but one image |
//! | `pre` | [`Block::CodeBlock`] |
//! | `blockquote` | [`Block::Blockquote`] |
//! | `table` | [`Block::Table`] |
//! | `ul`, `ol` | [`Block::List`] (nested lists kept) |
//! | `img` | [`Block::Image`] |
//! | `hr` | [`Block::HorizontalRule`] |
//! | `div`, `section`, `article`, … | transparent, children re-dispatched |
//! | anything else | paragraph if it has text, otherwise dropped |
//!
//! Stray text and phrasing elements directly inside a container are gathered
//! into one paragraph.
//!
//! `\(…\)` and `\[…\]` in text outside code are drawn by the
//! [`MathRenderer`]; a formula that fails to draw stays as italic source.
//! An image that fails to load turns the smallest enclosing unit (paragraph,
//! heading, table cell or list item) into a visible `[…]` marker.

use crate::docx::dom::{parse_body, parse_title, Element, HtmlNode};
use crate::docx::math::MathRenderer;
use crate::docx::media::MediaLoader;
use crate::docx::model::{Block, Document, ImageData, ListItem, Run, TableCell, TableRow, TextRun};
use crate::error::{AssetError, RasterError};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Counters gathered during one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub images: usize,
    pub images_failed: usize,
    pub math_rendered: usize,
    pub math_failed: usize,
    /// Blocks, cells or list items replaced by a marker.
    pub degraded: usize,
}

#[derive(Default)]
struct Counters {
    images: AtomicUsize,
    images_failed: AtomicUsize,
    math_rendered: AtomicUsize,
    math_failed: AtomicUsize,
    degraded: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WalkStats {
        WalkStats {
            images: self.images.load(Ordering::Relaxed),
            images_failed: self.images_failed.load(Ordering::Relaxed),
            math_rendered: self.math_rendered.load(Ordering::Relaxed),
            math_failed: self.math_failed.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    monospace: bool,
    in_link: bool,
}

impl InlineStyle {
    fn text_run(&self, text: String) -> Run {
        Run::Text(TextRun {
            text,
            bold: self.bold,
            italic: self.italic,
            monospace: self.monospace,
        })
    }
}

/// Containers whose children are re-dispatched as blocks.
const TRANSPARENT: &[&str] = &[
    "body", "div", "section", "article", "main", "nav", "header", "footer", "aside", "figure",
    "details", "center",
];

/// Elements that never carry document content.
const IGNORED: &[&str] = &["head", "script", "style", "template", "noscript", "title", "meta", "link"];

/// Phrasing elements collected into a paragraph when they appear between blocks.
const PHRASING: &[&str] = &[
    "a", "abbr", "b", "br", "cite", "code", "del", "em", "i", "input", "kbd", "mark", "s", "samp",
    "small", "span", "strike", "strong", "sub", "sup", "tt", "u",
];

pub struct DomWalker<'a> {
    media: &'a MediaLoader<'a>,
    math: &'a dyn MathRenderer,
    counters: Counters,
}

impl<'a> DomWalker<'a> {
    pub fn new(media: &'a MediaLoader<'a>, math: &'a dyn MathRenderer) -> Self {
        Self {
            media,
            math,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> WalkStats {
        self.counters.snapshot()
    }

    /// Walk the children of `root` (normally `<body>`).
    pub async fn walk(&self, root: &Element) -> Vec<Block> {
        self.blocks(root).await
    }

    fn blocks<'s>(&'s self, parent: &'s Element) -> BoxFuture<'s, Vec<Block>> {
        async move {
            let mut out = Vec::new();
            let mut pending: Vec<&HtmlNode> = Vec::new();

            for node in &parent.children {
                let el = match node {
                    HtmlNode::Text(_) => {
                        pending.push(node);
                        continue;
                    }
                    HtmlNode::Element(el) if PHRASING.contains(&el.tag.as_str()) => {
                        pending.push(node);
                        continue;
                    }
                    HtmlNode::Element(el) => el,
                };
                self.flush_pending(&mut pending, &mut out).await;
                match self.block(el).await {
                    Ok(blocks) => out.extend(blocks),
                    Err(e) => out.push(self.degrade(&el.tag, &e)),
                }
            }
            self.flush_pending(&mut pending, &mut out).await;
            out
        }
        .boxed()
    }

    async fn flush_pending(&self, pending: &mut Vec<&HtmlNode>, out: &mut Vec<Block>) {
        if pending.is_empty() {
            return;
        }
        let nodes: Vec<HtmlNode> = pending.drain(..).cloned().collect();
        match self.runs(&nodes, InlineStyle::default()).await {
            Ok(runs) if runs.is_empty() => {}
            Ok(runs) => out.push(paragraph_or_image(runs)),
            Err(e) => out.push(self.degrade("p", &e)),
        }
    }

    fn degrade(&self, what: &str, err: &AssetError) -> Block {
        warn!("Replacing <{}> with a marker: {}", what, err);
        Counters::bump(&self.counters.degraded);
        Block::marker(err.to_string())
    }

    fn block<'s>(&'s self, el: &'s Element) -> BoxFuture<'s, Result<Vec<Block>, AssetError>> {
        async move {
            let tag = el.tag.as_str();
            let block = match tag {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = tag[1..].parse().unwrap_or(1);
                    let runs = self.runs(&el.children, InlineStyle::default()).await?;
                    if runs.is_empty() {
                        return Ok(Vec::new());
                    }
                    Block::Heading { level, runs }
                }
                "p" => {
                    let runs = self.runs(&el.children, InlineStyle::default()).await?;
                    if runs.is_empty() {
                        return Ok(Vec::new());
                    }
                    paragraph_or_image(runs)
                }
                "pre" => match code_lines(el) {
                    Some(lines) => Block::CodeBlock { lines },
                    None => return Ok(Vec::new()),
                },
                "blockquote" => Block::Blockquote {
                    blocks: self.blocks(el).await,
                },
                "table" => Block::Table {
                    rows: self.table_rows(el).await,
                },
                "ul" | "ol" => Block::List {
                    ordered: tag == "ol",
                    items: self.list_items(el).await,
                },
                "img" => Block::Image {
                    image: self.image(el).await?,
                },
                "hr" => Block::HorizontalRule,
                t if TRANSPARENT.contains(&t) => return Ok(self.blocks(el).await),
                t if IGNORED.contains(&t) => return Ok(Vec::new()),
                _ => {
                    if el.text_content().trim().is_empty() {
                        debug!("Dropping empty <{}>", tag);
                        return Ok(Vec::new());
                    }
                    let runs = self.runs(&el.children, InlineStyle::default()).await?;
                    if runs.is_empty() {
                        return Ok(Vec::new());
                    }
                    Block::Paragraph { runs }
                }
            };
            Ok(vec![block])
        }
        .boxed()
    }

    // ── Tables ───────────────────────────────────────────────────────────────

    async fn table_rows(&self, table: &Element) -> Vec<TableRow> {
        let mut trs = Vec::new();
        collect_rows(table, &mut trs);

        let mut rows = Vec::with_capacity(trs.len());
        for tr in trs {
            let header = tr.child_elements().any(|c| c.tag == "th");
            let style = InlineStyle {
                bold: header,
                ..InlineStyle::default()
            };
            let mut cells = Vec::new();
            for cell in tr.child_elements().filter(|c| c.tag == "td" || c.tag == "th") {
                let runs = match self.runs(&cell.children, style).await {
                    Ok(runs) => runs,
                    Err(e) => marker_runs(self.degrade(&cell.tag, &e)),
                };
                cells.push(TableCell { runs });
            }
            if !cells.is_empty() {
                rows.push(TableRow { header, cells });
            }
        }
        rows
    }

    // ── Lists ────────────────────────────────────────────────────────────────

    async fn list_items(&self, list: &Element) -> Vec<ListItem> {
        let mut items = Vec::new();
        for li in list.child_elements().filter(|c| c.tag == "li") {
            let item = match self.list_item(li).await {
                Ok(item) => item,
                Err(e) => ListItem {
                    runs: marker_runs(self.degrade("li", &e)),
                    children: Vec::new(),
                },
            };
            items.push(item);
        }
        items
    }

    /// An item's own text goes into `runs`; nested lists and further blocks
    /// become `children`. In a loose list the first `<p>` is the item text.
    async fn list_item(&self, li: &Element) -> Result<ListItem, AssetError> {
        let mut inline: Vec<HtmlNode> = Vec::new();
        let mut item = ListItem::default();

        for node in &li.children {
            match node {
                HtmlNode::Element(el) if !PHRASING.contains(&el.tag.as_str()) => {
                    if el.tag == "p" && item.children.is_empty() && inline.iter().all(is_blank) {
                        inline.extend(el.children.iter().cloned());
                        continue;
                    }
                    item.children.extend(self.block(el).await?);
                }
                _ if item.children.is_empty() => inline.push(node.clone()),
                // Text after a nested block is rare; keep it as its own paragraph.
                other => {
                    let runs = self.runs(std::slice::from_ref(other), InlineStyle::default()).await?;
                    if !runs.is_empty() {
                        item.children.push(Block::Paragraph { runs });
                    }
                }
            }
        }
        item.runs = self.runs(&inline, InlineStyle::default()).await?;
        Ok(item)
    }

    // ── Inline content ───────────────────────────────────────────────────────

    async fn runs(&self, nodes: &[HtmlNode], style: InlineStyle) -> Result<Vec<Run>, AssetError> {
        Ok(tidy(self.raw_runs(nodes, style).await?))
    }

    async fn inline_element(
        &self,
        el: &Element,
        style: InlineStyle,
        out: &mut Vec<Run>,
    ) -> Result<(), AssetError> {
        let mut inner = style;
        match el.tag.as_str() {
            "br" => {
                out.push(Run::Break);
                return Ok(());
            }
            "img" => {
                let image = self.image(el).await?;
                out.push(Run::Image { image });
                return Ok(());
            }
            "input" => {
                if el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox")) {
                    let mark = if el.attr("checked").is_some() { "☑ " } else { "☐ " };
                    out.push(style.text_run(mark.to_string()));
                }
                return Ok(());
            }
            "a" if !style.in_link => {
                let href = el.attr("href").map(str::trim).unwrap_or("");
                inner.in_link = true;
                let runs = self.raw_runs(&el.children, inner).await?;
                if href.is_empty() || href.starts_with('#') {
                    out.extend(runs);
                } else {
                    out.push(Run::hyperlink(href, runs));
                }
                return Ok(());
            }
            "strong" | "b" => inner.bold = true,
            "em" | "i" | "cite" => inner.italic = true,
            "code" | "kbd" | "samp" | "tt" => inner.monospace = true,
            "span" => {
                let css = el.attr("style").unwrap_or("").replace(' ', "").to_ascii_lowercase();
                if css.contains("font-style:italic") {
                    inner.italic = true;
                }
                if ["font-weight:bold", "font-weight:600", "font-weight:700"]
                    .iter()
                    .any(|w| css.contains(w))
                {
                    inner.bold = true;
                }
            }
            t if IGNORED.contains(&t) => return Ok(()),
            _ => {}
        }
        out.extend(self.raw_runs(&el.children, inner).await?);
        Ok(())
    }

    /// Runs with whitespace left as written; [`tidy`] runs once per unit.
    fn raw_runs<'s>(
        &'s self,
        nodes: &'s [HtmlNode],
        style: InlineStyle,
    ) -> BoxFuture<'s, Result<Vec<Run>, AssetError>> {
        async move {
            let mut raw = Vec::new();
            for node in nodes {
                match node {
                    HtmlNode::Text(text) => self.text(text, style, &mut raw),
                    HtmlNode::Element(el) => self.inline_element(el, style, &mut raw).await?,
                }
            }
            Ok(raw)
        }
        .boxed()
    }

    fn text(&self, text: &str, style: InlineStyle, out: &mut Vec<Run>) {
        if style.monospace {
            out.push(style.text_run(collapse_whitespace(text)));
            return;
        }
        for segment in split_math(text) {
            match segment {
                Segment::Text(t) => out.push(style.text_run(collapse_whitespace(t))),
                Segment::Math { latex, display } => out.push(self.formula(latex, display, style)),
            }
        }
    }

    fn formula(&self, latex: &str, display: bool, style: InlineStyle) -> Run {
        let latex = collapse_whitespace(latex);
        let rendered = self.math.render(&latex, display).and_then(|r| {
            image::load_from_memory(&r.png)
                .map(|_| r)
                .map_err(|e| RasterError::Decode(e.to_string()))
        });
        match rendered {
            Ok(rendered) => {
                Counters::bump(&self.counters.math_rendered);
                Run::Image {
                    image: ImageData {
                        bytes: rendered.png,
                        width: rendered.width,
                        height: rendered.height,
                    },
                }
            }
            Err(e) => {
                warn!("Formula kept as text ({}): {}", e, latex);
                Counters::bump(&self.counters.math_failed);
                Run::Text(TextRun {
                    text: latex,
                    italic: true,
                    bold: style.bold,
                    monospace: false,
                })
            }
        }
    }

    async fn image(&self, el: &Element) -> Result<ImageData, AssetError> {
        Counters::bump(&self.counters.images);
        let src = el.attr("src").map(str::trim).unwrap_or("");
        let result = if src.is_empty() {
            Err(AssetError::NotFound {
                path: el.attr("alt").unwrap_or("").to_string(),
            })
        } else {
            let width = el
                .attr("width")
                .and_then(|w| w.trim().trim_end_matches("px").parse::<u32>().ok());
            self.media.load(src, width).await
        };
        if result.is_err() {
            Counters::bump(&self.counters.images_failed);
        }
        result
    }
}

/// Walk a full HTML document into a [`Document`].
///
/// `title` wins over the document's `<title>`.
pub async fn html_to_document(
    html: &str,
    title: Option<String>,
    media: &MediaLoader<'_>,
    math: &dyn MathRenderer,
) -> (Document, WalkStats) {
    let body = parse_body(html);
    let walker = DomWalker::new(media, math);
    let blocks = walker.walk(&body).await;
    let stats = walker.stats();
    info!(
        "Document model: {} blocks, {} images ({} failed), {} formulas ({} as text)",
        blocks.len(),
        stats.images,
        stats.images_failed,
        stats.math_rendered + stats.math_failed,
        stats.math_failed
    );
    let title = title.or_else(|| parse_title(html));
    (Document { title, blocks }, stats)
}

fn paragraph_or_image(mut runs: Vec<Run>) -> Block {
    if let [Run::Image { .. }] = runs.as_slice() {
        if let Some(Run::Image { image }) = runs.pop() {
            return Block::Image { image };
        }
    }
    Block::Paragraph { runs }
}

fn marker_runs(block: Block) -> Vec<Run> {
    match block {
        Block::Paragraph { runs } => runs,
        _ => Vec::new(),
    }
}

fn is_blank(node: &HtmlNode) -> bool {
    matches!(node, HtmlNode::Text(t) if t.trim().is_empty())
}

fn collect_rows<'e>(el: &'e Element, out: &mut Vec<&'e Element>) {
    for child in el.child_elements() {
        match child.tag.as_str() {
            "tr" => out.push(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, out),
            _ => {}
        }
    }
}

fn code_lines(pre: &Element) -> Option<Vec<String>> {
    let text = pre.text_content().replace("\r\n", "\n");
    let text = text.strip_suffix('\n').unwrap_or(&text);
    if text.is_empty() {
        return None;
    }
    Some(text.split('\n').map(str::to_string).collect())
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'t> {
    Text(&'t str),
    Math { latex: &'t str, display: bool },
}

const MATH_DELIMITERS: [(&str, &str, bool); 2] = [("\\(", "\\)", false), ("\\[", "\\]", true)];

/// Split text on `\(…\)` and `\[…\]`. Unclosed openers stay text.
fn split_math(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        let next = MATH_DELIMITERS
            .iter()
            .filter_map(|&(open, close, display)| rest.find(open).map(|i| (i, open, close, display)))
            .min_by_key(|(i, ..)| *i);
        let Some((start, open, close, display)) = next else { break };
        let body = &rest[start + open.len()..];
        let Some(len) = body.find(close) else { break };
        let end = start + open.len() + len + close.len();
        let latex = body[..len].trim();
        if latex.is_empty() {
            out.push(Segment::Text(&rest[..end]));
        } else {
            if start > 0 {
                out.push(Segment::Text(&rest[..start]));
            }
            out.push(Segment::Math { latex, display });
        }
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Collapse spaces across run boundaries, trim the ends, drop empty runs.
fn tidy(runs: Vec<Run>) -> Vec<Run> {
    let mut at_space = true;
    let mut out = tidy_into(runs, &mut at_space);
    trim_trailing(&mut out);
    out
}

fn tidy_into(runs: Vec<Run>, at_space: &mut bool) -> Vec<Run> {
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        match run {
            Run::Text(mut t) => {
                if *at_space {
                    t.text = t.text.trim_start_matches(' ').to_string();
                }
                if t.text.is_empty() {
                    continue;
                }
                *at_space = t.text.ends_with(' ');
                out.push(Run::Text(t));
            }
            Run::Break => {
                trim_trailing(&mut out);
                *at_space = true;
                out.push(Run::Break);
            }
            Run::Image { .. } => {
                *at_space = false;
                out.push(run);
            }
            Run::Hyperlink { target, runs } => {
                let inner = tidy_into(runs, at_space);
                if !inner.is_empty() {
                    out.push(Run::Hyperlink { target, runs: inner });
                }
            }
        }
    }
    out
}

fn trim_trailing(runs: &mut Vec<Run>) {
    loop {
        let now_empty = match runs.last_mut() {
            Some(Run::Text(t)) => {
                let keep = t.text.trim_end_matches(' ').len();
                t.text.truncate(keep);
                t.text.is_empty()
            }
            Some(Run::Hyperlink { runs: inner, .. }) => {
                trim_trailing(inner);
                inner.is_empty()
            }
            _ => return,
        };
        if !now_empty {
            return;
        }
        runs.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::math::RenderedMath;
    use crate::docx::model::runs_text;
    use crate::error::RasterError;
    use crate::pipeline::svg::Rasterizer;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoRaster;

    impl Rasterizer for NoRaster {
        fn rasterize(&self, _: &[u8], _: u32, _: u32) -> Result<Vec<u8>, RasterError> {
            Err(RasterError::Backend("unused".into()))
        }
    }

    struct BoxMath;

    impl MathRenderer for BoxMath {
        fn render(&self, latex: &str, display: bool) -> Result<RenderedMath, RasterError> {
            Ok(RenderedMath {
                png: png_bytes(latex.len() as u32, 1),
                width: if display { 100 } else { 40 },
                height: 20,
            })
        }
    }

    struct BrokenMath;

    impl MathRenderer for BrokenMath {
        fn render(&self, _: &str, _: bool) -> Result<RenderedMath, RasterError> {
            Err(RasterError::Backend("no canvas".into()))
        }
    }

    /// Renders "successfully" but hands back bytes no decoder accepts.
    struct GarbageMath;

    impl MathRenderer for GarbageMath {
        fn render(&self, _: &str, _: bool) -> Result<RenderedMath, RasterError> {
            Ok(RenderedMath {
                png: vec![1, 2, 3, 4],
                width: 10,
                height: 10,
            })
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w.max(1), h.max(1), Rgba([0, 0, 0, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn png_uri(w: u32, h: u32) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(w, h)))
    }

    async fn walk_with(html: &str, math: &dyn MathRenderer) -> (Vec<Block>, WalkStats) {
        let media = MediaLoader::new(Arc::new(NoRaster), 600, Duration::from_secs(1));
        let (doc, stats) = html_to_document(html, None, &media, math).await;
        (doc.blocks, stats)
    }

    async fn walk(html: &str) -> Vec<Block> {
        walk_with(html, &BoxMath).await.0
    }

    fn text_runs(block: &Block) -> Vec<TextRun> {
        let runs = match block {
            Block::Paragraph { runs } | Block::Heading { runs, .. } => runs,
            other => panic!("no runs in {other:?}"),
        };
        runs.iter()
            .filter_map(|r| match r {
                Run::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn formatting_is_inherited() {
        let blocks = walk("<h2>A <em>b</em></h2><p>x <strong>y <em>z</em></strong> <code>c</code></p>").await;
        assert!(matches!(&blocks[0], Block::Heading { level: 2, .. }));
        assert_eq!(blocks[0].plain_text(), "A b");

        let runs = text_runs(&blocks[1]);
        let z = runs.iter().find(|r| r.text == "z").unwrap();
        assert!(z.bold && z.italic);
        let c = runs.iter().find(|r| r.text == "c").unwrap();
        assert!(c.monospace && !c.bold);
        assert_eq!(blocks[1].plain_text(), "x y z c");
    }

    #[tokio::test]
    async fn whitespace_collapses_and_breaks_survive() {
        let blocks = walk("<p>\n  one\n   two<br>\n three  </p>").await;
        assert_eq!(blocks[0].plain_text(), "one two\nthree");
    }

    #[tokio::test]
    async fn links_become_hyperlinks_without_nesting() {
        let blocks = walk(r##"<p><a href="https://a.example">out <a href="https://b.example">in</a></a> <a href="#toc-1">local</a></p>"##).await;
        let Block::Paragraph { runs } = &blocks[0] else { panic!() };
        let links: Vec<_> = runs
            .iter()
            .filter_map(|r| match r {
                Run::Hyperlink { target, runs } => Some((target.as_str(), runs)),
                _ => None,
            })
            .collect();
        assert!(links.iter().all(|(t, _)| !t.starts_with('#')));
        for (_, inner) in &links {
            assert!(inner.iter().all(|r| !matches!(r, Run::Hyperlink { .. })));
        }
        assert!(blocks[0].plain_text().ends_with("local"));
    }

    #[tokio::test]
    async fn math_in_text_becomes_images() {
        let (blocks, stats) = walk_with(r"<p>Area \(\pi r^2\) here</p><p>\[x^2\]</p>", &BoxMath).await;
        let Block::Paragraph { runs } = &blocks[0] else { panic!() };
        assert!(matches!(&runs[1], Run::Image { image } if image.width == 40 && image.height == 20));
        assert_eq!(runs_text(runs), "Area  here");
        assert!(matches!(&blocks[1], Block::Image { image } if image.width == 100));
        assert_eq!(stats.math_rendered, 2);
    }

    #[tokio::test]
    async fn failed_math_stays_as_italic_source() {
        let (blocks, stats) = walk_with(r"<p>see \(a+b\)</p>", &BrokenMath).await;
        let runs = text_runs(&blocks[0]);
        let formula = runs.iter().find(|r| r.text == "a+b").unwrap();
        assert!(formula.italic);
        assert_eq!(stats.math_failed, 1);
    }

    #[tokio::test]
    async fn undecodable_formula_image_falls_back_to_text() {
        let (blocks, stats) = walk_with(r"<p>see \(a+b\) and more</p>", &GarbageMath).await;
        let runs = text_runs(&blocks[0]);
        assert!(runs.iter().any(|r| r.text == "a+b" && r.italic));
        assert_eq!(stats.math_rendered, 0);
        assert_eq!(stats.math_failed, 1);
    }

    #[tokio::test]
    async fn code_hides_math() {
        let (blocks, stats) = walk_with(r"<p><code>\(x\)</code></p><pre><code>\[y\]</code></pre>", &BoxMath).await;
        assert_eq!(blocks[0].plain_text(), r"\(x\)");
        assert_eq!(blocks[1], Block::CodeBlock { lines: vec![r"\[y\]".into()] });
        assert_eq!(stats.math_rendered, 0);
    }

    #[tokio::test]
    async fn code_block_keeps_lines() {
        let blocks = walk("<pre><code>fn main() {\n    x;\n}\n</code></pre>").await;
        assert_eq!(
            blocks[0],
            Block::CodeBlock {
                lines: vec!["fn main() {".into(), "    x;".into(), "}".into()]
            }
        );
    }

    #[tokio::test]
    async fn header_rows_are_bold() {
        let blocks = walk(
            "<table><thead><tr><th>k</th><th>v</th></tr></thead><tbody><tr><td>a</td><td>1</td></tr></tbody></table>",
        )
        .await;
        let Block::Table { rows } = &blocks[0] else { panic!() };
        assert_eq!(rows.len(), 2);
        assert!(rows[0].header && !rows[1].header);
        assert!(matches!(&rows[0].cells[0].runs[0], Run::Text(t) if t.bold));
        assert!(matches!(&rows[1].cells[0].runs[0], Run::Text(t) if !t.bold));
    }

    #[tokio::test]
    async fn nested_lists_are_kept() {
        let blocks = walk("<ul><li>one<ul><li>deep</li></ul></li><li><p>loose</p></li></ul><ol><li>n</li></ol>").await;
        let Block::List { ordered: false, items } = &blocks[0] else { panic!() };
        assert_eq!(runs_text(&items[0].runs), "one");
        assert!(matches!(&items[0].children[0], Block::List { items, .. } if runs_text(&items[0].runs) == "deep"));
        assert_eq!(runs_text(&items[1].runs), "loose");
        assert!(items[1].children.is_empty());
        assert!(matches!(&blocks[1], Block::List { ordered: true, .. }));
    }

    #[tokio::test]
    async fn task_list_checkboxes() {
        let blocks = walk(r#"<ul><li><input type="checkbox" checked disabled> done</li><li><input type="checkbox" disabled> todo</li></ul>"#).await;
        let Block::List { items, .. } = &blocks[0] else { panic!() };
        assert_eq!(runs_text(&items[0].runs), "☑ done");
        assert_eq!(runs_text(&items[1].runs), "☐ todo");
    }

    #[tokio::test]
    async fn containers_are_transparent_and_unknown_tags_fall_back() {
        let blocks = walk("<div><section><p>a</p></section></div><custom>b</custom><custom></custom><hr>").await;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].plain_text(), "a");
        assert_eq!(blocks[1].plain_text(), "b");
        assert_eq!(blocks[2], Block::HorizontalRule);
    }

    #[tokio::test]
    async fn stray_inline_content_becomes_one_paragraph() {
        let blocks = walk("<div>loose <b>text</b><p>para</p></div>").await;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].plain_text(), "loose text");
    }

    #[tokio::test]
    async fn broken_image_degrades_only_its_block() {
        let good = png_uri(1200, 600);
        let html = format!(r#"<p><img src="{good}"></p><p><img src="missing.png"></p><img src="{good}" width="100">"#);
        let (blocks, stats) = walk_with(&html, &BoxMath).await;
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::Image { image } if (image.width, image.height) == (600, 300)));
        assert_eq!(blocks[1].plain_text(), "[Image not found: missing.png]");
        assert!(matches!(&blocks[2], Block::Image { image } if (image.width, image.height) == (100, 50)));
        assert_eq!((stats.images, stats.images_failed, stats.degraded), (3, 1, 1));
    }

    #[tokio::test]
    async fn broken_image_in_cell_only_marks_the_cell() {
        let blocks = walk(r#"<table><tr><td>ok</td><td><img src="nope.png"></td></tr></table>"#).await;
        let Block::Table { rows } = &blocks[0] else { panic!() };
        assert_eq!(runs_text(&rows[0].cells[0].runs), "ok");
        assert_eq!(runs_text(&rows[0].cells[1].runs), "[Image not found: nope.png]");
    }

    #[tokio::test]
    async fn styled_marker_span_keeps_italics() {
        let blocks = walk(r#"<div><span style="color:#c0392b;font-style:italic;">[Image not found: a.png]</span></div>"#).await;
        let runs = text_runs(&blocks[0]);
        assert!(runs[0].italic);
    }

    #[tokio::test]
    async fn title_comes_from_head() {
        let media = MediaLoader::new(Arc::new(NoRaster), 600, Duration::from_secs(1));
        let html = "<html><head><title>T</title></head><body><p>x</p></body></html>";
        let (doc, _) = html_to_document(html, None, &media, &BoxMath).await;
        assert_eq!(doc.title.as_deref(), Some("T"));
        let (doc, _) = html_to_document(html, Some("Mine".into()), &media, &BoxMath).await;
        assert_eq!(doc.title.as_deref(), Some("Mine"));
    }

    #[test]
    fn split_math_edges() {
        assert_eq!(
            split_math(r"a \(x\) b \[y\]"),
            vec![
                Segment::Text("a "),
                Segment::Math { latex: "x", display: false },
                Segment::Text(" b "),
                Segment::Math { latex: "y", display: true },
            ]
        );
        assert_eq!(split_math(r"open \( only"), vec![Segment::Text(r"open \( only")]);
        assert_eq!(split_math(r"\(\)"), vec![Segment::Text(r"\(\)")]);
    }
}
