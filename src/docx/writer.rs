//! Document model → `.docx` bytes.

use crate::docx::model::{self, Block, Document, ImageData, ListItem};
use crate::docx::styles::{self, DocxNumbering, DocxStyles, INDENT_STEP, LIST_LEVELS};
use crate::error::NotepressError;
use crate::theme::Theme;
use docx_rs::{
    AlignmentType, BreakType, Docx, Footer, Header, Hyperlink, HyperlinkType, IndentLevel,
    NumberingId, Paragraph, Pic, Run, Shading, Table, TableCell, TableRow,
};
use std::io::Cursor;
use tracing::{debug, warn};

/// English Metric Units per CSS pixel at 96 dpi.
pub const EMU_PER_PX: u32 = 9525;

/// Text placed in the page header and footer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// Block nesting while writing: Word has no containers, so quotes and lists
/// become indentation on each paragraph.
#[derive(Debug, Clone, Copy, Default)]
struct Nesting {
    quote_depth: usize,
}

pub struct DocxWriter {
    styles: DocxStyles,
    numbering: DocxNumbering,
}

impl DocxWriter {
    pub fn new(theme: &Theme) -> Self {
        Self {
            styles: DocxStyles::from_theme(theme),
            numbering: DocxNumbering::new(),
        }
    }

    /// Build and pack the whole document.
    pub fn write(mut self, doc: &Document, page: &PageText) -> Result<Vec<u8>, NotepressError> {
        let mut docx = self.styles.apply(Docx::new());

        if let Some(text) = page.header.as_deref().filter(|t| !t.trim().is_empty()) {
            docx = docx.header(Header::new().add_paragraph(small_centered(text)));
        }
        if let Some(text) = page.footer.as_deref().filter(|t| !t.trim().is_empty()) {
            docx = docx.footer(Footer::new().add_paragraph(small_centered(text)));
        }

        // The title is shown only when the body has no top-level heading of its own.
        let has_h1 = doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Heading { level: 1, .. }));
        if let (Some(title), false) = (doc.title.as_deref(), has_h1) {
            docx = docx.add_paragraph(
                Paragraph::new()
                    .style(styles::TITLE)
                    .add_run(Run::new().add_text(title)),
            );
        }

        for block in &doc.blocks {
            docx = self.block(docx, block, Nesting::default());
        }

        let mut buffer = Vec::new();
        docx.build()
            .pack(&mut Cursor::new(&mut buffer))
            .map_err(|e| NotepressError::DocxPackFailed(e.to_string()))?;
        debug!("Packed DOCX: {} blocks, {} bytes", doc.blocks.len(), buffer.len());
        Ok(buffer)
    }

    fn block(&mut self, docx: Docx, block: &Block, nest: Nesting) -> Docx {
        match block {
            Block::Heading { level, runs } => {
                let level = (*level).clamp(1, 6);
                let para = Paragraph::new().style(&format!("Heading{level}"));
                docx.add_paragraph(self.runs(para, runs))
            }
            Block::Paragraph { runs } => {
                let para = self.quoted(Paragraph::new(), nest);
                docx.add_paragraph(self.runs(para, runs))
            }
            Block::CodeBlock { lines } => {
                let mut docx = docx;
                for line in lines {
                    let para = Paragraph::new()
                        .style(styles::CODE_BLOCK)
                        .add_run(Run::new().add_text(line).fonts(self.styles.code_fonts()));
                    docx = docx.add_paragraph(self.indented(para, nest));
                }
                docx
            }
            Block::Blockquote { blocks } => {
                let inner = Nesting {
                    quote_depth: nest.quote_depth + 1,
                };
                blocks.iter().fold(docx, |docx, b| self.block(docx, b, inner))
            }
            Block::Table { rows } => docx.add_table(self.table(rows)),
            Block::List { ordered, items } => self.list(docx, *ordered, items, 0, nest),
            Block::Image { image } => docx.add_paragraph(
                Paragraph::new()
                    .align(AlignmentType::Center)
                    .add_run(image_run(image)),
            ),
            Block::HorizontalRule => docx.add_paragraph(
                Paragraph::new()
                    .style(styles::HORIZONTAL_LINE)
                    .add_run(Run::new().add_text("* * *")),
            ),
        }
    }

    fn quoted(&self, para: Paragraph, nest: Nesting) -> Paragraph {
        if nest.quote_depth == 0 {
            return para;
        }
        self.indented(para.style(styles::BLOCKQUOTE), nest)
    }

    fn indented(&self, para: Paragraph, nest: Nesting) -> Paragraph {
        if nest.quote_depth == 0 {
            return para;
        }
        para.indent(Some(INDENT_STEP * nest.quote_depth as i32), None, None, None)
    }

    fn list(&mut self, docx: Docx, ordered: bool, items: &[ListItem], level: usize, nest: Nesting) -> Docx {
        let (mut docx, id) = self.numbering.add_list(docx, ordered);
        let level = level.min(LIST_LEVELS - 1);
        for item in items {
            let para = Paragraph::new().numbering(NumberingId::new(id), IndentLevel::new(level));
            docx = docx.add_paragraph(self.runs(para, &item.runs));
            for child in &item.children {
                docx = match child {
                    Block::List { ordered, items } => self.list(docx, *ordered, items, level + 1, nest),
                    other => self.block(docx, other, nest),
                };
            }
        }
        docx
    }

    fn table(&self, rows: &[model::TableRow]) -> Table {
        let rows = rows
            .iter()
            .map(|row| {
                let cells = row
                    .cells
                    .iter()
                    .map(|cell| {
                        let para = self.runs(Paragraph::new(), &cell.runs);
                        let mut cell = TableCell::new().add_paragraph(para);
                        if row.header {
                            cell = cell.shading(Shading::new().fill(&self.styles.header_fill));
                        }
                        cell
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();
        Table::new(rows)
    }

    fn runs(&self, mut para: Paragraph, runs: &[model::Run]) -> Paragraph {
        for run in runs {
            para = match run {
                model::Run::Hyperlink { target, runs } => {
                    let link = runs.iter().fold(
                        Hyperlink::new(target, HyperlinkType::External),
                        |link, r| link.add_run(self.run(r, true)),
                    );
                    para.add_hyperlink(link)
                }
                other => para.add_run(self.run(other, false)),
            };
        }
        para
    }

    fn run(&self, run: &model::Run, in_link: bool) -> Run {
        match run {
            model::Run::Text(t) => {
                let mut r = Run::new().add_text(&t.text);
                if t.bold {
                    r = r.bold();
                }
                if t.italic {
                    r = r.italic();
                }
                if t.monospace {
                    r = r.fonts(self.styles.code_fonts());
                }
                if in_link {
                    r = r.color(&self.styles.link_color).underline("single");
                }
                r
            }
            model::Run::Break => Run::new().add_break(BreakType::TextWrapping),
            model::Run::Image { image } => image_run(image),
            // Nested links are flattened by the model; keep the text if one slips through.
            model::Run::Hyperlink { runs, .. } => {
                Run::new().add_text(model::runs_text(runs))
            }
        }
    }
}

/// `Pic::new` panics on bytes it cannot decode, so those become a marker run.
fn image_run(image: &ImageData) -> Run {
    match image::load_from_memory(&image.bytes) {
        Ok(_) => Run::new().add_image(
            Pic::new(&image.bytes).size(image.width * EMU_PER_PX, image.height * EMU_PER_PX),
        ),
        Err(e) => {
            warn!("Unreadable image data dropped from document: {}", e);
            Run::new().add_text("[Image processing error: unreadable image data]").italic()
        }
    }
}

fn small_centered(text: &str) -> Paragraph {
    Paragraph::new()
        .align(AlignmentType::Center)
        .add_run(Run::new().add_text(text).size(18))
}

/// Pack `doc` as `.docx` with theme-derived styles.
pub fn write_docx(doc: &Document, theme: &Theme, page: &PageText) -> Result<Vec<u8>, NotepressError> {
    DocxWriter::new(theme).write(doc, page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::model::{Run as MRun, TableCell as MCell, TableRow as MRow};
    use crate::theme::DEFAULT_THEME;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn sample() -> Document {
        Document {
            title: Some("Sample".into()),
            blocks: vec![
                Block::Heading {
                    level: 2,
                    runs: vec![MRun::text("Intro")],
                },
                Block::Paragraph {
                    runs: vec![
                        MRun::text("hello "),
                        MRun::hyperlink("https://example.com", vec![MRun::text("link")]),
                        MRun::Break,
                        MRun::italic("after"),
                    ],
                },
                Block::CodeBlock {
                    lines: vec!["let x = 1;".into(), "    indented".into()],
                },
                Block::Blockquote {
                    blocks: vec![Block::Paragraph {
                        runs: vec![MRun::text("quoted")],
                    }],
                },
                Block::Table {
                    rows: vec![
                        MRow {
                            header: true,
                            cells: vec![MCell { runs: vec![MRun::text("k")] }],
                        },
                        MRow {
                            header: false,
                            cells: vec![MCell { runs: vec![MRun::text("v")] }],
                        },
                    ],
                },
                Block::List {
                    ordered: true,
                    items: vec![ListItem {
                        runs: vec![MRun::text("first")],
                        children: vec![Block::List {
                            ordered: false,
                            items: vec![ListItem {
                                runs: vec![MRun::text("nested")],
                                children: vec![],
                            }],
                        }],
                    }],
                },
                Block::Image {
                    image: ImageData {
                        bytes: png(4, 2),
                        width: 4,
                        height: 2,
                    },
                },
                Block::HorizontalRule,
            ],
        }
    }

    #[test]
    fn packs_a_zip_container() {
        let page = PageText {
            header: Some("Head".into()),
            footer: Some("Foot".into()),
        };
        let bytes = write_docx(&sample(), &DEFAULT_THEME, &page).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn text_survives_a_read_back() {
        let doc = Document {
            title: Some("Only Title".into()),
            blocks: vec![Block::Paragraph {
                runs: vec![MRun::text("body text")],
            }],
        };
        let bytes = write_docx(&doc, &DEFAULT_THEME, &PageText::default()).unwrap();
        let json = docx_rs::read_docx(&bytes).unwrap().json();
        assert!(json.contains("body text"));
        assert!(json.contains("Only Title"));
    }

    #[test]
    fn empty_document_still_packs() {
        let bytes = write_docx(&Document::default(), &DEFAULT_THEME, &PageText::default()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn undecodable_image_bytes_become_a_marker() {
        let doc = Document {
            title: None,
            blocks: vec![
                Block::Image {
                    image: ImageData {
                        bytes: vec![1, 2, 3, 4],
                        width: 10,
                        height: 10,
                    },
                },
                Block::Paragraph {
                    runs: vec![MRun::text("after")],
                },
            ],
        };
        let bytes = write_docx(&doc, &DEFAULT_THEME, &PageText::default()).unwrap();
        let json = docx_rs::read_docx(&bytes).unwrap().json();
        assert!(json.contains("unreadable image data"));
        assert!(json.contains("after"));
    }
}
