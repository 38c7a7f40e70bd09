//! Renderer-agnostic document model: blocks made of styled runs.
//!
//! This is what the DOM walker produces and what the `.docx` writer (or
//! `--json`) consumes. Image bytes serialise as base64.

use serde::{Deserialize, Serialize};

/// A whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: Option<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph { runs: Vec<Run> },
    CodeBlock { lines: Vec<String> },
    Blockquote { blocks: Vec<Block> },
    Table { rows: Vec<TableRow> },
    List { ordered: bool, items: Vec<ListItem> },
    Image { image: ImageData },
    HorizontalRule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Contains at least one `<th>`; every cell is bold and shaded.
    pub header: bool,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub runs: Vec<Run>,
}

/// One list item: its own inline content plus any nested blocks (sub-lists,
/// paragraphs of a loose list, code).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub runs: Vec<Run>,
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// Display size in pixels.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Run {
    Text(TextRun),
    Break,
    Image { image: ImageData },
    Hyperlink { target: String, runs: Vec<Run> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Run::Text(TextRun {
            text: text.into(),
            ..TextRun::default()
        })
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Run::Text(TextRun {
            text: text.into(),
            italic: true,
            ..TextRun::default()
        })
    }

    /// Wrap `runs` in a hyperlink. Hyperlinks never nest: an inner link is
    /// replaced by its own runs.
    pub fn hyperlink(target: impl Into<String>, runs: Vec<Run>) -> Self {
        let mut flat = Vec::with_capacity(runs.len());
        flatten_links(runs, &mut flat);
        Run::Hyperlink {
            target: target.into(),
            runs: flat,
        }
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Run::Text(t) => out.push_str(&t.text),
            Run::Break => out.push('\n'),
            Run::Image { .. } => {}
            Run::Hyperlink { runs, .. } => runs.iter().for_each(|r| r.push_text(out)),
        }
    }
}

fn flatten_links(runs: Vec<Run>, out: &mut Vec<Run>) {
    for run in runs {
        match run {
            Run::Hyperlink { runs, .. } => flatten_links(runs, out),
            other => out.push(other),
        }
    }
}

/// Plain text of a run sequence; images contribute nothing.
pub fn runs_text(runs: &[Run]) -> String {
    let mut out = String::new();
    runs.iter().for_each(|r| r.push_text(&mut out));
    out
}

impl Block {
    /// Visible marker paragraph for content that could not be converted.
    pub fn marker(message: impl AsRef<str>) -> Self {
        Block::Paragraph {
            runs: vec![Run::italic(format!("[{}]", message.as_ref()))],
        }
    }

    /// Plain text of the block, for titles, tests and diagnostics.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { runs, .. } | Block::Paragraph { runs } => runs_text(runs),
            Block::CodeBlock { lines } => lines.join("\n"),
            Block::Blockquote { blocks } => blocks
                .iter()
                .map(Block::plain_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Table { rows } => rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(|c| runs_text(&c.runs))
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::List { items, .. } => items
                .iter()
                .map(|item| {
                    let mut text = runs_text(&item.runs);
                    for child in &item.children {
                        text.push('\n');
                        text.push_str(&child.plain_text());
                    }
                    text
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Image { .. } | Block::HorizontalRule => String::new(),
        }
    }
}

impl Document {
    /// Number of image blocks and image runs, at any depth.
    pub fn image_count(&self) -> usize {
        fn in_runs(runs: &[Run]) -> usize {
            runs.iter()
                .map(|r| match r {
                    Run::Image { .. } => 1,
                    Run::Hyperlink { runs, .. } => in_runs(runs),
                    _ => 0,
                })
                .sum()
        }
        fn in_blocks(blocks: &[Block]) -> usize {
            blocks
                .iter()
                .map(|b| match b {
                    Block::Image { .. } => 1,
                    Block::Heading { runs, .. } | Block::Paragraph { runs } => in_runs(runs),
                    Block::Blockquote { blocks } => in_blocks(blocks),
                    Block::Table { rows } => rows
                        .iter()
                        .flat_map(|r| &r.cells)
                        .map(|c| in_runs(&c.runs))
                        .sum(),
                    Block::List { items, .. } => items
                        .iter()
                        .map(|i| in_runs(&i.runs) + in_blocks(&i.children))
                        .sum(),
                    Block::CodeBlock { .. } | Block::HorizontalRule => 0,
                })
                .sum()
        }
        in_blocks(&self.blocks)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperlinks_never_nest() {
        let inner = Run::hyperlink("b", vec![Run::text("x")]);
        let outer = Run::hyperlink("a", vec![Run::text("pre "), inner]);
        match outer {
            Run::Hyperlink { target, runs } => {
                assert_eq!(target, "a");
                assert!(runs.iter().all(|r| !matches!(r, Run::Hyperlink { .. })));
                assert_eq!(runs_text(&runs), "pre x");
            }
            other => panic!("expected hyperlink, got {other:?}"),
        }
    }

    #[test]
    fn image_bytes_serialize_as_base64() {
        let block = Block::Image {
            image: ImageData {
                bytes: vec![1, 2, 3],
                width: 10,
                height: 5,
            },
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["image"]["bytes"], "AQID");
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn marker_is_italic_and_bracketed() {
        let b = Block::marker("Image not found: x.png");
        assert_eq!(b.plain_text(), "[Image not found: x.png]");
        match b {
            Block::Paragraph { runs } => assert!(matches!(&runs[0], Run::Text(t) if t.italic)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn image_count_descends_into_containers() {
        let img = ImageData {
            bytes: vec![],
            width: 1,
            height: 1,
        };
        let doc = Document {
            title: None,
            blocks: vec![
                Block::Image { image: img.clone() },
                Block::List {
                    ordered: false,
                    items: vec![ListItem {
                        runs: vec![Run::Image { image: img.clone() }],
                        children: vec![Block::Blockquote {
                            blocks: vec![Block::Image { image: img }],
                        }],
                    }],
                },
            ],
        };
        assert_eq!(doc.image_count(), 3);
    }
}
