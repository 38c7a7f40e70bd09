//! Paragraph/character styles and list numbering for the `.docx` writer.
//!
//! Styles are derived from the export [`Theme`] so an HTML export and a DOCX
//! export of the same note share colours and typefaces. CSS font stacks are
//! reduced to the first family a word processor can actually use.

use crate::theme::Theme;
use docx_rs::{
    AbstractNumbering, AlignmentType, Docx, Level, LevelJc, LevelText, NumberFormat, Numbering,
    RunFonts, SpecialIndentType, Start, Style, StyleType,
};

pub const TITLE: &str = "Title";
pub const CODE_BLOCK: &str = "CodeBlock";
pub const BLOCKQUOTE: &str = "Blockquote";
pub const HORIZONTAL_LINE: &str = "HorizontalLine";

/// Number of levels defined per list.
pub const LIST_LEVELS: usize = 9;

/// Indent per quote or list level, in twips.
pub const INDENT_STEP: i32 = 720;

const FALLBACK_BODY_FONT: &str = "Calibri";
const FALLBACK_CODE_FONT: &str = "Courier New";

/// CSS generic families and browser-only aliases with no meaning in Word.
const NON_FONTS: &[&str] = &[
    "serif", "sans-serif", "monospace", "cursive", "fantasy", "system-ui", "ui-monospace",
    "ui-serif", "ui-sans-serif", "blinkmacsystemfont",
];

/// First usable family in a CSS `font-family` stack.
pub fn first_font(stack: &str) -> Option<String> {
    stack
        .split(',')
        .map(|f| f.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .find(|f| !f.is_empty() && !f.starts_with('-') && !NON_FONTS.contains(&f.to_ascii_lowercase().as_str()))
        .map(str::to_string)
}

/// `#rrggbb` → `RRGGBB`; anything else is rejected.
pub fn hex_color(css: &str) -> Option<String> {
    let hex = css.trim().strip_prefix('#')?;
    match hex.len() {
        6 if hex.chars().all(|c| c.is_ascii_hexdigit()) => Some(hex.to_ascii_uppercase()),
        3 if hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            Some(hex.chars().flat_map(|c| [c, c]).collect::<String>().to_ascii_uppercase())
        }
        _ => None,
    }
}

/// CSS pixel size → Word half-points (1px = 0.75pt).
fn half_points(css_px: &str) -> Option<usize> {
    let px: f32 = css_px.trim().trim_end_matches("px").parse().ok()?;
    (px > 0.0).then(|| (px * 1.5).round() as usize)
}

fn fonts(name: &str) -> RunFonts {
    RunFonts::new().ascii(name).hi_ansi(name).east_asia(name).cs(name)
}

/// Theme values translated into Word terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxStyles {
    pub body_font: String,
    pub code_font: String,
    /// Body size in half-points.
    pub body_size: usize,
    pub text_color: String,
    pub heading_color: String,
    pub link_color: String,
    pub code_background: String,
    pub quote_color: String,
    pub rule_color: String,
    pub header_fill: String,
}

impl DocxStyles {
    pub fn from_theme(theme: &Theme) -> Self {
        Self {
            body_font: first_font(theme.font_family).unwrap_or_else(|| FALLBACK_BODY_FONT.into()),
            code_font: first_font(theme.code_font_family).unwrap_or_else(|| FALLBACK_CODE_FONT.into()),
            body_size: half_points(theme.font_size).unwrap_or(22),
            text_color: hex_color(theme.text_color).unwrap_or_else(|| "000000".into()),
            heading_color: hex_color(theme.heading_color).unwrap_or_else(|| "000000".into()),
            link_color: hex_color(theme.link_color).unwrap_or_else(|| "0563C1".into()),
            code_background: hex_color(theme.code_background).unwrap_or_else(|| "F5F5F5".into()),
            quote_color: hex_color(theme.blockquote_color).unwrap_or_else(|| "555555".into()),
            rule_color: hex_color(theme.border_color).unwrap_or_else(|| "DDDDDD".into()),
            header_fill: hex_color(theme.table_header_background).unwrap_or_else(|| "D9D9D9".into()),
        }
    }

    pub fn code_fonts(&self) -> RunFonts {
        fonts(&self.code_font)
    }

    fn heading(&self, level: usize, size: usize) -> Style {
        Style::new(&format!("Heading{level}"), StyleType::Paragraph)
            .name(&format!("Heading {level}"))
            .size(size)
            .bold()
            .color(&self.heading_color)
    }

    /// Install document defaults and every named style.
    pub fn apply(&self, docx: Docx) -> Docx {
        let docx = docx
            .default_fonts(fonts(&self.body_font))
            .default_size(self.body_size);

        let title = Style::new(TITLE, StyleType::Paragraph)
            .name("Title")
            .size(self.body_size * 2)
            .bold()
            .color(&self.heading_color);

        let code_block = Style::new(CODE_BLOCK, StyleType::Paragraph)
            .name("Code Block")
            .fonts(self.code_fonts())
            .size(self.body_size.saturating_sub(4).max(16));

        let blockquote = Style::new(BLOCKQUOTE, StyleType::Paragraph)
            .name("Block Quote")
            .indent(Some(INDENT_STEP), None, None, None)
            .italic()
            .color(&self.quote_color);

        let rule = Style::new(HORIZONTAL_LINE, StyleType::Paragraph)
            .name("Horizontal Line")
            .align(AlignmentType::Center)
            .color(&self.rule_color);

        let sizes = [2.0, 1.6, 1.35, 1.15, 1.0, 0.9];
        let mut docx = docx;
        for (i, factor) in sizes.iter().enumerate() {
            let size = (self.body_size as f32 * factor).round() as usize;
            docx = docx.add_style(self.heading(i + 1, size));
        }
        docx.add_style(title)
            .add_style(code_block)
            .add_style(blockquote)
            .add_style(rule)
    }
}

/// Hands out one numbering definition per list so ordered lists restart at 1.
#[derive(Debug, Clone)]
pub struct DocxNumbering {
    next_id: usize,
}

impl Default for DocxNumbering {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxNumbering {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    fn level(lvl: usize, format: &str, text: &str, bullet: bool) -> Level {
        let left = INDENT_STEP * (lvl as i32 + 1);
        let hanging = if bullet { 360 } else { 420 };
        Level::new(
            lvl,
            Start::new(1),
            NumberFormat::new(format),
            LevelText::new(text),
            LevelJc::new("left"),
        )
        .indent(Some(left), Some(SpecialIndentType::Hanging(hanging)), None, None)
    }

    /// Register a new list definition and return its numbering id.
    pub fn add_list(&mut self, docx: Docx, ordered: bool) -> (Docx, usize) {
        let id = self.next_id;
        self.next_id += 1;

        let mut abstract_num = AbstractNumbering::new(id);
        for lvl in 0..LIST_LEVELS {
            let level = if ordered {
                let format = match lvl % 3 {
                    0 => "decimal",
                    1 => "lowerLetter",
                    _ => "lowerRoman",
                };
                Self::level(lvl, format, &format!("%{}.", lvl + 1), false)
            } else {
                let bullet = match lvl % 3 {
                    0 => "•",
                    1 => "○",
                    _ => "▪",
                };
                Self::level(lvl, "bullet", bullet, true)
            };
            abstract_num = abstract_num.add_level(level);
        }

        let docx = docx
            .add_abstract_numbering(abstract_num)
            .add_numbering(Numbering::new(id, id));
        (docx, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{lookup_theme, DEFAULT_THEME};

    #[test]
    fn font_stacks_reduce_to_a_real_family() {
        assert_eq!(first_font(DEFAULT_THEME.font_family).as_deref(), Some("Segoe UI"));
        assert_eq!(first_font("ui-monospace, 'SF Mono', monospace").as_deref(), Some("SF Mono"));
        assert_eq!(first_font("serif"), None);
    }

    #[test]
    fn colors_and_sizes() {
        assert_eq!(hex_color("#0969da").as_deref(), Some("0969DA"));
        assert_eq!(hex_color("#abc").as_deref(), Some("AABBCC"));
        assert_eq!(hex_color("red"), None);
        assert_eq!(half_points("16px"), Some(24));
        assert_eq!(half_points("large"), None);
    }

    #[test]
    fn every_theme_maps_cleanly() {
        for name in crate::theme::theme_names() {
            let styles = DocxStyles::from_theme(lookup_theme(name));
            assert_eq!(styles.header_fill.len(), 6, "{name}");
            assert!(styles.body_size >= 16, "{name}");
        }
    }

    #[test]
    fn each_list_gets_its_own_id() {
        let mut numbering = DocxNumbering::new();
        let (docx, a) = numbering.add_list(Docx::new(), true);
        let (_, b) = numbering.add_list(docx, false);
        assert_ne!(a, b);
    }
}
