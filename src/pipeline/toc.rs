//! Table of contents built from the headings of cleaned HTML.

use crate::theme::Theme;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Longest id a heading can get, in characters.
pub const MAX_ID_LEN: usize = 50;

/// Indent per level below the shallowest heading, in pixels.
pub const INDENT_STEP: u32 = 20;

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h([1-6])((?:\s[^>]*)?)>(.*?)</h[1-6]>").unwrap());

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

static RE_ID_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\s+id="[^"]*""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    /// Heading text with markup removed (entities are left escaped).
    pub text: String,
    pub id: String,
}

/// Flat outline of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    pub entries: Vec<TocEntry>,
}

impl Toc {
    /// Shallowest level present; the zero-indent baseline.
    pub fn base_level(&self) -> u8 {
        self.entries.iter().map(|e| e.level).min().unwrap_or(1)
    }

    pub fn indent(&self, entry: &TocEntry) -> u32 {
        u32::from(entry.level.saturating_sub(self.base_level())) * INDENT_STEP
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn heading_text(inner: &str) -> String {
    RE_TAG.replace_all(inner, "").trim().to_string()
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `toc-{n}-{slug}`, cut to [`MAX_ID_LEN`] characters.
fn heading_id(n: usize, text: &str) -> String {
    let slug = slugify(text);
    let id = if slug.is_empty() {
        format!("toc-{n}")
    } else {
        format!("toc-{n}-{slug}")
    };
    let cut: String = id.chars().take(MAX_ID_LEN).collect();
    cut.trim_end_matches('-').to_string()
}

/// Collect one entry per non-empty heading, in document order.
pub fn collect_entries(html: &str) -> Toc {
    let entries = RE_HEADING
        .captures_iter(html)
        .filter_map(|caps| {
            let level: u8 = caps[1].parse().ok()?;
            let text = heading_text(&caps[3]);
            (!text.is_empty()).then_some((level, text))
        })
        .enumerate()
        .map(|(i, (level, text))| TocEntry {
            id: heading_id(i + 1, &text),
            level,
            text,
        })
        .collect();
    Toc { entries }
}

/// Put each entry's id on its heading; the Nth non-empty heading gets the Nth id.
fn inject_ids(html: &str, toc: &Toc) -> String {
    let mut ids = toc.entries.iter().map(|e| e.id.as_str());
    RE_HEADING
        .replace_all(html, |caps: &Captures<'_>| {
            if heading_text(&caps[3]).is_empty() {
                return caps[0].to_string();
            }
            match ids.next() {
                Some(id) => {
                    let attrs = RE_ID_ATTR.replace_all(&caps[2], "");
                    format!("<h{0}{attrs} id=\"{id}\">{1}</h{0}>", &caps[1], &caps[3])
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Render the outline as a `<nav>` block.
pub fn render_toc(toc: &Toc, theme: &Theme) -> String {
    let mut out = format!(
        "<nav style=\"border:1px solid {};border-radius:4px;padding:0.75em 1em;margin:1em 0;\">\n\
         <p style=\"margin:0 0 0.5em 0;font-weight:bold;\">Contents</p>\n\
         <ul style=\"list-style:none;padding-left:0;margin:0;\">\n",
        theme.border_color
    );
    for entry in &toc.entries {
        out.push_str(&format!(
            "<li style=\"margin-left:{}px;\"><a href=\"#{}\" style=\"color:{};\">{}</a></li>\n",
            toc.indent(entry),
            entry.id,
            theme.link_color,
            entry.text
        ));
    }
    out.push_str("</ul>\n</nav>\n");
    out
}

/// Inject heading ids and insert the rendered outline after the first
/// `<h1>`, or at the top when there is none.
///
/// With no non-empty headings the input comes back unchanged.
pub fn build_toc(html: &str, theme: &Theme) -> (String, Toc) {
    let toc = collect_entries(html);
    if toc.is_empty() {
        return (html.to_string(), toc);
    }

    let with_ids = inject_ids(html, &toc);
    let nav = render_toc(&toc, theme);
    let out = match with_ids.find("</h1>") {
        Some(pos) => {
            let at = pos + "</h1>".len();
            format!("{}\n{}{}", &with_ids[..at], nav, &with_ids[at..])
        }
        None => format!("{nav}{with_ids}"),
    };
    (out, toc)
}
