//! Leading metadata block removal.
//!
//! A note may open with a YAML block fenced by `---` lines. It is metadata,
//! not content, so it is dropped before anything else runs. The `title:` key
//! is kept aside as a candidate document title.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_FRONTMATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\x{FEFF}?---[ \t]*\r?\n(?:(.*?)\r?\n)??---[ \t]*(?:\r?\n|\z)").unwrap()
});

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^title[ \t]*:[ \t]*(.*?)[ \t]*$").unwrap());

/// Result of stripping frontmatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped<'a> {
    /// The note body with the metadata block removed.
    pub body: &'a str,
    /// `title:` value from the metadata block, unquoted.
    pub title: Option<String>,
}

/// Remove a leading `---` … `---` block, if present.
pub fn strip_frontmatter(text: &str) -> Stripped<'_> {
    let Some(caps) = RE_FRONTMATTER.captures(text) else {
        return Stripped {
            body: text,
            title: None,
        };
    };
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let yaml = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    Stripped {
        body: &text[end..],
        title: parse_title(yaml),
    }
}

fn parse_title(yaml: &str) -> Option<String> {
    let raw = RE_TITLE.captures(yaml)?.get(1)?.as_str().trim();
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw)
        .trim();
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_block() {
        let s = strip_frontmatter("---\ntags: [a]\n---\n# Body\n");
        assert_eq!(s.body, "# Body\n");
        assert_eq!(s.title, None);
    }

    #[test]
    fn extracts_quoted_title() {
        let s = strip_frontmatter("---\ntitle: \"Weekly Review\"\ndate: 2024-01-01\n---\ntext");
        assert_eq!(s.title.as_deref(), Some("Weekly Review"));
        assert_eq!(s.body, "text");
    }

    #[test]
    fn no_frontmatter_is_identity() {
        let text = "# Heading\n\n---\nnot: metadata\n---\n";
        let s = strip_frontmatter(text);
        assert_eq!(s.body, text);
        assert!(s.title.is_none());
    }

    #[test]
    fn empty_block_and_crlf() {
        assert_eq!(strip_frontmatter("---\r\n---\r\nbody").body, "body");
    }

    #[test]
    fn block_at_end_of_file() {
        let s = strip_frontmatter("---\ntitle: Only\n---");
        assert_eq!(s.body, "");
        assert_eq!(s.title.as_deref(), Some("Only"));
    }
}
