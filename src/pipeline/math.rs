//! LaTeX math extraction and restoration.
//!
//! `$$…$$` (display, may span lines) is taken out first so its inner dollar
//! signs are never seen by the inline scanner. Inline `$…$` must hug its
//! content: the opening `$` is not preceded by `$` and not followed by `$` or
//! whitespace, the closing `$` is not preceded by whitespace and not followed
//! by `$`, and the content stays on one line. That rejects prices such as
//! "costs $5 or $10".
//!
//! After rendering, each placeholder becomes escaped LaTeX wrapped in `\(…\)`
//! or `\[…\]`, delimiters that equation renderers recognise and that cannot be
//! confused with currency.

use super::placeholder::{
    extract, restore, Extraction, PlaceholderCounter, PlaceholderKind, SpanMatcher, PLACEHOLDER_PREFIX,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static RE_DISPLAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());

/// One extracted formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathExtraction {
    pub base: Extraction,
    pub is_display: bool,
    /// Delimiter-stripped, trimmed source.
    pub latex: String,
}

impl AsRef<Extraction> for MathExtraction {
    fn as_ref(&self) -> &Extraction {
        &self.base
    }
}

/// Scanner for single-dollar inline math.
///
/// The `regex` crate has no look-around, so the neighbour checks are done by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineMathMatcher;

impl SpanMatcher for InlineMathMatcher {
    fn next_span(&self, text: &str, from: usize) -> Option<Range<usize>> {
        let bytes = text.as_bytes();
        let mut open = from;
        while let Some(rel) = text.get(open..)?.find('$') {
            let i = open + rel;
            open = i + 1;

            if i > 0 && bytes[i - 1] == b'$' {
                continue;
            }
            match text[i + 1..].chars().next() {
                Some(c) if c != '$' && !c.is_whitespace() => {}
                _ => continue,
            }
            // The closing candidate is the first `$` after the opener on the same line.
            let rest = &text[i + 1..];
            let line_end = rest.find('\n').unwrap_or(rest.len());
            let Some(close_rel) = rest[..line_end].find('$') else {
                continue;
            };
            let close = i + 1 + close_rel;
            let content = &text[i + 1..close];
            let before_close_ws = content.chars().next_back().is_some_and(char::is_whitespace);
            let after_close_dollar = bytes.get(close + 1) == Some(&b'$');
            if content.is_empty() || before_close_ws || after_close_dollar {
                continue;
            }
            return Some(i..close + 1);
        }
        None
    }
}

/// Extract display math, then inline math. Records come back display first.
pub fn extract_math(text: &str, counter: &mut PlaceholderCounter) -> (String, Vec<MathExtraction>) {
    let (text, display) = extract(text, &*RE_DISPLAY, PlaceholderKind::Math, counter);
    let (text, inline) = extract(&text, &InlineMathMatcher, PlaceholderKind::Math, counter);

    let records = display
        .into_iter()
        .map(|base| MathExtraction {
            latex: strip_delimiters(&base.original, "$$"),
            base,
            is_display: true,
        })
        .chain(inline.into_iter().map(|base| MathExtraction {
            latex: strip_delimiters(&base.original, "$"),
            base,
            is_display: false,
        }))
        .collect();
    (text, records)
}

/// Expand code placeholders the inline scanner captured inside a formula,
/// e.g. ``$f(`n`)$``, so the restored LaTeX matches the note.
pub fn restore_nested_code(records: &mut [MathExtraction], code: &[Extraction]) {
    for record in records {
        if record.latex.contains(PLACEHOLDER_PREFIX) {
            record.latex = restore(&record.latex, code);
        }
    }
}

fn strip_delimiters(original: &str, delim: &str) -> String {
    original
        .strip_prefix(delim)
        .and_then(|s| s.strip_suffix(delim))
        .unwrap_or(original)
        .trim()
        .to_string()
}

/// Escape text for inclusion in HTML content or a double-quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The delimited, escaped form a formula takes in the final HTML.
pub fn delimited(record: &MathExtraction) -> String {
    let latex = escape_html(&record.latex);
    if record.is_display {
        format!("\\[{latex}\\]")
    } else {
        format!("\\({latex}\\)")
    }
}

/// Replace math placeholders in rendered HTML with delimited LaTeX.
///
/// Applied in reverse creation order like every other restore.
pub fn restore_math(html: &str, records: &[MathExtraction]) -> String {
    let mut out = html.to_string();
    for record in records.iter().rev() {
        if out.contains(&record.base.placeholder) {
            out = out.replace(&record.base.placeholder, &delimited(record));
        }
    }
    out
}
