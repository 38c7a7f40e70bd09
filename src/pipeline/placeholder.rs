//! Reversible placeholder substitution shared by every extraction stage.
//!
//! The Markdown renderer has no hook for "leave this span alone", so spans it
//! would mangle (code, LaTeX, image embeds) are swapped for inert tokens
//! before rendering and swapped back afterwards. A token looks like
//! `NPXQZ` + kind + index + `ZQ`, e.g. `NPXQZMATH3ZQ`:
//!
//! * the fixed prefix makes an accidental collision with prose implausible;
//! * the index comes from a [`PlaceholderCounter`] owned by a single export
//!   pass, so tokens are unique within the pass and nothing is shared
//!   between concurrent exports;
//! * the closing `ZQ` keeps `…IMG1ZQ` from being a prefix of `…IMG12ZQ`;
//! * the token is purely alphanumeric, so no renderer treats it as syntax.

use regex::Regex;
use std::ops::Range;

pub const PLACEHOLDER_PREFIX: &str = "NPXQZ";
pub const PLACEHOLDER_SUFFIX: &str = "ZQ";

/// The closed set of things the pipeline extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    Code,
    Math,
    Image,
}

impl PlaceholderKind {
    fn tag(self) -> &'static str {
        match self {
            PlaceholderKind::Code => "CODE",
            PlaceholderKind::Math => "MATH",
            PlaceholderKind::Image => "IMG",
        }
    }
}

/// A placeholder and the exact text it stands in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub placeholder: String,
    pub original: String,
}

impl AsRef<Extraction> for Extraction {
    fn as_ref(&self) -> &Extraction {
        self
    }
}

/// Monotonic index source for one export pass.
#[derive(Debug, Default)]
pub struct PlaceholderCounter {
    next: usize,
}

impl PlaceholderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next placeholder of `kind`.
    pub fn next(&mut self, kind: PlaceholderKind) -> String {
        let index = self.next;
        self.next += 1;
        format!("{PLACEHOLDER_PREFIX}{}{index}{PLACEHOLDER_SUFFIX}", kind.tag())
    }

    /// Number of placeholders minted so far.
    pub fn issued(&self) -> usize {
        self.next
    }
}

/// Finds the next span to extract at or after a byte offset.
pub trait SpanMatcher {
    fn next_span(&self, text: &str, from: usize) -> Option<Range<usize>>;
}

impl SpanMatcher for Regex {
    fn next_span(&self, text: &str, from: usize) -> Option<Range<usize>> {
        self.find_at(text, from).map(|m| m.range())
    }
}

/// Replace every non-overlapping span found by `matcher`, left to right, with
/// a fresh placeholder.
///
/// Returns the rewritten text and one record per replaced span, in creation order.
pub fn extract<M: SpanMatcher + ?Sized>(
    text: &str,
    matcher: &M,
    kind: PlaceholderKind,
    counter: &mut PlaceholderCounter,
) -> (String, Vec<Extraction>) {
    let mut out = String::with_capacity(text.len());
    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor <= text.len() {
        let Some(span) = matcher.next_span(text, cursor) else {
            break;
        };
        if span.is_empty() {
            // Zero-width match: step over one char so the scan always advances.
            let step = text[span.start..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            out.push_str(&text[cursor..(span.start + step).min(text.len())]);
            cursor = span.start + step;
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        let placeholder = counter.next(kind);
        out.push_str(&placeholder);
        records.push(Extraction {
            placeholder,
            original: text[span.clone()].to_string(),
        });
        cursor = span.end;
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }

    (out, records)
}

/// Put every original back in place of its placeholder.
///
/// Records are applied in reverse creation order: a later record's original
/// may itself contain an earlier placeholder (an image embed inside a restored
/// code block), and must be expanded before that earlier token is looked up.
/// Substitution is literal.
pub fn restore<T: AsRef<Extraction>>(text: &str, records: &[T]) -> String {
    let mut out = text.to_string();
    for record in records.iter().rev() {
        let record = record.as_ref();
        if out.contains(&record.placeholder) {
            out = out.replace(&record.placeholder, &record.original);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Regex {
        Regex::new(r"\d+").unwrap()
    }

    #[test]
    fn placeholders_are_unique_and_alphanumeric() {
        let mut c = PlaceholderCounter::new();
        let a = c.next(PlaceholderKind::Math);
        let b = c.next(PlaceholderKind::Math);
        assert_ne!(a, b);
        assert_eq!(a, "NPXQZMATH0ZQ");
        assert!(b.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_eq!(c.issued(), 2);
    }

    #[test]
    fn low_index_is_not_prefix_of_high_index() {
        let mut c = PlaceholderCounter::new();
        let tokens: Vec<_> = (0..12).map(|_| c.next(PlaceholderKind::Image)).collect();
        assert!(!tokens[11].contains(&tokens[1]));
    }

    #[test]
    fn extract_replaces_left_to_right() {
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract("a 12 b 345", &digits(), PlaceholderKind::Code, &mut c);
        assert_eq!(out, "a NPXQZCODE0ZQ b NPXQZCODE1ZQ");
        assert_eq!(recs[0].original, "12");
        assert_eq!(recs[1].original, "345");
    }

    #[test]
    fn round_trip_is_identity() {
        let inputs = ["", "no digits", "1", "x1y22z333", "ünï 42 cödé"];
        for text in inputs {
            let mut c = PlaceholderCounter::new();
            let (out, recs) = extract(text, &digits(), PlaceholderKind::Code, &mut c);
            assert_eq!(restore(&out, &recs), text, "input: {text:?}");
        }
    }

    #[test]
    fn restore_handles_nested_placeholders_in_reverse() {
        // The second record's original contains the first record's placeholder.
        let recs = vec![
            Extraction {
                placeholder: "NPXQZIMG0ZQ".into(),
                original: "![[pic.png]]".into(),
            },
            Extraction {
                placeholder: "NPXQZCODE1ZQ".into(),
                original: "`NPXQZIMG0ZQ`".into(),
            },
        ];
        assert_eq!(restore("see NPXQZCODE1ZQ", &recs), "see `![[pic.png]]`");
    }

    #[test]
    fn restore_is_literal() {
        let recs = vec![Extraction {
            placeholder: "NPXQZMATH0ZQ".into(),
            original: "$1 and $$".into(),
        }];
        assert_eq!(restore("x NPXQZMATH0ZQ", &recs), "x $1 and $$");
    }

    #[test]
    fn zero_width_matches_do_not_loop() {
        let re = Regex::new(r"x*").unwrap();
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract("abxxc", &re, PlaceholderKind::Code, &mut c);
        assert_eq!(recs.len(), 1);
        assert_eq!(restore(&out, &recs), "abxxc");
    }
}
