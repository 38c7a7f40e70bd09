//! Code span protection.
//!
//! Runs before the math and image extractors so that `$x$`, `![alt](p)` or
//! `![[pic]]` written inside a code sample stays literal. Code is restored
//! right before rendering: the renderer must see real fences to produce
//! `<pre><code>` blocks.

use super::placeholder::{extract, Extraction, PlaceholderCounter, PlaceholderKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced blocks (may span lines, shortest match to the next fence) first,
/// then single-line inline spans with non-empty content.
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```|`[^`\n]+`").unwrap());

/// Swap every fenced block and inline code span for a placeholder.
pub fn extract_code(text: &str, counter: &mut PlaceholderCounter) -> (String, Vec<Extraction>) {
    extract(text, &*RE_CODE, PlaceholderKind::Code, counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::placeholder::restore;

    #[test]
    fn fenced_block_spanning_lines() {
        let text = "before\n```rust\nlet x = $a$;\n```\nafter";
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract_code(text, &mut c);
        assert_eq!(recs.len(), 1);
        assert_eq!(out, "before\nNPXQZCODE0ZQ\nafter");
        assert!(recs[0].original.contains("let x = $a$;"));
    }

    #[test]
    fn fence_is_non_greedy() {
        let text = "```\na\n```\nmid\n```\nb\n```";
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract_code(text, &mut c);
        assert_eq!(recs.len(), 2);
        assert!(out.contains("mid"));
    }

    #[test]
    fn inline_span_must_be_single_line_and_non_empty() {
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract_code("empty `` then\n`x\ny` split", &mut c);
        assert!(recs.is_empty());
        assert_eq!(out, "empty `` then\n`x\ny` split");
    }

    #[test]
    fn inline_span_with_spaces_is_taken() {
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract_code("a `` b ` c", &mut c);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].original, "` b `");
        assert_eq!(out, "a `NPXQZCODE0ZQ c");

        let (_, recs) = extract_code("use `![[pic.png]]` here", &mut c);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].original, "`![[pic.png]]`");
    }

    #[test]
    fn round_trip() {
        let text = "x `a` y\n```\n$$z$$\n```\n`b`";
        let mut c = PlaceholderCounter::new();
        let (out, recs) = extract_code(text, &mut c);
        assert_eq!(restore(&out, &recs), text);
    }
}
