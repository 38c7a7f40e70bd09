//! Post-render cleanup: make the renderer's HTML portable.
//!
//! The exported HTML is pasted into mail clients, CMS editors and word
//! processors that ignore stylesheets and know nothing about vault classes.
//! These rules turn class-driven markup into self-contained markup with
//! inline styles taken from the active [`Theme`].
//!
//! ## Rule Order
//!
//! Class-driven rules (callouts, alerts, internal links, math containers)
//! must run before rule 10 strips every `class` attribute. Styling rules only
//! match tags that are still unstyled, so a second pass over cleaned output
//! finds nothing to do.

use crate::theme::Theme;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Apply all cleanup rules in order.
///
/// 1. Vault callouts → bordered block with a bold title
/// 2. GFM alerts (`markdown-alert-*` blockquotes) → same treatment
/// 3. Internal cross-note links → `<em>`
/// 4. Strip leftover renderer math containers
/// 5. Style code blocks and inline code
/// 6. Style blockquotes
/// 7. Style tables and cells (keeping column alignment)
/// 8. Style links and headings
/// 9. Remove empty paragraphs
/// 10. Strip `class` and `data-*` attributes
pub fn clean_html(html: &str, theme: &Theme) -> String {
    let s = restructure_callouts(html);
    let s = restructure_alerts(&s);
    let s = flatten_internal_links(&s);
    let s = strip_math_containers(&s);
    let s = style_code(&s, theme);
    let s = style_blockquotes(&s, theme);
    let s = style_tables(&s, theme);
    let s = style_links_and_headings(&s, theme);
    let s = remove_empty_paragraphs(&s);
    strip_class_and_data_attributes(&s)
}

// ── Callout colours ──────────────────────────────────────────────────────────

const DEFAULT_CALLOUT_COLOR: &str = "#448aff";

/// Accent colour for a callout type; unknown types get the note colour.
pub fn callout_color(kind: &str) -> &'static str {
    match kind.to_ascii_lowercase().as_str() {
        "note" => "#448aff",
        "abstract" | "summary" | "tldr" => "#00b0ff",
        "info" | "todo" => "#00b8d4",
        "tip" | "hint" | "important" => "#00bfa5",
        "success" | "check" | "done" => "#00c853",
        "question" | "help" | "faq" => "#64dd17",
        "warning" | "caution" | "attention" => "#ff9100",
        "failure" | "fail" | "missing" => "#ff5252",
        "danger" | "error" => "#ff1744",
        "bug" => "#f50057",
        "example" => "#7c4dff",
        "quote" | "cite" => "#9e9e9e",
        _ => DEFAULT_CALLOUT_COLOR,
    }
}

fn callout_open(kind: &str, title: &str, tag: &str) -> String {
    let color = callout_color(kind);
    let title = if title.trim().is_empty() {
        capitalize(kind)
    } else {
        title.trim().to_string()
    };
    format!(
        "<{tag} style=\"border-left:4px solid {color};background:{color}14;padding:0.75em 1em;margin:1em 0;border-radius:4px;\">\
         <p style=\"margin:0 0 0.5em 0;font-weight:bold;color:{color};\">{title}</p>"
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Rule 1: Vault callouts ───────────────────────────────────────────────────

static RE_CALLOUT_ICON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<div[^>]*class="callout-icon"[^>]*>.*?</div>"#).unwrap());

static RE_CALLOUT_FOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<div[^>]*class="callout-fold[^"]*"[^>]*>.*?</div>"#).unwrap());

static RE_CALLOUT_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<div[^>]*\bdata-callout="([^"]*)"[^>]*>\s*(?:<div[^>]*class="callout-title"[^>]*>\s*(?:<div[^>]*class="callout-title-inner"[^>]*>(.*?)</div>)?\s*</div>)?"#,
    )
    .unwrap()
});

fn restructure_callouts(input: &str) -> String {
    if !input.contains("data-callout=") {
        return input.to_string();
    }
    let s = RE_CALLOUT_ICON.replace_all(input, "");
    let s = RE_CALLOUT_FOLD.replace_all(&s, "");
    RE_CALLOUT_OPEN
        .replace_all(&s, |caps: &Captures<'_>| {
            let kind = caps.get(1).map(|m| m.as_str()).unwrap_or("note");
            let title = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            callout_open(kind, title, "div")
        })
        .into_owned()
}

// ── Rule 2: GFM alerts ───────────────────────────────────────────────────────

static RE_ALERT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<blockquote class="markdown-alert-([a-zA-Z]+)">"#).unwrap());

fn restructure_alerts(input: &str) -> String {
    RE_ALERT_OPEN
        .replace_all(input, |caps: &Captures<'_>| callout_open(&caps[1], "", "blockquote"))
        .into_owned()
}

// ── Rule 3: Internal links ───────────────────────────────────────────────────

static RE_INTERNAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\s[^>]*class="[^"]*\binternal-link\b[^"]*"[^>]*>(.*?)</a>"#).unwrap()
});

fn flatten_internal_links(input: &str) -> String {
    RE_INTERNAL_LINK.replace_all(input, "<em>$1</em>").into_owned()
}

// ── Rule 4: Math containers ──────────────────────────────────────────────────

static RE_MJX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<mjx-container[^>]*>.*?</mjx-container>").unwrap());

static RE_MATH_WRAPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<(span|div)[^>]*class="math(?:\s[^"]*)?"[^>]*>.*?</(?:span|div)>"#).unwrap()
});

fn strip_math_containers(input: &str) -> String {
    let s = RE_MJX.replace_all(input, "");
    RE_MATH_WRAPPER.replace_all(&s, "").into_owned()
}

// ── Rule 5: Code ─────────────────────────────────────────────────────────────

static RE_PRE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<pre(?:\s+class="[^"]*")?>(\s*)<code(?:\s+class="[^"]*")?>"#).unwrap());

static RE_PRE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<pre(?:\s+class="[^"]*")?>"#).unwrap());

static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<code(?:\s+class="[^"]*")?>"#).unwrap());

fn pre_style(theme: &Theme) -> String {
    format!(
        "background:{};border:1px solid {};border-radius:4px;padding:12px 16px;overflow-x:auto;line-height:1.45;",
        theme.code_background, theme.border_color
    )
}

fn style_code(input: &str, theme: &Theme) -> String {
    let pre = pre_style(theme);
    let block_code = format!(
        "font-family:{};font-size:0.9em;color:inherit;background:none;",
        theme.code_font_family
    );
    let s = RE_PRE_CODE.replace_all(input, |caps: &Captures<'_>| {
        format!(
            "<pre style=\"{pre}\">{}<code style=\"{block_code}\">",
            &caps[1]
        )
    });
    let s = RE_PRE.replace_all(&s, |_: &Captures<'_>| format!("<pre style=\"{pre}\">"));
    let inline = format!(
        "font-family:{};font-size:0.9em;color:{};background:{};padding:0.15em 0.35em;border-radius:3px;",
        theme.code_font_family, theme.code_color, theme.code_background
    );
    RE_INLINE_CODE
        .replace_all(&s, |_: &Captures<'_>| format!("<code style=\"{inline}\">"))
        .into_owned()
}

// ── Rule 6: Blockquotes ──────────────────────────────────────────────────────

fn style_blockquotes(input: &str, theme: &Theme) -> String {
    let styled = format!(
        "<blockquote style=\"border-left:4px solid {};color:{};margin:1em 0;padding:0.25em 1em;\">",
        theme.blockquote_border, theme.blockquote_color
    );
    input.replace("<blockquote>", &styled)
}

// ── Rule 7: Tables ───────────────────────────────────────────────────────────

static RE_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(th|td)(?:\s+style="text-align:\s*([a-z]+);?")?(?:\s+align="([a-z]+)")?>"#).unwrap()
});

fn style_tables(input: &str, theme: &Theme) -> String {
    let s = input.replace(
        "<table>",
        "<table style=\"border-collapse:collapse;width:100%;margin:1em 0;\">",
    );
    RE_CELL
        .replace_all(&s, |caps: &Captures<'_>| {
            let tag = &caps[1];
            let align = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or("left");
            let header = if tag == "th" {
                format!("background:{};font-weight:bold;", theme.table_header_background)
            } else {
                String::new()
            };
            format!(
                "<{tag} style=\"border:1px solid {};padding:6px 12px;text-align:{align};{header}\">",
                theme.border_color
            )
        })
        .into_owned()
}

// ── Rule 8: Links and headings ───────────────────────────────────────────────

static RE_PLAIN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a (href="[^"]*"(?:\s+title="[^"]*")?)>"#).unwrap());

static RE_PLAIN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h([1-6])>").unwrap());

fn style_links_and_headings(input: &str, theme: &Theme) -> String {
    let s = RE_PLAIN_LINK.replace_all(input, |caps: &Captures<'_>| {
        format!("<a {} style=\"color:{};\">", &caps[1], theme.link_color)
    });
    RE_PLAIN_HEADING
        .replace_all(&s, |caps: &Captures<'_>| {
            format!("<h{} style=\"color:{};\">", &caps[1], theme.heading_color)
        })
        .into_owned()
}

// ── Rule 9: Empty paragraphs ─────────────────────────────────────────────────

static RE_EMPTY_P: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p(?:\s[^>]*)?>\s*</p>\n?").unwrap());

fn remove_empty_paragraphs(input: &str) -> String {
    RE_EMPTY_P.replace_all(input, "").into_owned()
}

// ── Rule 10: class / data-* attributes ───────────────────────────────────────

static RE_CLASS_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\s+class=(?:"[^"]*"|'[^']*')"#).unwrap());

static RE_DATA_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+data-[a-zA-Z0-9_-]+=(?:"[^"]*"|'[^']*')"#).unwrap());

fn strip_class_and_data_attributes(input: &str) -> String {
    // Attributes only ever appear inside tags; scanning tag by tag keeps text untouched.
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail.find('>').map(|i| i + 1).unwrap_or(tail.len());
        let tag = &tail[..end];
        if tag.starts_with("<!") || tag.starts_with("</") {
            out.push_str(tag);
        } else {
            let tag = RE_CLASS_ATTR.replace_all(tag, "");
            out.push_str(&RE_DATA_ATTR.replace_all(&tag, ""));
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::PulldownRenderer;
    use crate::theme::{DEFAULT_THEME, GITHUB_THEME};

    #[test]
    fn callout_restructured_with_type_color() {
        let html = r#"<div data-callout-metadata="" data-callout-fold="" data-callout="warning" class="callout"><div class="callout-title"><div class="callout-icon"><svg></svg></div><div class="callout-title-inner">Careful</div></div><div class="callout-content"><p>Body</p></div></div>"#;
        let out = clean_html(html, &DEFAULT_THEME);
        assert!(out.contains("border-left:4px solid #ff9100"), "got: {out}");
        assert!(out.contains(">Careful</p>"));
        assert!(out.contains("<p>Body</p>"));
        assert!(!out.contains("class="));
        assert!(!out.contains("data-"));
        assert!(!out.contains("<svg>"));
    }

    #[test]
    fn unknown_callout_uses_default_color() {
        assert_eq!(callout_color("custom-thing"), DEFAULT_CALLOUT_COLOR);
        let out = clean_html(r#"<div data-callout="custom"><p>x</p></div>"#, &DEFAULT_THEME);
        assert!(out.contains("#448aff"));
        assert!(out.contains(">Custom</p>"));
    }

    #[test]
    fn gfm_alert_styled_like_callout() {
        let html = PulldownRenderer.render_str("> [!TIP]\n> Use the force\n");
        let out = clean_html(&html, &DEFAULT_THEME);
        assert!(out.contains("#00bfa5"), "got: {out}");
        assert!(out.contains(">Tip</p>"));
        assert!(out.contains("Use the force"));
    }

    #[test]
    fn internal_links_become_emphasis() {
        let html = r#"<p>See <a data-href="Other" href="Other" class="internal-link" target="_blank" rel="noopener">Other</a>.</p>"#;
        assert_eq!(clean_html(html, &DEFAULT_THEME), "<p>See <em>Other</em>.</p>");
    }

    #[test]
    fn math_containers_are_removed() {
        let html = r#"<p>a <span class="math math-inline"><mjx-container jax="CHTML">x</mjx-container></span> b</p>"#;
        assert_eq!(clean_html(html, &DEFAULT_THEME), "<p>a  b</p>");
    }

    #[test]
    fn code_block_gets_block_style_and_inline_code_gets_inline_style() {
        let html = PulldownRenderer.render_str("```rust\nfn main() {}\n```\n\nuse `x`\n");
        let out = clean_html(&html, &GITHUB_THEME);
        assert!(out.contains("<pre style=\"background:#f6f8fa;"), "got: {out}");
        assert!(out.contains("background:none;\">fn main"));
        assert!(out.contains("padding:0.15em 0.35em"));
        assert!(!out.contains("language-rust"));
    }

    #[test]
    fn table_alignment_is_kept() {
        let html = PulldownRenderer.render_str("| a | b |\n|:-:|---|\n| 1 | 2 |\n");
        let out = clean_html(&html, &DEFAULT_THEME);
        assert!(out.contains("text-align:center;background:#f0f0f0"), "got: {out}");
        assert!(out.contains("<td style=\"border:1px solid #dddddd;padding:6px 12px;text-align:left;\">2</td>"));
    }

    #[test]
    fn empty_paragraphs_removed() {
        assert_eq!(clean_html("<p> </p><p>x</p>", &DEFAULT_THEME), "<p>x</p>");
    }

    #[test]
    fn class_text_in_code_is_untouched() {
        let html = "<p>write class=&quot;x&quot; data-y</p>";
        assert_eq!(clean_html(html, &DEFAULT_THEME), html);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let md = "# T\n\n> quote\n\n> [!NOTE]\n> n\n\n| a |\n|---|\n| 1 |\n\n```\ncode\n```\n\n`c` [l](http://x)\n";
        let html = PulldownRenderer.render_str(md);
        let once = clean_html(&html, &DEFAULT_THEME);
        let twice = clean_html(&once, &DEFAULT_THEME);
        assert_eq!(once, twice);
    }
}
