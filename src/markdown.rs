//! Default Markdown renderer built on `pulldown-cmark`.
//!
//! Enables the GitHub-flavoured extensions notes rely on: tables,
//! strikethrough, task lists, footnotes and `> [!NOTE]` alerts. The alerts
//! come out as `<blockquote class="markdown-alert-…">`, which the cleanup
//! stage restyles exactly like vault callouts. `[[wikilinks]]` come out as
//! `<a class="internal-link">`, which cleanup turns into emphasis.

use crate::collab::{MarkdownRenderer, SourceContext};
use crate::error::BoxError;
use async_trait::async_trait;
use crate::pipeline::math::escape_html;
use pulldown_cmark::{html, Event, LinkType, Options, Parser, Tag, TagEnd};

/// Renders CommonMark + GFM extensions to an HTML fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulldownRenderer;

impl PulldownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_GFM
            | Options::ENABLE_WIKILINKS
    }

    /// Synchronous rendering, usable outside an async context.
    pub fn render_str(&self, markdown: &str) -> String {
        // One entry per open link: whether it is a wikilink.
        let mut open_links = Vec::new();
        let parser = Parser::new_ext(markdown, Self::options()).map(|event| match event {
            Event::Start(Tag::Link {
                link_type: LinkType::WikiLink { .. },
                dest_url,
                ..
            }) => {
                open_links.push(true);
                Event::InlineHtml(
                    format!("<a href=\"{}\" class=\"internal-link\">", escape_html(&dest_url)).into(),
                )
            }
            Event::Start(tag @ Tag::Link { .. }) => {
                open_links.push(false);
                Event::Start(tag)
            }
            Event::End(TagEnd::Link) if open_links.pop() == Some(true) => Event::InlineHtml("</a>".into()),
            other => other,
        });
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

#[async_trait]
impl MarkdownRenderer for PulldownRenderer {
    async fn render(&self, markdown: &str, _source: &SourceContext) -> Result<String, BoxError> {
        Ok(self.render_str(markdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_tables() {
        let html = PulldownRenderer.render_str("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn placeholders_survive_as_text() {
        let html = PulldownRenderer.render_str("Before NPXQZMATH0ZQ after\n\nNPXQZIMG1ZQ\n");
        assert!(html.contains("Before NPXQZMATH0ZQ after"));
        assert!(html.contains("<p>NPXQZIMG1ZQ</p>"));
    }

    #[test]
    fn gfm_alert_becomes_classed_blockquote() {
        let html = PulldownRenderer.render_str("> [!WARNING]\n> Mind the gap\n");
        assert!(html.contains("markdown-alert-warning"), "got: {html}");
    }

    #[test]
    fn wikilinks_become_internal_links() {
        let html = PulldownRenderer.render_str("See [[Other Note]] and [[Plan|the plan]], or [web](https://x.example).\n");
        assert!(html.contains(r#"class="internal-link">Other Note</a>"#), "got: {html}");
        assert!(html.contains(r#"class="internal-link">the plan</a>"#), "got: {html}");
        assert!(html.contains(r#"<a href="https://x.example">web</a>"#), "got: {html}");
    }

    #[tokio::test]
    async fn async_render_matches_sync() {
        let md = "*hi* there";
        let a = PulldownRenderer
            .render(md, &SourceContext::default())
            .await
            .unwrap();
        assert_eq!(a, PulldownRenderer.render_str(md));
    }
}
