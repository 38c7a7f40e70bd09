//! Owned HTML tree for the document-model walker.
//!
//! html5ever gives a reference-counted DOM with interior mutability; the
//! walker wants plain data it can match on and borrow freely across awaits.
//! Comments, doctypes and processing instructions are dropped here.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Lower-case local name.
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<HtmlNode>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            HtmlNode::Element(e) => Some(e),
            HtmlNode::Text(_) => None,
        })
    }

    /// First descendant element with `tag`, depth-first.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }
}

fn collect_text(nodes: &[HtmlNode], out: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(t) => out.push_str(t),
            HtmlNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

fn convert(handle: &Handle) -> Option<HtmlNode> {
    match &handle.data {
        NodeData::Text { contents } => Some(HtmlNode::Text(contents.borrow().to_string())),
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.as_ref().to_string(), a.value.to_string()))
                .collect();
            let children = handle.children.borrow().iter().filter_map(convert).collect();
            Some(HtmlNode::Element(Element {
                tag: name.local.as_ref().to_ascii_lowercase(),
                attrs,
                children,
            }))
        }
        _ => None,
    }
}

/// Parse an HTML document or fragment into an owned tree rooted at `#document`.
pub fn parse_html(html: &str) -> Element {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let children = dom.document.children.borrow().iter().filter_map(convert).collect();
    Element {
        tag: "#document".into(),
        attrs: Vec::new(),
        children,
    }
}

/// Parse an HTML document or fragment and return its `<body>`.
pub fn parse_body(html: &str) -> Element {
    parse_html(html)
        .find("body")
        .cloned()
        .unwrap_or_else(|| Element::new("body"))
}

/// Text of the `<title>` element, if any.
pub fn parse_title(html: &str) -> Option<String> {
    let title = parse_html(html).find("title")?.text_content();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_lands_in_body() {
        let body = parse_body("<h1>Hi</h1><p>a <b>b</b></p>");
        let tags: Vec<_> = body.child_elements().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["h1", "p"]);
        assert_eq!(body.text_content(), "Hia b");
    }

    #[test]
    fn attributes_and_entities() {
        let body = parse_body(r#"<p><a href="x?a=1&amp;b=2">l &lt;3</a></p>"#);
        let a = body.find("a").unwrap();
        assert_eq!(a.attr("HREF"), Some("x?a=1&b=2"));
        assert_eq!(a.text_content(), "l <3");
    }

    #[test]
    fn comments_are_dropped() {
        let body = parse_body("<p>a<!-- hidden -->b</p>");
        assert_eq!(body.text_content(), "ab");
    }

    #[test]
    fn title_from_full_document() {
        let html = "<!DOCTYPE html><html><head><title> Note </title></head><body></body></html>";
        assert_eq!(parse_title(html).as_deref(), Some("Note"));
        assert_eq!(parse_title("<p>x</p>"), None);
    }
}
