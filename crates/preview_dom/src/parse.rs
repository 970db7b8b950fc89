use crate::node::NodeId;
use crate::tree::Dom;
use html5ever::tendril::TendrilSink;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// A detached tree parsed from an HTML string.
///
/// `root` is a [`NodeData::Fragment`](crate::NodeData::Fragment) node holding
/// the parsed top-level nodes, like the `DocumentFragment` produced by a `<template>` element.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub dom: Dom,
    pub root: NodeId,
}

impl Fragment {
    /// Creates a fragment with no children.
    pub fn empty() -> Self {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        Self { dom, root }
    }

    /// Parses `html` as body content.
    ///
    /// Parsing never fails, malformed markup is recovered the way browsers
    /// recover it.
    pub fn parse(html: &str) -> Self {
        let rcdom = html5ever::parse_document(RcDom::default(), ParseOpts::default()).one(html);

        let mut fragment = Self::empty();
        if let Some(body) = find_body(&rcdom.document) {
            convert_children(&mut fragment.dom, fragment.root, &body);
        }
        tracing::trace!(nodes = fragment.dom.len(), "Parsed HTML fragment");
        fragment
    }

    /// Serialized children of the fragment root.
    pub fn inner_html(&self) -> String {
        self.dom.inner_html(self.root)
    }
}

fn element_name(handle: &Handle) -> Option<&str> {
    match &handle.data {
        RcNodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = document
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child) == Some("html"))
        .cloned()?;
    let body = html
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child) == Some("body"))
        .cloned();
    body
}

/// Copies the children of `handle` under `parent`, dropping doctypes and
/// processing instructions.
fn convert_children(dom: &mut Dom, parent: NodeId, handle: &Handle) {
    let mut stack: Vec<(Handle, NodeId)> = handle
        .children
        .borrow()
        .iter()
        .rev()
        .map(|child| (child.clone(), parent))
        .collect();

    while let Some((handle, parent)) = stack.pop() {
        let node = match &handle.data {
            RcNodeData::Element { name, attrs, .. } => {
                let node = dom.create_element(&name.local);
                for attr in attrs.borrow().iter() {
                    dom.set_attr(node, &attr.name.local, &attr.value);
                }
                node
            }
            RcNodeData::Text { contents } => dom.create_text(contents.borrow().to_string()),
            RcNodeData::Comment { contents } => dom.create_comment(contents.to_string()),
            _ => continue,
        };
        dom.adopt(parent, node);
        stack.extend(
            handle
                .children
                .borrow()
                .iter()
                .rev()
                .map(|child| (child.clone(), node)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_level_nodes() {
        let fragment = Fragment::parse("<h1 id=\"title\">Title</h1>\n<p>Some <em>text</em>.</p>\n");
        let dom = &fragment.dom;
        let children = dom.children(fragment.root);

        let tags: Vec<_> = children.iter().map(|&c| dom.tag(c)).collect();
        assert_eq!(tags, [Some("h1"), None, Some("p"), None]);
        assert_eq!(dom.attr(children[0], "id"), Some("title"));
        assert_eq!(dom.text(children[1]), Some("\n"));
    }

    #[test]
    fn test_parse_keeps_comments() {
        let fragment = Fragment::parse("<p>x</p><!-- note -->");
        let first = fragment.dom.children(fragment.root)[1];
        assert_eq!(fragment.dom.text(first), Some(" note "));
        assert!(!fragment.dom.is_element(first));
    }

    #[test]
    fn test_parse_recovers_unclosed_tags() {
        let fragment = Fragment::parse("<ul><li>a<li>b</ul><p>after");
        let items = fragment.dom.elements_by_tag(fragment.root, "li");
        assert_eq!(items.len(), 2);
        assert_eq!(fragment.dom.elements_by_tag(fragment.root, "p").len(), 1);
    }

    #[test]
    fn test_parse_deeply_nested_markup() {
        let depth = 20_000;
        let html = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let fragment = Fragment::parse(&html);

        let divs = fragment.dom.elements_by_tag(fragment.root, "div");
        assert_eq!(divs.len(), depth);
        assert_eq!(fragment.dom.text_content(divs[depth - 1]), "x");
        assert_eq!(fragment.inner_html(), html);
    }

    #[test]
    fn test_parse_empty() {
        let fragment = Fragment::parse("");
        assert!(fragment.dom.children(fragment.root).is_empty());
        assert_eq!(fragment.inner_html(), "");
    }
}
