use crate::node::NodeData;
use crate::tree::Dom;
use crate::NodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Dom {
    /// Serializes the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(&mut out, child, false);
        }
        out
    }

    /// Serializes `id` together with its children.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .parent(id)
            .and_then(|parent| self.tag(parent))
            .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
        self.write_node(&mut out, id, raw);
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId, raw_text: bool) {
        let mut stack = vec![Step::Open(id, raw_text)];
        while let Some(step) = stack.pop() {
            let (id, raw_text) = match step {
                Step::Open(id, raw_text) => (id, raw_text),
                Step::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };

            match self.data(id) {
                NodeData::Fragment => {
                    stack.extend(self.children(id).iter().rev().map(|&child| Step::Open(child, false)));
                }
                NodeData::Text(text) if raw_text => out.push_str(text),
                NodeData::Text(text) => escape_text(out, text),
                NodeData::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
                NodeData::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for attr in &element.attrs {
                        out.push(' ');
                        out.push_str(&attr.name);
                        out.push_str("=\"");
                        escape_attr(out, &attr.value);
                        out.push('"');
                    }
                    out.push('>');

                    if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                        continue;
                    }

                    let raw = RAW_TEXT_ELEMENTS.contains(&element.tag.as_str());
                    stack.push(Step::Close(&element.tag));
                    stack.extend(self.children(id).iter().rev().map(|&child| Step::Open(child, raw)));
                }
            }
        }
    }
}

enum Step<'a> {
    /// Write a node, its text unescaped when inside a raw text element.
    Open(NodeId, bool),
    Close(&'a str),
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Fragment;

    #[test]
    fn test_serialize_reproduces_markup() {
        let html = "<h1 id=\"a\">Title</h1>\n<p>x &lt; y &amp; <img src=\"a.png\" alt=\"a\"></p>\n";
        let fragment = Fragment::parse(html);
        assert_eq!(fragment.inner_html(), html);
    }

    #[test]
    fn test_serialize_escapes_attribute_quotes() {
        let mut fragment = Fragment::parse("<a>x</a>");
        let a = fragment.dom.children(fragment.root)[0];
        fragment.dom.set_attr(a, "title", "say \"hi\"");
        assert_eq!(
            fragment.dom.outer_html(a),
            "<a title=\"say &quot;hi&quot;\">x</a>"
        );
    }

    #[test]
    fn test_serialize_comment() {
        let fragment = Fragment::parse("<br><!--c-->");
        assert_eq!(fragment.inner_html(), "<br><!--c-->");
    }
}
