//! Block token stream derived from the pulldown-cmark event stream.
//!
//! The stream follows the block structure of the rendered HTML: one open and
//! one close token per block element, self-closing tokens for leaves such as
//! rules and code blocks, and an empty-tag token for every run of inline
//! content.

use crate::token::{Nesting, Token};
use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};
use std::ops::Range;

/// Byte offset to 0-based line lookups.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(offset, _)| offset + 1))
            .collect();
        Self { starts }
    }

    fn line(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset) - 1
    }

    /// Lines touched by `range`, as a half-open range.
    fn span(&self, range: &Range<usize>) -> [usize; 2] {
        let start = self.line(range.start);
        let end = self.line(range.end.saturating_sub(1).max(range.start));
        [start, end + 1]
    }
}

pub(crate) fn is_math_fence(kind: &CodeBlockKind) -> bool {
    match kind {
        CodeBlockKind::Fenced(info) => info.split_whitespace().next() == Some("math"),
        CodeBlockKind::Indented => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    CodeBlock,
    HtmlBlock,
    Metadata,
}

struct TokenBuilder {
    lines: LineIndex,
    math: bool,
    tokens: Vec<Token>,
    stack: Vec<String>,
    /// Inside a block whose inline content already has a token.
    in_leaf: bool,
    /// An inline run token has been emitted since the last block token.
    inline_open: bool,
    in_table_head: bool,
    tbody: Option<usize>,
    skip: Option<Skip>,
}

impl TokenBuilder {
    fn level(&self) -> usize {
        self.stack.len()
    }

    fn open(&mut self, tag: impl Into<String>, range: &Range<usize>) {
        let tag = tag.into();
        let [start, end] = self.lines.span(range);
        self.tokens
            .push(Token::new(tag.clone(), Nesting::Open, self.level()).with_map(start, end));
        self.stack.push(tag);
        self.inline_open = false;
    }

    fn close(&mut self) {
        if let Some(tag) = self.stack.pop() {
            self.tokens
                .push(Token::new(tag, Nesting::Close, self.level()));
        }
        self.inline_open = false;
    }

    fn leaf(&mut self, tag: &str, range: &Range<usize>) {
        let [start, end] = self.lines.span(range);
        self.tokens
            .push(Token::new(tag, Nesting::SelfClosing, self.level()).with_map(start, end));
        self.inline_open = false;
    }

    /// Opens a block holding inline content, together with its inline token.
    fn open_leaf(&mut self, tag: impl Into<String>, range: &Range<usize>) {
        self.open(tag, range);
        self.leaf("", range);
        self.in_leaf = true;
    }

    fn close_leaf(&mut self) {
        self.in_leaf = false;
        self.close();
    }

    fn inline(&mut self, range: &Range<usize>) {
        if self.in_leaf || self.inline_open {
            return;
        }
        self.leaf("", range);
        self.inline_open = true;
    }

    fn start(&mut self, tag: &Tag, range: &Range<usize>) {
        match tag {
            Tag::Paragraph => self.open_leaf("p", range),
            Tag::Heading { level, .. } => self.open_leaf(format!("h{}", *level as usize), range),
            Tag::BlockQuote => self.open("blockquote", range),
            Tag::CodeBlock(kind) => {
                let tag = if self.math && is_math_fence(kind) {
                    "math"
                } else {
                    "code"
                };
                self.leaf(tag, range);
                self.skip = Some(Skip::CodeBlock);
            }
            Tag::HtmlBlock => {
                self.leaf("", range);
                self.skip = Some(Skip::HtmlBlock);
            }
            Tag::MetadataBlock(_) => self.skip = Some(Skip::Metadata),
            Tag::List(Some(_)) => self.open("ol", range),
            Tag::List(None) => self.open("ul", range),
            Tag::Item => self.open("li", range),
            Tag::FootnoteDefinition(_) => self.open("div", range),
            Tag::Table(_) => {
                self.tbody = None;
                self.open("table", range);
            }
            Tag::TableHead => {
                self.open("thead", range);
                self.open("tr", range);
                self.in_table_head = true;
            }
            Tag::TableRow => {
                let [_, end] = self.lines.span(range);
                match self.tbody {
                    Some(index) => {
                        if let Some(map) = self.tokens[index].map.as_mut() {
                            map[1] = map[1].max(end);
                        }
                    }
                    None => {
                        self.tbody = Some(self.tokens.len());
                        self.open("tbody", range);
                    }
                }
                self.open("tr", range);
            }
            Tag::TableCell => {
                let tag = if self.in_table_head { "th" } else { "td" };
                self.open_leaf(tag, range);
            }
            Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Link { .. }
            | Tag::Image { .. } => self.inline(range),
        }
    }

    fn end(&mut self, tag: &TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::TableCell => self.close_leaf(),
            TagEnd::BlockQuote
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::FootnoteDefinition
            | TagEnd::TableRow => self.close(),
            TagEnd::TableHead => {
                self.close();
                self.close();
                self.in_table_head = false;
            }
            TagEnd::Table => {
                if self.tbody.take().is_some() {
                    self.close();
                }
                self.close();
            }
            _ => {}
        }
    }

    fn push(&mut self, event: &Event, range: &Range<usize>) {
        if let Some(skip) = self.skip {
            let done = matches!(
                (skip, event),
                (Skip::CodeBlock, Event::End(TagEnd::CodeBlock))
                    | (Skip::HtmlBlock, Event::End(TagEnd::HtmlBlock))
                    | (Skip::Metadata, Event::End(TagEnd::MetadataBlock(_)))
            );
            if done {
                self.skip = None;
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(tag),
            Event::Rule => self.leaf("hr", range),
            Event::Html(_) => self.leaf("", range),
            Event::Text(_)
            | Event::Code(_)
            | Event::InlineHtml(_)
            | Event::FootnoteReference(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::TaskListMarker(_) => self.inline(range),
        }
    }
}

/// Builds the block token stream of an event stream with source offsets.
pub(crate) fn build_tokens(events: &[(Event, Range<usize>)], source: &str, math: bool) -> Vec<Token> {
    let mut builder = TokenBuilder {
        lines: LineIndex::new(source),
        math,
        tokens: Vec::new(),
        stack: Vec::new(),
        in_leaf: false,
        inline_open: false,
        in_table_head: false,
        tbody: None,
        skip: None,
    };
    for (event, range) in events {
        builder.push(event, range);
    }
    // Close whatever a truncated stream left open.
    while !builder.stack.is_empty() {
        builder.close();
    }
    builder.tokens
}
