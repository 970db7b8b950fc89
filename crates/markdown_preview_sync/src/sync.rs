//! Mapping between source lines and preview elements.
//!
//! Both directions meet in a path: a list of `(tag, index)` entries, where
//! `index` counts the preceding siblings carrying the same tag. Counting per
//! tag instead of per child keeps the mapping stable when the preview holds
//! elements the token stream knows nothing about (raw HTML, inline markup).

use crate::error::SyncError;
use crate::token::{Nesting, Token};
use crate::widget::{Widget, CODE_BLOCK_TAG};
use preview_dom::{Dom, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag of the entry standing for the preview container itself.
const ROOT_TAG: &str = "div";

/// Token tags that never open a nested path component.
const LEAF_TAGS: [&str; 3] = ["math", "code", "hr"];

/// One step of a path: the `index`-th sibling element with this `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathEntry {
    pub tag: String,
    pub index: usize,
}

impl PathEntry {
    pub fn new(tag: impl Into<String>, index: usize) -> Self {
        Self {
            tag: tag.into(),
            index,
        }
    }
}

/// Tag under which a token shows up in the preview DOM.
///
/// Returns `None` for tokens without an element of their own.
pub fn decode_tag(token: &Token) -> Option<&str> {
    match token.tag.as_str() {
        "" => None,
        "math" => Some("span"),
        "code" => Some(CODE_BLOCK_TAG),
        tag => Some(tag),
    }
}

/// Token tag an element of the preview DOM stands for.
pub fn encode_tag(dom: &Dom, element: NodeId) -> &str {
    match Widget::of(dom, element) {
        Widget::Math => "math",
        Widget::EmbeddedCode => "code",
        Widget::Plain => dom.tag(element).unwrap_or_default(),
    }
}

/// Per-tag sibling counters, one frame per nesting level.
#[derive(Debug)]
pub(crate) struct TagCounter {
    frames: Vec<HashMap<String, usize>>,
}

impl TagCounter {
    pub(crate) fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub(crate) fn get(&self, tag: &str) -> usize {
        self.frames
            .last()
            .and_then(|frame| frame.get(tag))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn bump(&mut self, tag: &str) {
        if let Some(frame) = self.frames.last_mut() {
            *frame.entry(tag.to_string()).or_default() += 1;
        }
    }

    pub(crate) fn descend(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub(crate) fn ascend(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}

/// Cuts `path` right after its first `table` entry.
///
/// Table internals are never addressed, a line inside a table maps to the
/// whole table.
pub(crate) fn truncate_at_table(path: &mut Vec<PathEntry>) {
    if let Some(position) = path.iter().position(|entry| entry.tag == "table") {
        path.truncate(position + 1);
    }
}

/// Computes the path of the preview element rendering source `line`.
///
/// Tokens are walked in document order, the first token whose range contains
/// the line wins, so an outer container always beats an inner one starting on
/// the same line. The result may be short or empty when the line sits between
/// blocks.
pub fn path_to_token(tokens: &[Token], line: usize) -> Vec<PathEntry> {
    let mut path = Vec::new();
    let mut counter = TagCounter::new();
    let mut level = 0;

    for token in tokens {
        if token.level < level {
            break;
        }
        if token.hidden || token.nesting == Nesting::Close {
            continue;
        }
        let Some(tag) = decode_tag(token) else {
            continue;
        };

        if token.contains_line(line) {
            path.push(PathEntry::new(tag, counter.get(tag)));
            if token.nesting == Nesting::Open {
                counter.descend();
                level += 1;
            } else {
                break;
            }
        } else if token.level == level {
            counter.bump(tag);
        }
    }

    truncate_at_table(&mut path);
    path
}

/// Computes the path from the preview `root` down to `element`.
///
/// The first entry always stands for `root`. Text nodes resolve to their
/// parent element and elements inside an opaque widget resolve to the widget.
pub fn path_to_element(
    dom: &Dom,
    root: NodeId,
    element: NodeId,
) -> Result<Vec<PathEntry>, SyncError> {
    let mut current = element;
    while current != root && !dom.is_element(current) {
        current = dom.parent(current).ok_or(SyncError::Detached(current))?;
    }
    // Nothing above the outermost widget is opaque.
    if current != root {
        current = bubble_to_widget(dom, root, current);
    }

    let mut path = Vec::new();
    while current != root {
        let parent = dom.parent(current).ok_or(SyncError::Detached(current))?;

        let tag = encode_tag(dom, current);
        let mut index = 0;
        let mut found = false;
        for sibling in dom.element_children(parent) {
            if sibling == current {
                found = true;
                break;
            }
            if encode_tag(dom, sibling) == tag {
                index += 1;
            }
        }
        if !found {
            return Err(SyncError::NotAChild {
                child: current,
                parent,
            });
        }

        path.push(PathEntry::new(tag, index));
        current = parent;
    }
    path.push(PathEntry::new(ROOT_TAG, 0));
    path.reverse();

    Ok(path)
}

/// The outermost opaque widget enclosing `element` below `root`, or `element`
/// itself when there is none.
fn bubble_to_widget(dom: &Dom, root: NodeId, element: NodeId) -> NodeId {
    let mut target = element;
    for ancestor in dom.ancestors(element) {
        if ancestor == root {
            break;
        }
        if Widget::of(dom, ancestor).is_opaque() {
            target = ancestor;
        }
    }
    target
}

/// Resolves a path produced by [`path_to_token`] against the preview DOM.
///
/// Each entry selects the `index`-th element child with that tag. Resolution
/// stops at the deepest element found, `None` means not even the first entry
/// matched.
pub fn element_for_path(dom: &Dom, root: NodeId, path: &[PathEntry]) -> Option<NodeId> {
    let mut current = root;
    let mut resolved = None;

    for entry in path {
        let candidate = dom
            .element_children(current)
            .filter(|&child| dom.tag(child) == Some(entry.tag.as_str()))
            .nth(entry.index);
        match candidate {
            Some(element) => {
                current = element;
                resolved = Some(element);
            }
            None => break,
        }
    }

    resolved
}

/// Finds the source line of the token a path from [`path_to_element`] points
/// at, with the root entry already removed.
pub fn line_for_path(tokens: &[Token], path: &[PathEntry]) -> Option<usize> {
    let mut remaining: Vec<PathEntry> = path.iter().rev().cloned().collect();
    let mut level = 0;
    let mut target: Option<&Token> = None;

    for token in tokens {
        let Some(head) = remaining.last_mut() else {
            break;
        };
        if token.level < level {
            break;
        }
        if token.hidden || token.level != level || token.tag != head.tag {
            continue;
        }

        match token.nesting {
            Nesting::Open => {
                if head.index == 0 {
                    if token.map.is_some() {
                        target = Some(token);
                    }
                    remaining.pop();
                    level += 1;
                } else {
                    head.index -= 1;
                }
            }
            Nesting::SelfClosing if LEAF_TAGS.contains(&token.tag.as_str()) => {
                if head.index == 0 {
                    if token.map.is_some() {
                        target = Some(token);
                    }
                    break;
                }
                head.index -= 1;
            }
            _ => {}
        }
    }

    target.and_then(Token::start_line)
}

/// Source line of a preview element, `Ok(None)` if no token matches.
pub fn line_for_element(
    tokens: &[Token],
    dom: &Dom,
    root: NodeId,
    element: NodeId,
) -> Result<Option<usize>, SyncError> {
    let path = path_to_element(dom, root, element)?;
    Ok(line_for_path(tokens, &path[1..]))
}
