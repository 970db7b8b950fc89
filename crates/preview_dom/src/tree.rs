//! The node arena and its structural operations.

use crate::node::{Attribute, ElementData, Node, NodeData, NodeId};

/// An arena of DOM nodes.
///
/// Nodes are created detached and attached with [`Dom::append_child`] or
/// [`Dom::insert_before`]. Detaching keeps the subtree alive so it can be
/// re-attached, [`Dom::remove`] frees it and makes its ids reusable.
#[derive(Debug, Default, Clone)]
pub struct Dom {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node::new(data);
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// # Panics
    ///
    /// Panics if `id` has been freed or belongs to another arena.
    fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("{id} is not a live node"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{id} is not a live node"))
    }

    /// Returns `true` if `id` refers to a live node of this arena.
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.node(id).data
    }

    /// Lowercase tag name, `None` for non-element nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element(element) => Some(element.tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Text(_))
    }

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeData::Text(text) | NodeData::Comment(text) = &mut self.node_mut(id).data {
            *text = value.into();
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .filter_map(|node| match &self.node(node).data {
                NodeData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).data {
            NodeData::Element(element) => &element.attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Sets an attribute, keeping its position if it already exists.
    ///
    /// No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element(element) = &mut self.node_mut(id).data {
            match element.attrs.iter_mut().find(|attr| attr.name == name) {
                Some(attr) => attr.value = value.to_string(),
                None => element.attrs.push(Attribute {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        match &mut self.node_mut(id).data {
            NodeData::Element(element) => {
                let position = element.attrs.iter().position(|attr| attr.name == name)?;
                Some(element.attrs.remove(position).value)
            }
            _ => None,
        }
    }

    /// Value of the `class` attribute, empty if absent.
    pub fn class_name(&self, id: NodeId) -> &str {
        self.attr(id, "class").unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_name(id)
            .split_ascii_whitespace()
            .any(|name| name == class)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.is_element(child))
    }

    /// Position of `id` among all children of its parent.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|previous| self.children(parent).get(previous).copied())
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|node| node == ancestor)
    }

    /// Appends `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_at(parent, len, child);
    }

    /// Inserts `child` before `reference`, or appends it when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let index = reference
            .and_then(|reference| self.children(parent).iter().position(|&c| c == reference))
            .unwrap_or_else(|| self.children(parent).len());
        self.attach(parent, index, child);
    }

    /// Inserts `child` at `index` among the children of `parent`.
    ///
    /// An out of range index appends.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let index = index.min(self.children(parent).len());
        self.attach(parent, index, child);
    }

    fn attach(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(
            !self.is_inclusive_ancestor(child, parent),
            "inserting {child} under {parent} would create a cycle"
        );
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Unlinks `id` from its parent, keeping the subtree alive.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
    }

    /// Detaches `id` and frees it together with all of its descendants.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(next.0);
            }
        }
    }

    /// Pre-order traversal of the descendants of `root`, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            dom: self,
            stack: self.children(root).iter().rev().copied().collect(),
        }
    }

    /// Elements below `root` with the given tag, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .filter(|&node| self.tag(node) == Some(tag))
            .collect()
    }

    /// Deep equality as defined by `Node.isEqualNode`.
    ///
    /// Attributes are compared as a set, so their order does not matter.
    pub fn is_equal_node(&self, id: NodeId, other: &Dom, other_id: NodeId) -> bool {
        let mut stack = vec![(id, other_id)];
        while let Some((id, other_id)) = stack.pop() {
            let (lhs, rhs) = (self.node(id), other.node(other_id));
            let same_data = match (&lhs.data, &rhs.data) {
                (NodeData::Element(a), NodeData::Element(b)) => {
                    a.tag == b.tag
                        && a.attrs.len() == b.attrs.len()
                        && a.attrs.iter().all(|attr| b.attrs.contains(attr))
                }
                (data, other_data) => data == other_data,
            };
            if !same_data || lhs.children.len() != rhs.children.len() {
                return false;
            }
            stack.extend(lhs.children.iter().copied().zip(rhs.children.iter().copied()));
        }
        true
    }

    /// Deep clones `id` from `other` into this arena, returning the detached copy.
    pub fn import_node(&mut self, other: &Dom, id: NodeId) -> NodeId {
        let copy = self.alloc(other.node(id).data.clone());
        let mut stack = vec![(id, copy)];
        while let Some((source, target)) = stack.pop() {
            for &child in &other.node(source).children {
                let child_copy = self.alloc(other.node(child).data.clone());
                self.adopt(target, child_copy);
                stack.push((child, child_copy));
            }
        }
        copy
    }

    /// Deep clones `id` within this arena, returning the detached copy.
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        let copy = self.alloc(self.node(id).data.clone());
        let mut stack = vec![(id, copy)];
        while let Some((source, target)) = stack.pop() {
            for child in self.node(source).children.clone() {
                let child_copy = self.alloc(self.node(child).data.clone());
                self.adopt(target, child_copy);
                stack.push((child, child_copy));
            }
        }
        copy
    }

    /// Appends a freshly allocated `child`, which cannot be an ancestor of
    /// `parent`.
    pub(crate) fn adopt(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }
}

/// Iterator returned by [`Dom::descendants`].
pub struct Descendants<'a> {
    dom: &'a Dom,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.dom.children(next).iter().rev().copied());
        Some(next)
    }
}
