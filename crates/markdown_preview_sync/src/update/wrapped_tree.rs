//! Snapshot of the displayed tree and the diff between it and a new render.

use crate::widget::Widget;
use preview_dom::{Dom, NodeData, NodeId};
use similar::{capture_diff_slices, Algorithm, DiffTag};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::iter::Peekable;

/// A node of the last rendered tree, paired with the live node showing it.
#[derive(Debug)]
pub(crate) struct WrappedNode {
    /// Node in the snapshot arena.
    pub(crate) rep: NodeId,
    /// Node in the live arena.
    pub(crate) shown: NodeId,
    /// Structural hash of the subtree. Nodes that compare equal share a key,
    /// `ol[start]` is left out.
    pub(crate) key: u64,
    pub(crate) children: Vec<WrappedNode>,
}

impl WrappedNode {
    fn leaf(rep: NodeId, shown: NodeId) -> Self {
        Self {
            rep,
            shown,
            key: 0,
            children: Vec::new(),
        }
    }

    /// Wraps a subtree of a single arena, for trees that are never shown.
    pub(crate) fn wrap(dom: &Dom, id: NodeId) -> Self {
        Self::build(dom, Self::leaf(id, id), |node, index| {
            dom.children(node.rep).get(index).map(|&child| (child, child))
        })
    }

    /// Wraps a snapshot subtree together with the live subtree it mirrors.
    pub(crate) fn pair(snapshot: &Dom, rep: NodeId, live: &Dom, shown: NodeId) -> Self {
        Self::build(snapshot, Self::leaf(rep, shown), |node, index| {
            let rep = snapshot.children(node.rep).get(index)?;
            let shown = live.children(node.shown).get(index)?;
            Some((*rep, *shown))
        })
    }

    /// Depth first construction, `child_at` yields the `(rep, shown)` pair of
    /// the n-th child.
    fn build(
        dom: &Dom,
        root: Self,
        child_at: impl Fn(&Self, usize) -> Option<(NodeId, NodeId)>,
    ) -> Self {
        let mut ancestors: Vec<Self> = Vec::new();
        let mut current = root;
        loop {
            match child_at(&current, current.children.len()) {
                Some((rep, shown)) => {
                    let child = Self::leaf(rep, shown);
                    ancestors.push(std::mem::replace(&mut current, child));
                }
                None => {
                    current.refresh_key(dom);
                    match ancestors.pop() {
                        Some(mut parent) => {
                            parent.children.push(current);
                            current = parent;
                        }
                        None => return current,
                    }
                }
            }
        }
    }

    /// Recomputes the key from the node data and the keys of the children.
    fn refresh_key(&mut self, dom: &Dom) {
        let mut hasher = DefaultHasher::new();
        match dom.data(self.rep) {
            NodeData::Element(element) => {
                element.tag.hash(&mut hasher);
                let mut attrs: Vec<_> = element
                    .attrs
                    .iter()
                    .filter(|attr| !(element.tag == "ol" && attr.name == "start"))
                    .map(|attr| (attr.name.as_str(), attr.value.as_str()))
                    .collect();
                attrs.sort_unstable();
                attrs.hash(&mut hasher);
            }
            NodeData::Text(text) => ("#text", text).hash(&mut hasher),
            NodeData::Comment(text) => ("#comment", text).hash(&mut hasher),
            NodeData::Fragment => "#fragment".hash(&mut hasher),
        }
        self.children.len().hash(&mut hasher);
        for child in &self.children {
            child.key.hash(&mut hasher);
        }
        self.key = hasher.finish();
    }
}

impl Drop for WrappedNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// The last rendered tree, owned by one updater.
#[derive(Debug)]
pub(crate) struct WrappedDomTree {
    pub(crate) snapshot: Dom,
    pub(crate) root: WrappedNode,
}

/// Bookkeeping of one diff application.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    /// Roots of the inserted live subtrees, in application order.
    pub(crate) inserted: Vec<NodeId>,
    /// Live nodes taken out of the tree, detached but still allocated.
    pub(crate) removed: Vec<NodeId>,
    pub(crate) last: Option<NodeId>,
    /// Single node swap of the first run of changes, as `(inserted, removed)`.
    pub(crate) replaced: Option<(NodeId, NodeId)>,
}

impl WrappedDomTree {
    /// Snapshots the subtree of `container`.
    pub(crate) fn new(live: &Dom, container: NodeId) -> Self {
        let mut snapshot = Dom::new();
        let rep = snapshot.import_node(live, container);
        let root = WrappedNode::pair(&snapshot, rep, live, container);
        Self { snapshot, root }
    }

    /// Patches `live` and the snapshot so both match `new_root`.
    pub(crate) fn diff_to(&mut self, live: &mut Dom, new_dom: &Dom, new_root: NodeId) -> Changes {
        let target = WrappedNode::wrap(new_dom, new_root);

        let mut differ = Differ {
            live,
            snapshot: &mut self.snapshot,
            new: new_dom,
            changes: Changes::default(),
            run: Run::default(),
        };

        if differ.cannot_patch(self.root.rep, target.rep) {
            // Even the roots differ, rebuild every child.
            differ.replace_children(&mut self.root, &target);
        } else {
            differ.patch(&mut self.root, &target);
        }

        let changes = differ.finish();
        tracing::trace!(
            inserted = changes.inserted.len(),
            removed = changes.removed.len(),
            "Applied preview diff"
        );
        changes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildOp {
    /// Old and new child are equal.
    Keep,
    Delete,
    Insert,
    /// Old child is patched in place into the new one.
    Patch,
}

/// State of the first contiguous run of deletions and insertions.
#[derive(Debug, Default)]
struct Run {
    deleted: Vec<NodeId>,
    inserted: Vec<NodeId>,
    sealed: bool,
}

impl Run {
    fn seal(&mut self) {
        if !self.deleted.is_empty() || !self.inserted.is_empty() {
            self.sealed = true;
        }
    }
}

/// A snapshot node whose children are being rewritten.
struct Frame<'t> {
    node: WrappedNode,
    ops: std::vec::IntoIter<ChildOp>,
    /// Old children not consumed yet.
    pending: Peekable<std::vec::IntoIter<WrappedNode>>,
    targets: std::slice::Iter<'t, WrappedNode>,
    /// New children, in order.
    children: Vec<WrappedNode>,
}

struct Differ<'a> {
    live: &'a mut Dom,
    snapshot: &'a mut Dom,
    new: &'a Dom,
    changes: Changes,
    run: Run,
}

impl Differ<'_> {
    /// Pairs that must be replaced as a whole.
    fn cannot_patch(&self, old: NodeId, new: NodeId) -> bool {
        let snapshot = &*self.snapshot;
        let (Some(old_tag), Some(new_tag)) = (snapshot.tag(old), self.new.tag(new)) else {
            return true;
        };
        if old_tag != new_tag || matches!(old_tag, "a" | "img") {
            return true;
        }
        if Widget::of(snapshot, old).is_opaque() || Widget::of(self.new, new).is_opaque() {
            return true;
        }

        // `ol[start]` is restored after the diff, everything else must match.
        let relevant = |dom: &Dom, id: NodeId| {
            dom.attrs(id)
                .iter()
                .filter(|attr| !(old_tag == "ol" && attr.name == "start"))
                .cloned()
                .collect::<Vec<_>>()
        };
        let (old_attrs, new_attrs) = (relevant(snapshot, old), relevant(self.new, new));
        old_attrs.len() != new_attrs.len() || old_attrs.iter().any(|attr| !new_attrs.contains(attr))
    }

    /// A same-tag pair is worth patching when some child survives, otherwise
    /// replacing it whole is as cheap.
    fn worth_patching(&self, old: &WrappedNode, new: &WrappedNode) -> bool {
        if self.cannot_patch(old.rep, new.rep) {
            return false;
        }
        let new_keys: HashSet<u64> = new.children.iter().map(|child| child.key).collect();
        old.children.iter().any(|child| new_keys.contains(&child.key))
    }

    /// Edit script turning the children of `old` into the children of `new`.
    fn plan_children(&self, old: &WrappedNode, new: &WrappedNode) -> Vec<ChildOp> {
        let old_keys: Vec<u64> = old.children.iter().map(|child| child.key).collect();
        let new_keys: Vec<u64> = new.children.iter().map(|child| child.key).collect();

        let mut ops = Vec::with_capacity(old_keys.len().max(new_keys.len()));
        for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            let olds = &old.children[old_range];
            let news = &new.children[new_range];
            match tag {
                DiffTag::Equal => {
                    for (old_child, new_child) in olds.iter().zip(news) {
                        // Keys leave out `ol[start]` and may collide.
                        if self.snapshot.is_equal_node(old_child.rep, self.new, new_child.rep) {
                            ops.push(ChildOp::Keep);
                        } else if !self.cannot_patch(old_child.rep, new_child.rep) {
                            ops.push(ChildOp::Patch);
                        } else {
                            ops.extend([ChildOp::Delete, ChildOp::Insert]);
                        }
                    }
                }
                DiffTag::Delete => ops.extend(std::iter::repeat(ChildOp::Delete).take(olds.len())),
                DiffTag::Insert => ops.extend(std::iter::repeat(ChildOp::Insert).take(news.len())),
                DiffTag::Replace => {
                    // Changed children are matched up in order.
                    for index in 0..olds.len().max(news.len()) {
                        match (olds.get(index), news.get(index)) {
                            (Some(old_child), Some(new_child))
                                if self.worth_patching(old_child, new_child) =>
                            {
                                ops.push(ChildOp::Patch)
                            }
                            (Some(_), Some(_)) => ops.extend([ChildOp::Delete, ChildOp::Insert]),
                            (Some(_), None) => ops.push(ChildOp::Delete),
                            (None, Some(_)) => ops.push(ChildOp::Insert),
                            (None, None) => {}
                        }
                    }
                }
            }
        }
        ops
    }

    fn open<'t>(&self, mut node: WrappedNode, target: &'t WrappedNode) -> Frame<'t> {
        let ops = self.plan_children(&node, target);
        let pending = std::mem::take(&mut node.children);
        Frame {
            node,
            ops: ops.into_iter(),
            pending: pending.into_iter().peekable(),
            targets: target.children.iter(),
            children: Vec::with_capacity(target.children.len()),
        }
    }

    /// Rewrites `root` into `target`, descending into patched children.
    fn patch(&mut self, root: &mut WrappedNode, target: &WrappedNode) {
        let node = std::mem::replace(root, WrappedNode::leaf(root.rep, root.shown));
        let mut stack = vec![self.open(node, target)];

        while let Some(frame) = stack.last_mut() {
            let Some(op) = frame.ops.next() else {
                self.run.seal();
                let Some(frame) = stack.pop() else {
                    break;
                };
                let mut node = frame.node;
                node.children = frame.children;
                node.refresh_key(self.snapshot);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => *root = node,
                }
                continue;
            };

            match op {
                ChildOp::Keep => {
                    self.run.seal();
                    if let (Some(child), Some(_)) = (frame.pending.next(), frame.targets.next()) {
                        frame.children.push(child);
                    }
                }
                ChildOp::Patch => {
                    self.run.seal();
                    if let (Some(child), Some(child_target)) =
                        (frame.pending.next(), frame.targets.next())
                    {
                        let child_frame = self.open(child, child_target);
                        stack.push(child_frame);
                    }
                }
                ChildOp::Delete => {
                    if let Some(child) = frame.pending.next() {
                        self.delete(child);
                    }
                }
                ChildOp::Insert => {
                    let Some(child_target) = frame.targets.next() else {
                        continue;
                    };
                    // Live-only siblings stay after the node they followed.
                    let (live_before, snapshot_before) = match frame.pending.peek() {
                        Some(next) => (Some(next.shown), Some(next.rep)),
                        None => (
                            frame
                                .children
                                .last()
                                .and_then(|previous| self.live.next_sibling(previous.shown)),
                            None,
                        ),
                    };
                    let parent = (frame.node.rep, frame.node.shown);
                    let child = self.insert(parent, child_target, live_before, snapshot_before);
                    frame.children.push(child);
                }
            }
        }
    }

    /// Drops every child of `old` and inserts every child of `new`.
    fn replace_children(&mut self, old: &mut WrappedNode, new: &WrappedNode) {
        for child in std::mem::take(&mut old.children) {
            self.delete(child);
        }
        let parent = (old.rep, old.shown);
        let children = new
            .children
            .iter()
            .map(|target| self.insert(parent, target, None, None))
            .collect();
        self.run.seal();
        old.children = children;
        old.refresh_key(self.snapshot);
    }

    fn delete(&mut self, child: WrappedNode) {
        tracing::trace!(node = %child.shown, "Removing preview node");
        self.live.detach(child.shown);
        self.snapshot.remove(child.rep);
        self.changes.removed.push(child.shown);
        if !self.run.sealed {
            self.run.deleted.push(child.shown);
        }
    }

    /// Inserts a copy of `target` under `parent`, given as `(rep, shown)`.
    fn insert(
        &mut self,
        (parent_rep, parent_shown): (NodeId, NodeId),
        target: &WrappedNode,
        live_before: Option<NodeId>,
        snapshot_before: Option<NodeId>,
    ) -> WrappedNode {
        let shown = self.live.import_node(self.new, target.rep);
        self.live.insert_before(parent_shown, shown, live_before);
        let rep = self.snapshot.import_node(self.new, target.rep);
        self.snapshot.insert_before(parent_rep, rep, snapshot_before);
        tracing::trace!(node = %shown, "Inserted preview node");

        self.changes.inserted.push(shown);
        self.changes.last = Some(shown);
        if !self.run.sealed {
            self.run.inserted.push(shown);
        }
        WrappedNode::pair(self.snapshot, rep, self.live, shown)
    }

    fn finish(mut self) -> Changes {
        if let ([inserted], [deleted]) = (self.run.inserted.as_slice(), self.run.deleted.as_slice()) {
            self.changes.replaced = Some((*inserted, *deleted));
        }
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preview_dom::Fragment;

    fn tree_of(html: &str) -> (Dom, NodeId, WrappedDomTree) {
        let fragment = Fragment::parse(html);
        let mut live = fragment.dom;
        let container = live.create_element("div");
        for child in live.children(fragment.root).to_vec() {
            live.append_child(container, child);
        }
        let tree = WrappedDomTree::new(&live, container);
        (live, container, tree)
    }

    fn target_of(html: &str) -> (Dom, NodeId) {
        let fragment = Fragment::parse(html);
        let mut dom = fragment.dom;
        let root = dom.create_element("div");
        for child in dom.children(fragment.root).to_vec() {
            dom.append_child(root, child);
        }
        (dom, root)
    }

    #[test]
    fn test_keys_follow_structure() {
        let key = |html: &str| {
            let (dom, root) = target_of(html);
            WrappedNode::wrap(&dom, root).key
        };
        let list = "<ul><li>a</li><li>b <em>c</em></li></ul>";
        assert_eq!(key(list), key(list));
        assert_eq!(
            key("<img src=\"a.png\" alt=\"a\">"),
            key("<img alt=\"a\" src=\"a.png\">")
        );
        assert_eq!(key("<ol start=\"2\"><li>a</li></ol>"), key("<ol><li>a</li></ol>"));
        assert_ne!(key(list), key("<ul><li>a</li><li>b <em>d</em></li></ul>"));
        assert_ne!(key("<p>a</p>"), key("<div>a</div>"));
        assert_ne!(key("<p>a</p>"), key("<p><!--a--></p>"));
    }

    #[test]
    fn test_diff_keeps_unchanged_nodes() {
        let (mut live, container, mut tree) = tree_of("<p>a</p><p>b</p><p>c</p>");
        let before = live.children(container).to_vec();

        let (new_dom, new_root) = target_of("<p>a</p><p>B</p><p>c</p>");
        let changes = tree.diff_to(&mut live, &new_dom, new_root);

        let after = live.children(container).to_vec();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_ne!(after[1], before[1]);
        assert_eq!(changes.inserted, vec![after[1]]);
        assert_eq!(changes.removed, vec![before[1]]);
        assert_eq!(changes.replaced, Some((after[1], before[1])));
        assert_eq!(changes.last, Some(after[1]));
        assert!(tree.snapshot.is_equal_node(tree.root.rep, &new_dom, new_root));
        assert!(live.is_equal_node(container, &new_dom, new_root));
    }

    #[test]
    fn test_diff_patches_large_containers() {
        let (mut live, container, mut tree) =
            tree_of("<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>");
        let ul = live.children(container)[0];
        let items = live.children(ul).to_vec();

        let (new_dom, new_root) = target_of("<ul><li>a</li><li>x</li><li>c</li><li>d</li><li>e</li></ul>");
        let changes = tree.diff_to(&mut live, &new_dom, new_root);

        assert_eq!(live.children(container)[0], ul);
        let now = live.children(ul).to_vec();
        assert_eq!(now.len(), 5);
        assert_eq!(now[0], items[0]);
        assert_eq!(now[2], items[2]);
        assert_eq!(now[3], items[3]);
        assert_eq!(changes.inserted, vec![now[1], now[4]]);
        assert_eq!(changes.replaced, Some((now[1], items[1])));
        assert_eq!(changes.last, Some(now[4]));
        assert!(live.is_equal_node(container, &new_dom, new_root));
    }

    #[test]
    fn test_diff_pure_insertion_has_no_replacement() {
        let (mut live, container, mut tree) = tree_of("<p>a</p>");
        let (new_dom, new_root) = target_of("<p>a</p><p>b</p>");
        let changes = tree.diff_to(&mut live, &new_dom, new_root);

        assert_eq!(changes.inserted.len(), 1);
        assert!(changes.removed.is_empty());
        assert_eq!(changes.replaced, None);
        assert_eq!(live.text_content(container), "ab");
    }

    #[test]
    fn test_attribute_change_replaces_element() {
        let (mut live, container, mut tree) = tree_of("<h1 id=\"a\">Title</h1>");
        let heading = live.children(container)[0];
        let (new_dom, new_root) = target_of("<h1 id=\"b\">Title</h1>");
        tree.diff_to(&mut live, &new_dom, new_root);

        let now = live.children(container)[0];
        assert_ne!(now, heading);
        assert_eq!(live.attr(now, "id"), Some("b"));
    }

    #[test]
    fn test_ordered_list_start_is_ignored_by_the_diff() {
        let (mut live, container, mut tree) = tree_of("<ol start=\"2\"><li>a</li></ol>");
        let ol = live.children(container)[0];
        let (new_dom, new_root) = target_of("<ol start=\"5\"><li>a</li></ol>");
        let changes = tree.diff_to(&mut live, &new_dom, new_root);

        assert_eq!(live.children(container)[0], ol);
        assert!(changes.inserted.is_empty());
    }

    #[test]
    fn test_live_only_nodes_survive_patches() {
        let (mut live, container, mut tree) = tree_of("<blockquote><p>a</p></blockquote>");
        let quote = live.children(container)[0];
        // Something outside the diff appends to the live tree.
        let extra = live.create_element("aside");
        live.append_child(quote, extra);

        let (new_dom, new_root) = target_of("<blockquote><p>a</p><p>b</p></blockquote>");
        tree.diff_to(&mut live, &new_dom, new_root);

        let tags: Vec<_> = live
            .children(quote)
            .iter()
            .map(|&child| live.tag(child).unwrap_or_default().to_string())
            .collect();
        assert_eq!(tags, ["p", "p", "aside"]);
    }
}
