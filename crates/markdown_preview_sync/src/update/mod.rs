//! Incremental preview updates.
//!
//! [`UpdatePreview`] owns the live preview DOM. Every render is handed over
//! as a detached [`Fragment`] and merged into the live tree with the smallest
//! patch the diff finds, so unchanged blocks keep their identity (and any
//! state attached to them, such as typeset math).

mod wrapped_tree;

use self::wrapped_tree::WrappedDomTree;
use crate::error::MathError;
use crate::widget::{CODE_BLOCK_CLASS, CODE_BLOCK_TAG, PREVIEW_ROOT_CLASS};
use preview_dom::{Dom, Fragment, NodeId};
use serde::Serialize;

/// Typesets math in freshly inserted preview content.
///
/// Only the subtrees listed in `nodes` are new, everything else has already
/// been typeset by an earlier call.
pub trait MathProcessor {
    fn typeset(&mut self, dom: &mut Dom, nodes: &[NodeId]) -> Result<(), MathError>;
}

impl<F> MathProcessor for F
where
    F: FnMut(&mut Dom, &[NodeId]) -> Result<(), MathError>,
{
    fn typeset(&mut self, dom: &mut Dom, nodes: &[NodeId]) -> Result<(), MathError> {
        self(dom, nodes)
    }
}

/// A single element of the previous render replaced by a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Replacement {
    /// The inserted live node.
    pub cur: NodeId,
    /// The removed live node, detached until the next update.
    pub prev: NodeId,
}

/// Outcome of [`UpdatePreview::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// Freshly inserted live elements, post-processing only needs to visit
    /// these.
    pub inserted: Vec<NodeId>,
    /// Set when the first change swapped exactly one node for another.
    pub possible_replace: Option<Replacement>,
    /// The last node inserted.
    pub last: Option<NodeId>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.possible_replace.is_none() && self.last.is_none()
    }
}

/// Exclusive owner of one preview container.
///
/// Updates must not overlap, which `&mut self` guarantees.
pub struct UpdatePreview {
    dom: Dom,
    container: NodeId,
    tree: WrappedDomTree,
    rendered_once: bool,
    /// Live nodes removed by the last update.
    removed: Vec<NodeId>,
    math: Option<Box<dyn MathProcessor>>,
}

impl std::fmt::Debug for UpdatePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePreview")
            .field("container", &self.container)
            .field("rendered_once", &self.rendered_once)
            .field("removed", &self.removed.len())
            .field("math", &self.math.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for UpdatePreview {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatePreview {
    /// Creates an updater over a fresh `<div class="update-preview">`.
    pub fn new() -> Self {
        let mut dom = Dom::new();
        let container = dom.create_element("div");
        dom.set_attr(container, "class", PREVIEW_ROOT_CLASS);
        Self::attach(dom, container)
    }

    /// Takes over `container` of `dom`, whatever it currently shows becomes the
    /// state the first update diffs against.
    pub fn attach(dom: Dom, container: NodeId) -> Self {
        let tree = WrappedDomTree::new(&dom, container);
        Self {
            dom,
            container,
            tree,
            rendered_once: false,
            removed: Vec::new(),
            math: None,
        }
    }

    pub fn with_math_processor(mut self, processor: impl MathProcessor + 'static) -> Self {
        self.math = Some(Box::new(processor));
        self
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Mutable access to the live tree.
    ///
    /// Edits are not recorded in the snapshot, the next update still diffs
    /// against the last render. Restrict them to attribute changes and
    /// content inside opaque widgets.
    pub fn live_dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// Releases the live tree.
    pub fn into_dom(self) -> Dom {
        self.dom
    }

    pub fn inner_html(&self) -> String {
        self.dom.inner_html(self.container)
    }

    /// Merges `fragment`, the complete new render, into the live preview.
    pub fn update(&mut self, fragment: Fragment, math_enabled: bool) -> DiffResult {
        self.reap_removed();

        let Fragment {
            dom: mut new_dom,
            root,
        } = fragment;
        wrap_code_blocks(&mut new_dom, root);
        let new_root = self.wrap_in_root(&mut new_dom, root);

        let snapshot_root = self.tree.root.rep;
        if self.rendered_once
            && self
                .tree
                .snapshot
                .is_equal_node(snapshot_root, &new_dom, new_root)
        {
            tracing::trace!("Preview unchanged, skipping update");
            return DiffResult::default();
        }

        let changes = self.tree.diff_to(&mut self.dom, &new_dom, new_root);
        let first_time = !self.rendered_once;
        self.rendered_once = true;
        self.removed = changes.removed;

        let (possible_replace, last) = if first_time {
            (None, None)
        } else {
            (
                changes
                    .replaced
                    .map(|(cur, prev)| Replacement { cur, prev }),
                changes.last,
            )
        };

        self.sync_ordered_list_starts(&new_dom, new_root);

        let inserted = if math_enabled {
            self.lift_to_content(&changes.inserted)
        } else {
            changes
                .inserted
                .into_iter()
                .filter(|&node| self.dom.is_element(node))
                .collect()
        };

        tracing::debug!(
            inserted = inserted.len(),
            removed = self.removed.len(),
            first_time,
            "Updated preview"
        );

        if math_enabled && !inserted.is_empty() {
            if let Some(processor) = self.math.as_mut() {
                if let Err(err) = processor.typeset(&mut self.dom, &inserted) {
                    tracing::warn!(?err, "Failed to typeset math in the preview");
                }
            }
        }

        DiffResult {
            inserted,
            possible_replace,
            last,
        }
    }

    fn reap_removed(&mut self) {
        for node in self.removed.drain(..) {
            if self.dom.contains(node) && self.dom.parent(node).is_none() {
                self.dom.remove(node);
            }
        }
    }

    /// Moves the fragment's children under a copy of the container element.
    fn wrap_in_root(&self, new_dom: &mut Dom, fragment_root: NodeId) -> NodeId {
        let snapshot = &self.tree.snapshot;
        let rep = self.tree.root.rep;

        let root = new_dom.create_element(snapshot.tag(rep).unwrap_or("div"));
        for attr in snapshot.attrs(rep) {
            new_dom.set_attr(root, &attr.name, &attr.value);
        }
        for child in new_dom.children(fragment_root).to_vec() {
            new_dom.append_child(root, child);
        }
        root
    }

    /// Copies `ol[start]` from the new render onto the lists at the same
    /// document position, the diff ignores that attribute.
    fn sync_ordered_list_starts(&mut self, new_dom: &Dom, new_root: NodeId) {
        let new_lists = new_dom.elements_by_tag(new_root, "ol");
        let live_lists = self.dom.elements_by_tag(self.container, "ol");
        let snapshot_lists = self
            .tree
            .snapshot
            .elements_by_tag(self.tree.root.rep, "ol");

        for (index, &list) in new_lists.iter().enumerate() {
            let start = new_dom.attr(list, "start");
            if let Some(&live) = live_lists.get(index) {
                copy_start(&mut self.dom, live, start);
            }
            if let Some(&rep) = snapshot_lists.get(index) {
                copy_start(&mut self.tree.snapshot, rep, start);
            }
        }
    }

    /// Replaces every inserted node by its closest element with content, so
    /// math split across text runs is typeset as a whole. Text nodes, blank
    /// ones included, always lift to their parent.
    fn lift_to_content(&self, inserted: &[NodeId]) -> Vec<NodeId> {
        let mut lifted = Vec::with_capacity(inserted.len());
        for &node in inserted {
            let target = std::iter::once(node)
                .chain(self.dom.ancestors(node))
                .find(|&candidate| {
                    self.dom.is_element(candidate) && !self.dom.children(candidate).is_empty()
                });
            if let Some(target) = target {
                if !lifted.contains(&target) {
                    lifted.push(target);
                }
            }
        }
        lifted
    }
}

fn copy_start(dom: &mut Dom, list: NodeId, start: Option<&str>) {
    match start {
        Some(start) if dom.attr(list, "start") != Some(start) => dom.set_attr(list, "start", start),
        Some(_) => {}
        None => {
            dom.remove_attr(list, "start");
        }
    }
}

/// Wraps every `<pre>` so embedded code editors get a stable parent.
fn wrap_code_blocks(dom: &mut Dom, root: NodeId) {
    for pre in dom.elements_by_tag(root, "pre") {
        let Some(parent) = dom.parent(pre) else {
            continue;
        };
        let wrapper = dom.create_element(CODE_BLOCK_TAG);
        dom.set_attr(wrapper, "class", CODE_BLOCK_CLASS);
        dom.insert_before(parent, wrapper, Some(pre));
        dom.append_child(wrapper, pre);
    }
}
