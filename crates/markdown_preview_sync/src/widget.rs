//! Opaque widgets embedded in the preview.
//!
//! The token stream knows nothing about the DOM a math renderer or an
//! embedded code editor produces, so sync treats those subtrees as a single
//! leaf.

use preview_dom::{Dom, NodeId};

/// Class of the preview container.
pub const PREVIEW_ROOT_CLASS: &str = "update-preview";
/// Class marking a rendered math block.
pub const MATH_CLASS: &str = "math";
/// Element wrapping every `<pre>` so embedded editors have a stable parent.
pub const CODE_BLOCK_TAG: &str = "span";
pub const CODE_BLOCK_CLASS: &str = "code-block";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Math,
    EmbeddedCode,
    Plain,
}

impl Widget {
    pub fn of(dom: &Dom, node: NodeId) -> Self {
        if !dom.is_element(node) {
            Self::Plain
        } else if dom.has_class(node, MATH_CLASS) {
            Self::Math
        } else if dom.tag(node) == Some(CODE_BLOCK_TAG) && dom.has_class(node, CODE_BLOCK_CLASS) {
            Self::EmbeddedCode
        } else {
            Self::Plain
        }
    }

    /// Whether the widget's inner structure is invisible to sync and diffing.
    pub fn is_opaque(self) -> bool {
        !matches!(self, Self::Plain)
    }
}
