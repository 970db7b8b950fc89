//! Arena DOM used by the markdown preview.
//!
//! The preview engine needs a browser-like DOM it can diff against and patch in
//! place. This crate provides one:
//!
//! - [`Dom`] - an arena of nodes addressed by copyable [`NodeId`]s, with the
//!   structural and attribute operations the preview needs
//! - [`Dom::is_equal_node`] - DOM-standard deep equality, also across arenas
//! - [`Dom::import_node`] - deep clone of a subtree from another arena
//! - [`Fragment`] - a detached tree parsed from an HTML string with html5ever
//! - [`Dom::inner_html`] / [`Dom::outer_html`] - HTML serialization
//!
//! # Example
//!
//! ```
//! use preview_dom::Fragment;
//!
//! let fragment = Fragment::parse("<h1>Title</h1><p>Some <em>text</em>.</p>");
//! let paragraphs = fragment.dom.elements_by_tag(fragment.root, "p");
//! assert_eq!(paragraphs.len(), 1);
//! assert_eq!(fragment.dom.text_content(paragraphs[0]), "Some text.");
//! ```

mod node;
mod parse;
mod serialize;
mod tree;

pub use node::{Attribute, ElementData, NodeData, NodeId};
pub use parse::Fragment;
pub use tree::{Descendants, Dom};
