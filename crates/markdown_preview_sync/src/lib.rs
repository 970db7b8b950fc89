//! Incremental Markdown preview with source/preview scroll synchronization.
//!
//! - [`UpdatePreview`] merges each new render into the live preview DOM,
//!   touching only what changed and reporting the freshly inserted nodes.
//! - [`path_to_token`] and [`path_to_element`] map a source line and a
//!   preview element onto the same `(tag, index)` path, which is what links
//!   both scroll directions.
//! - [`ImageWatcher`] versions local images so the preview refetches them
//!   when they change on disk.
//! - [`PreviewSession`] ties these together for one preview pane.
//!
//! ```
//! use markdown_preview_sync::{path_to_token, render, PathEntry, RenderOptions};
//!
//! let rendered = render("# Title\n\nSome *text*.\n", &RenderOptions::default());
//! assert_eq!(path_to_token(&rendered.tokens, 2), vec![PathEntry::new("p", 0)]);
//! ```

pub mod config;
mod error;
pub mod image;
mod line_map;
pub mod render;
mod session;
mod sync;
mod token;
mod update;
mod widget;

pub use self::config::{load_config, Config, LoadedConfig};
pub use self::error::{ConfigError, MathError, PreviewError, SyncError, WatchError};
pub use self::image::{FileEvent, FileWatch, ImageWatcher, NotifyFileWatch};
pub use self::line_map::LineMap;
pub use self::render::{render, RenderOptions, Rendered};
pub use self::session::PreviewSession;
pub use self::sync::{
    decode_tag, element_for_path, encode_tag, line_for_element, line_for_path, path_to_element,
    path_to_token, PathEntry,
};
pub use self::token::{Nesting, Token};
pub use self::update::{DiffResult, MathProcessor, Replacement, UpdatePreview};
pub use self::widget::{Widget, CODE_BLOCK_CLASS, CODE_BLOCK_TAG, MATH_CLASS, PREVIEW_ROOT_CLASS};
pub use preview_dom::{Dom, Fragment, NodeId};
