//! One preview pane: render, diff, image cache busting and scroll sync.

use crate::config::Config;
use crate::error::{PreviewError, SyncError};
use crate::image::{apply_image_version, stamp_image_versions, FileWatch, ImageWatcher};
use crate::line_map::LineMap;
use crate::render::{render, RenderOptions, Rendered};
use crate::sync::{element_for_path, line_for_element};
use crate::token::Token;
use crate::update::{DiffResult, MathProcessor, UpdatePreview};
use preview_dom::{Fragment, NodeId};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

type ImageChange = (PathBuf, Option<u64>);

/// Drives the preview of a single document.
///
/// Renders go through `&mut self`, so they are processed one at a time and in
/// the order they were requested.
pub struct PreviewSession<W> {
    options: RenderOptions,
    sync_enabled: bool,
    image_watch_enabled: bool,
    /// Directory relative image paths are resolved against.
    base_dir: Option<PathBuf>,
    preview: UpdatePreview,
    images: ImageWatcher<W>,
    image_changes: UnboundedReceiver<ImageChange>,
    tokens: Vec<Token>,
    line_map: LineMap,
}

impl<W: FileWatch> PreviewSession<W> {
    pub fn new(backend: W, config: &Config) -> Self {
        let (changes_tx, image_changes) = unbounded_channel();
        let images = ImageWatcher::new(backend, move |path: &Path, version| {
            // The session owns the receiver, it outlives the watcher.
            let _ = changes_tx.send((path.to_path_buf(), version));
        });

        Self {
            options: config.render.clone(),
            sync_enabled: config.sync.enable,
            image_watch_enabled: config.image_watch.enable,
            base_dir: None,
            preview: UpdatePreview::new(),
            images,
            image_changes,
            tokens: Vec::new(),
            line_map: LineMap::default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_math_processor(mut self, processor: impl MathProcessor + 'static) -> Self {
        self.preview = std::mem::take(&mut self.preview).with_math_processor(processor);
        self
    }

    /// Renders `source` and merges the result into the live preview.
    pub fn render(&mut self, source: &str) -> DiffResult {
        let Rendered { html, tokens } = render(source, &self.options);
        let mut fragment = Fragment::parse(&html);

        if self.image_watch_enabled {
            self.images.track();
            let stamped = stamp_image_versions(
                &mut fragment.dom,
                fragment.root,
                self.base_dir.as_deref(),
                &mut self.images,
            );
            self.images.untrack();
            tracing::trace!(stamped, "Stamped image versions");
        }

        let result = self.preview.update(fragment, self.options.math);

        if self.sync_enabled {
            self.line_map = LineMap::build(&tokens);
        }
        self.tokens = tokens;

        result
    }

    /// Reads and renders `path`, images are resolved against its directory
    /// unless a base directory was set.
    pub fn render_file(&mut self, path: &Path) -> Result<DiffResult, PreviewError> {
        let source = std::fs::read_to_string(path).map_err(|source| PreviewError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if self.base_dir.is_none() {
            self.base_dir = path.parent().map(Path::to_path_buf);
        }
        Ok(self.render(&source))
    }

    /// Preview element rendering source `line`.
    pub fn element_for_line(&self, line: usize) -> Option<NodeId> {
        if !self.sync_enabled {
            return None;
        }
        let path = self.line_map.path(line);
        if path.is_empty() {
            return None;
        }
        element_for_path(self.preview.dom(), self.preview.container(), path)
    }

    /// Source line rendered by the preview `element`.
    pub fn line_for_element(&self, element: NodeId) -> Result<Option<usize>, SyncError> {
        if !self.sync_enabled {
            return Ok(None);
        }
        line_for_element(
            &self.tokens,
            self.preview.dom(),
            self.preview.container(),
            element,
        )
    }

    /// Delivers pending image file events and rewrites the affected `src`
    /// attributes in place. Returns the number of rewritten images.
    pub fn apply_image_changes(&mut self) -> usize {
        if self.images.process_events() == 0 {
            return 0;
        }

        let container = self.preview.container();
        let base_dir = self.base_dir.as_deref();
        let dom = self.preview.live_dom_mut();

        let mut rewritten = 0;
        while let Ok((path, version)) = self.image_changes.try_recv() {
            rewritten += apply_image_version(dom, container, base_dir, &path, version);
        }
        if rewritten > 0 {
            tracing::debug!(rewritten, "Refreshed changed images");
        }
        rewritten
    }

    pub fn preview(&self) -> &UpdatePreview {
        &self.preview
    }

    pub fn html(&self) -> String {
        self.preview.inner_html()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    pub fn images(&self) -> &ImageWatcher<W> {
        &self.images
    }

    /// Stops watching every image.
    pub fn dispose(&mut self) {
        self.images.dispose();
    }
}
