//! Cache busting for local images shown in the preview.
//!
//! Every local `<img>` of a render is registered with [`ImageWatcher::watch`]
//! and gets a `?v=<version>` suffix. When the file changes the version is
//! bumped and the change callback fires, letting the view rewrite the `src`
//! so the image is fetched again.

mod backend;
mod src;

pub use self::backend::{EventSender, FileEvent, FileSubscription, FileWatch, NotifyFileWatch};
pub use self::src::{apply_image_version, resolve_image_path, stamp_image_versions, strip_version};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Callback invoked with the new version of a changed image, or `None` once
/// the image is gone.
pub type ChangeCallback = Box<dyn FnMut(&Path, Option<u64>) + Send>;

struct Entry {
    version: u64,
    /// Referenced since the last [`ImageWatcher::track`].
    seen: bool,
    _subscription: Box<dyn FileSubscription>,
}

/// Registry of the images referenced by the current preview.
pub struct ImageWatcher<W> {
    backend: W,
    registry: HashMap<PathBuf, Entry>,
    events_tx: EventSender,
    events_rx: UnboundedReceiver<(PathBuf, FileEvent)>,
    on_change: ChangeCallback,
    disposed: bool,
}

impl<W> std::fmt::Debug for ImageWatcher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageWatcher")
            .field("watching", &self.registry.len())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

impl<W: FileWatch> ImageWatcher<W> {
    pub fn new(backend: W, on_change: impl FnMut(&Path, Option<u64>) + Send + 'static) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            backend,
            registry: HashMap::new(),
            events_tx,
            events_rx,
            on_change: Box::new(on_change),
            disposed: false,
        }
    }

    /// Registers `path` and returns its current version.
    ///
    /// Returns `None` when `path` is not an existing regular file, or when the
    /// watcher has been disposed.
    pub fn watch(&mut self, path: &Path) -> Option<u64> {
        if self.disposed {
            return None;
        }
        if let Some(entry) = self.registry.get_mut(path) {
            entry.seen = true;
            return Some(entry.version);
        }
        if !self.backend.is_regular_file(path) {
            return None;
        }

        let subscription = match self.backend.subscribe(path, self.events_tx.clone()) {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!(?err, ?path, "Failed to watch image");
                return None;
            }
        };
        let version = now_millis();
        self.registry.insert(
            path.to_path_buf(),
            Entry {
                version,
                seen: true,
                _subscription: subscription,
            },
        );
        Some(version)
    }

    /// Starts a render pass, every image must be watched again to stay alive.
    pub fn track(&mut self) {
        for entry in self.registry.values_mut() {
            entry.seen = false;
        }
    }

    /// Ends a render pass and drops the watches of unreferenced images.
    pub fn untrack(&mut self) {
        let before = self.registry.len();
        self.registry.retain(|_, entry| entry.seen);
        let dropped = before - self.registry.len();
        if dropped > 0 {
            tracing::debug!(dropped, watching = self.registry.len(), "Dropped stale image watches");
        }
    }

    /// Handles every pending file event, returns how many were delivered.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((path, event)) = self.events_rx.try_recv() {
            if self.handle_event(&path, event) {
                handled += 1;
            }
        }
        handled
    }

    /// Applies one file event, returns `false` for stale events of images no
    /// longer watched.
    pub fn handle_event(&mut self, path: &Path, event: FileEvent) -> bool {
        if self.disposed {
            return false;
        }
        match event {
            FileEvent::Changed => {
                let Some(entry) = self.registry.get_mut(path) else {
                    return false;
                };
                entry.version = now_millis().max(entry.version + 1);
                let version = entry.version;
                (self.on_change)(path, Some(version));
            }
            FileEvent::Deleted | FileEvent::Renamed => {
                if self.registry.remove(path).is_none() {
                    return false;
                }
                (self.on_change)(path, None);
            }
        }
        tracing::debug!(?path, ?event, "Image changed");
        true
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.registry.get(path).map(|entry| entry.version)
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.registry.contains_key(path)
    }

    /// Paths currently watched.
    pub fn watched(&self) -> impl Iterator<Item = &Path> {
        self.registry.keys().map(PathBuf::as_path)
    }

    /// Drops every watch. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.registry.clear();
        self.events_rx.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
