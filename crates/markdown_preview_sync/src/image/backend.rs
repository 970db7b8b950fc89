//! File watching backends for [`ImageWatcher`](super::ImageWatcher).

use crate::error::WatchError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Changed,
    Deleted,
    Renamed,
}

pub type EventSender = UnboundedSender<(PathBuf, FileEvent)>;

/// A live watch, dropping it stops the watch.
pub trait FileSubscription: Send {}

/// Source of file change notifications.
pub trait FileWatch {
    /// Whether `path` exists and is a regular file.
    fn is_regular_file(&self, path: &Path) -> bool;

    /// Starts reporting events of `path` through `sender`, tagged with `path`.
    fn subscribe(
        &self,
        path: &Path,
        sender: EventSender,
    ) -> Result<Box<dyn FileSubscription>, WatchError>;
}

/// [`FileWatch`] backed by the platform watcher of `notify`.
///
/// Each subscription watches the parent directory of the file, so editors
/// saving through a rename are still observed.
#[derive(Debug, Clone)]
pub struct NotifyFileWatch {
    poll_interval: Duration,
}

impl Default for NotifyFileWatch {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl NotifyFileWatch {
    /// Interval used when the platform falls back to polling.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

struct NotifySubscription {
    _watcher: RecommendedWatcher,
}

impl FileSubscription for NotifySubscription {}

impl FileWatch for NotifyFileWatch {
    fn is_regular_file(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|metadata| metadata.file_type().is_file())
            .unwrap_or(false)
    }

    fn subscribe(
        &self,
        path: &Path,
        sender: EventSender,
    ) -> Result<Box<dyn FileSubscription>, WatchError> {
        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(WatchError::NoParent(path.to_path_buf()));
        };
        let watched = path.to_path_buf();
        let file_name = file_name.to_os_string();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(file_event) = classify(&event, &file_name) {
                    tracing::trace!(path = ?watched, ?file_event, "Image file event");
                    // The receiver is gone once the watcher has been disposed.
                    let _ = sender.send((watched.clone(), file_event));
                }
            }
            Err(err) => {
                tracing::error!(?err, path = ?watched, "Image watcher error");
            }
        };

        let notify_error = |source| WatchError::Notify {
            path: path.to_path_buf(),
            source,
        };
        let mut watcher = RecommendedWatcher::new(
            handler,
            notify::Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(notify_error)?;
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .map_err(notify_error)?;

        tracing::debug!(?path, "Watching image");

        Ok(Box::new(NotifySubscription { _watcher: watcher }))
    }
}

fn names_file(path: &Path, file_name: &OsString) -> bool {
    path.file_name() == Some(file_name.as_os_str())
}

/// Maps a raw directory event onto what it means for the file `file_name`.
fn classify(event: &Event, file_name: &OsString) -> Option<FileEvent> {
    let ours = event.paths.iter().position(|path| names_file(path, file_name))?;

    match &event.kind {
        EventKind::Create(_) => Some(FileEvent::Changed),
        EventKind::Remove(_) => Some(FileEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            // Something was moved onto the file, e.g. an atomic save.
            RenameMode::To => Some(FileEvent::Changed),
            RenameMode::From => Some(FileEvent::Renamed),
            RenameMode::Both if ours == 0 => Some(FileEvent::Renamed),
            RenameMode::Both => Some(FileEvent::Changed),
            RenameMode::Any | RenameMode::Other => {
                if event.paths[ours].is_file() {
                    Some(FileEvent::Changed)
                } else {
                    Some(FileEvent::Renamed)
                }
            }
        },
        EventKind::Modify(_) => Some(FileEvent::Changed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_classify_events() {
        let name = OsString::from("logo.png");
        let modify = || EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert_eq!(
            classify(&event(modify(), &["/img/logo.png"]), &name),
            Some(FileEvent::Changed)
        );
        assert_eq!(classify(&event(modify(), &["/img/other.png"]), &name), None);
        assert_eq!(
            classify(&event(EventKind::Create(CreateKind::File), &["/img/logo.png"]), &name),
            Some(FileEvent::Changed)
        );
        assert_eq!(
            classify(&event(EventKind::Remove(RemoveKind::File), &["/img/logo.png"]), &name),
            Some(FileEvent::Deleted)
        );

        let both = || EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert_eq!(
            classify(&event(both(), &["/img/logo.png", "/img/moved.png"]), &name),
            Some(FileEvent::Renamed)
        );
        assert_eq!(
            classify(&event(both(), &["/img/.logo.png.tmp", "/img/logo.png"]), &name),
            Some(FileEvent::Changed)
        );
    }

    #[test]
    fn test_is_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();

        let backend = NotifyFileWatch::default();
        assert!(backend.is_regular_file(&file));
        assert!(!backend.is_regular_file(dir.path()));
        assert!(!backend.is_regular_file(&dir.path().join("missing.png")));
    }

    #[tokio::test]
    #[ignore = "depends on filesystem notification timing"]
    async fn test_notify_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"v1").unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let backend = NotifyFileWatch::with_poll_interval(Duration::from_millis(50));
        let _subscription = backend.subscribe(&file, tx).unwrap();

        std::fs::write(&file, b"v2").unwrap();
        let (path, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, file);
        assert_eq!(event, FileEvent::Changed);
    }
}
