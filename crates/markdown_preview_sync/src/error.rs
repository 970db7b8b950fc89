use preview_dom::NodeId;
use std::path::PathBuf;

/// The live DOM no longer agrees with the shape the sync engine expects.
///
/// Returned when walking up from an element fails, which means the caller
/// handed in a node that is not part of the preview or the tree was mutated
/// behind the updater's back.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0} is not attached below the preview container")]
    Detached(NodeId),
    #[error("{child} is missing from the children of its parent {parent}")]
    NotAChild { child: NodeId, parent: NodeId },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("{0} has no parent directory to watch")]
    NoParent(PathBuf),
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Error reported by a [`MathProcessor`](crate::MathProcessor).
#[derive(Debug, thiserror::Error)]
#[error("math typesetting failed: {0}")]
pub struct MathError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
