pub mod diff;
pub mod inspect;
pub mod sync_source;
pub mod watch;

use anyhow::{Context, Result};
use markdown_preview_sync::{Config, NotifyFileWatch, PreviewSession};
use serde::Serialize;
use std::path::Path;

pub(crate) fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// A session for one-shot commands, images are not watched.
pub(crate) fn oneshot_session(config: &Config, file: &Path) -> PreviewSession<NotifyFileWatch> {
    let mut config = config.clone();
    config.image_watch.enable = false;
    let session = PreviewSession::new(NotifyFileWatch::default(), &config);
    match file.parent() {
        Some(dir) => session.with_base_dir(dir),
        None => session,
    }
}

pub(crate) fn println_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
