use super::{oneshot_session, println_json, read_source};
use anyhow::Result;
use clap::Parser;
use markdown_preview_sync::{path_to_element, Config};
use serde_json::json;
use std::path::PathBuf;

/// Walks one line through both sync directions.
///
/// Prints the element the line scrolls the preview to, its path and the line
/// a click on that element scrolls the source back to.
#[derive(Parser, Debug, Clone)]
pub struct SyncSource {
    /// Markdown file.
    file: PathBuf,

    /// 0-based source line.
    line: usize,
}

impl SyncSource {
    pub fn run(&self, config: &Config) -> Result<()> {
        let mut session = oneshot_session(config, &self.file);
        session.render(&read_source(&self.file)?);

        let Some(element) = session.element_for_line(self.line) else {
            tracing::debug!(line = self.line, "No preview element for line");
            return println_json(&json!({ "line": self.line, "element": null }));
        };

        let dom = session.preview().dom();
        let path = path_to_element(dom, session.preview().container(), element)?;
        let recovered = session.line_for_element(element)?;

        println_json(&json!({
            "line": self.line,
            "element": dom.outer_html(element),
            "path": path,
            "recovered_line": recovered,
        }))
    }
}
