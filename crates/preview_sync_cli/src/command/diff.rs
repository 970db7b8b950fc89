use super::{oneshot_session, println_json, read_source};
use anyhow::Result;
use clap::Parser;
use markdown_preview_sync::Config;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct Diff {
    /// Document shown first.
    old: PathBuf,

    /// Document the preview is updated to.
    new: PathBuf,
}

impl Diff {
    pub fn run(&self, config: &Config) -> Result<()> {
        let mut session = oneshot_session(config, &self.new);
        session.render(&read_source(&self.old)?);
        let result = session.render(&read_source(&self.new)?);

        let dom = session.preview().dom();
        println_json(&json!({
            "inserted": result
                .inserted
                .iter()
                .map(|&node| dom.outer_html(node))
                .collect::<Vec<_>>(),
            "possible_replace": result.possible_replace.map(|replacement| json!({
                "cur": dom.outer_html(replacement.cur),
                "prev": dom.outer_html(replacement.prev),
            })),
            "last": result.last.map(|node| dom.outer_html(node)),
        }))
    }
}
