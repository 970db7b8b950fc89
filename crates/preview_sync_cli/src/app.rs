use crate::command;
use crate::logging;
use anyhow::Result;
use clap::Parser;
use markdown_preview_sync::{load_config, Config, LoadedConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub enum RunCmd {
    /// Render a markdown file and print the preview HTML.
    #[clap(name = "render")]
    Render(command::inspect::Render),
    /// Print the block token stream of a markdown file as JSON.
    #[clap(name = "tokens")]
    Tokens(command::inspect::Tokens),
    /// Print the preview path of a source line.
    #[clap(name = "path")]
    Path(command::inspect::Path),
    /// Print the preview path of every source line.
    #[clap(name = "line-map")]
    LineMap(command::inspect::LineMap),
    /// Resolve a source line to its preview element and back.
    #[clap(name = "sync-source")]
    SyncSource(command::sync_source::SyncSource),
    /// Render two versions of a document and print the preview patch.
    #[clap(name = "diff")]
    Diff(command::diff::Diff),
    /// Re-render a markdown file whenever it or one of its images changes.
    #[clap(name = "watch")]
    Watch(command::watch::Watch),
}

/// Markdown preview sync CLI arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Enable the logging system.
    #[clap(long)]
    pub log: Option<PathBuf>,

    /// Specify the path of the config file.
    #[clap(long = "config")]
    pub config_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(name = "preview-sync", version)]
pub struct App {
    #[clap(flatten)]
    pub args: Args,

    #[clap(subcommand)]
    pub cmd: RunCmd,
}

impl App {
    pub async fn run(self) -> Result<()> {
        let LoadedConfig {
            config,
            file_path,
            maybe_error,
        } = load_config(self.args.config_file.as_deref());

        let _guard = logging::init(self.args.log.as_deref(), &config.log)?;

        if let Some(err) = maybe_error {
            tracing::warn!(?file_path, "Falling back to the default config: {err}");
        }

        self.cmd.run(config).await
    }
}

impl RunCmd {
    async fn run(self, config: Config) -> Result<()> {
        match self {
            Self::Render(render) => render.run(&config),
            Self::Tokens(tokens) => tokens.run(&config),
            Self::Path(path) => path.run(&config),
            Self::LineMap(line_map) => line_map.run(&config),
            Self::SyncSource(sync_source) => sync_source.run(&config),
            Self::Diff(diff) => diff.run(&config),
            Self::Watch(watch) => watch.run(&config).await,
        }
    }
}
