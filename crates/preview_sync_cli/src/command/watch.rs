use anyhow::{Context, Result};
use clap::Parser;
use markdown_preview_sync::image::FileWatch;
use markdown_preview_sync::{Config, DiffResult, FileEvent, NotifyFileWatch, PreviewSession};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

#[derive(Parser, Debug, Clone)]
pub struct Watch {
    /// Markdown file to watch.
    file: PathBuf,

    /// Quiet period in milliseconds before a change is rendered.
    #[clap(long, default_value_t = 100)]
    debounce: u64,

    /// How often image changes are checked, in milliseconds.
    #[clap(long, default_value_t = 250)]
    image_poll: u64,

    /// Print the preview HTML after every render.
    #[clap(long)]
    print_html: bool,
}

impl Watch {
    fn report(&self, session: &PreviewSession<NotifyFileWatch>, result: &DiffResult) {
        tracing::info!(
            inserted = result.inserted.len(),
            replaced = result.possible_replace.is_some(),
            images = session.images().watched().count(),
            "Rendered {}",
            self.file.display()
        );
        if self.print_html {
            println!("{}", session.html());
        }
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        // The watch is placed on the parent directory, which needs a real path.
        let file = std::fs::canonicalize(&self.file)
            .with_context(|| format!("failed to resolve {}", self.file.display()))?;
        let backend = NotifyFileWatch::default();

        let (doc_tx, mut doc_rx) = unbounded_channel();
        let _doc_subscription = backend.subscribe(&file, doc_tx)?;

        let mut session = PreviewSession::new(backend, config);
        let result = session.render_file(&file)?;
        self.report(&session, &result);

        let debounce = Duration::from_millis(self.debounce);
        let mut image_poll = tokio::time::interval(Duration::from_millis(self.image_poll));

        loop {
            tokio::select! {
                event = doc_rx.recv() => {
                    let Some((_, event)) = event else {
                        break;
                    };
                    if event != FileEvent::Changed {
                        tracing::warn!(?event, "Document is gone, waiting for it to come back");
                        continue;
                    }

                    // Editors tend to write a file in several steps.
                    tokio::time::sleep(debounce).await;
                    while doc_rx.try_recv().is_ok() {}

                    match session.render_file(&file) {
                        Ok(result) => self.report(&session, &result),
                        Err(err) => tracing::error!(?err, "Failed to render"),
                    }
                }
                _ = image_poll.tick() => {
                    let refreshed = session.apply_image_changes();
                    if refreshed > 0 {
                        tracing::info!(refreshed, "Refreshed images");
                        if self.print_html {
                            println!("{}", session.html());
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping");
                    break;
                }
            }
        }

        session.dispose();

        Ok(())
    }
}
