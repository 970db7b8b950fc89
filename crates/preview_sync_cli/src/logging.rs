use anyhow::{anyhow, Result};
use markdown_preview_sync::config::LogConfig;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let max_level = if config.max_level.is_empty() {
            "debug"
        } else {
            config.max_level.as_str()
        };
        if config.log_target.is_empty() {
            EnvFilter::new(max_level)
        } else {
            EnvFilter::new(format!("{max_level},{}", config.log_target))
        }
    })
}

/// Installs the global subscriber.
///
/// Logs go to `log_path`, or the configured log file, through a non-blocking
/// writer whose guard must be held until exit. Without a log file they go to
/// stderr.
pub fn init(log_path: Option<&Path>, config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let maybe_log = log_path
        .map(Path::to_path_buf)
        .or_else(|| config.log_file.as_ref().map(PathBuf::from));

    let Some(log_path) = maybe_log else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter(config))
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        return Ok(None);
    };

    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow!("no file name in {log_path:?}"))?;

    let directory = log_path
        .parent()
        .ok_or_else(|| anyhow!("{log_path:?} has no parent"))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Some(guard))
}
