use crate::error::ConfigError;
use crate::render::RenderOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Log configuration.
    pub log: LogConfig,

    /// Markdown extensions.
    pub render: RenderOptions,

    /// Source/preview scroll synchronization.
    pub sync: SyncConfig,

    /// Cache busting of local images.
    pub image_watch: ImageWatchConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
    /// Specify the log file path.
    pub log_file: Option<String>,

    /// Specify the max log level.
    pub max_level: String,

    /// Specify the log target to enable more detailed logging.
    ///
    /// ```toml
    /// [log]
    /// log-target = "markdown_preview_sync::update=trace"
    /// ```
    pub log_target: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_level: "debug".into(),
            log_target: "".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Whether to build the line map and answer sync queries.
    pub enable: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ImageWatchConfig {
    /// Whether to stamp local images with a version and watch them.
    pub enable: bool,
}

impl Default for ImageWatchConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config was read from, `None` when no location is known.
    pub file_path: Option<PathBuf>,
    pub maybe_error: Option<ConfigError>,
}

/// Default location of the config file.
///
/// Linux: ~/.config/preview-sync/config.toml
pub fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "preview-sync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn parse_config(path: &Path, contents: &str) -> Result<Config, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the config, falling back to the defaults when the file is missing
/// or invalid.
pub fn load_config(specified_config_file: Option<&Path>) -> LoadedConfig {
    let Some(config_file) = specified_config_file
        .map(Path::to_path_buf)
        .or_else(default_config_file)
    else {
        return LoadedConfig {
            config: Config::default(),
            file_path: None,
            maybe_error: None,
        };
    };

    let (config, maybe_error) = match std::fs::read_to_string(&config_file) {
        Ok(contents) => match parse_config(&config_file, &contents) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(err)),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (Config::default(), None),
        Err(source) => (
            Config::default(),
            Some(ConfigError::Io {
                path: config_file.clone(),
                source,
            }),
        ),
    };

    LoadedConfig {
        config,
        file_path: Some(config_file),
        maybe_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
          [log]
          max-level = "trace"
          log-file = "/tmp/preview-sync.log"

          [render]
          math = true
          footnotes = false

          [image-watch]
          enable = false
"#;
        let config = parse_config(Path::new("config.toml"), toml_content)
            .expect("Failed to deserialize config");

        assert_eq!(
            config,
            Config {
                log: LogConfig {
                    log_file: Some("/tmp/preview-sync.log".to_string()),
                    max_level: "trace".to_string(),
                    ..Default::default()
                },
                render: RenderOptions {
                    math: true,
                    footnotes: false,
                    ..Default::default()
                },
                sync: SyncConfig { enable: true },
                image_watch: ImageWatchConfig { enable: false },
            }
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse_config(Path::new("config.toml"), "[sync]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_load_config_fallbacks() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        let loaded = load_config(Some(&missing));
        assert_eq!(loaded.config, Config::default());
        assert!(loaded.maybe_error.is_none());
        assert_eq!(loaded.file_path.as_deref(), Some(missing.as_path()));

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "[render]\nmath = \"yes\"\n").unwrap();
        let loaded = load_config(Some(&invalid));
        assert_eq!(loaded.config, Config::default());
        assert!(matches!(loaded.maybe_error, Some(ConfigError::Toml { .. })));

        let valid = dir.path().join("config.toml");
        std::fs::write(&valid, "[sync]\nenable = false\n").unwrap();
        let loaded = load_config(Some(&valid));
        assert!(!loaded.config.sync.enable);
        assert!(loaded.maybe_error.is_none());
    }
}
