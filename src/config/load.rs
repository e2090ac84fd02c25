//! Configuration loading from files.
//!
//! The YAML file is layered with `FERROSMITH_*` environment variables, so
//! `FERROSMITH_DESTINATION=public` overrides `destination:` and
//! `FERROSMITH_DEV__LIVE_RELOAD=false` overrides `dev.live_reload`.

use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};

use super::{Config, ConfigError};

pub const DEFAULT_CONFIG_FILE: &str = "ferrosmith.yaml";

const ENV_PREFIX: &str = "FERROSMITH";

impl Config {
    /// Load the config from the command line argument, defaulting to `ferrosmith.yaml`
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        let config = Self::load_from_file(&config_file)?;
        Ok((config, config_file))
    }

    /// Load the config from a file path
    pub(crate) fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Resolve a config-relative path against the config file's directory.
    pub fn resolve_path(&self, base_path: &Path, path: &Path) -> PathBuf {
        if path.is_relative() {
            base_path.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogFormat, SortKey, StageConfig};

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "site:\n  title: My Blog\n");

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.site.title.as_deref(), Some("My Blog"));
        assert_eq!(config.source, PathBuf::from("src"));
        assert_eq!(config.destination, PathBuf::from("build"));
        assert!(config.clean);
        assert!(config.pipeline.is_none());
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.stages().len(), StageConfig::default_pipeline().len());
    }

    #[test]
    fn test_load_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
pipeline:
  - stage: markdown
  - stage: collections
    name: notes
    pattern: '^notes/'
    sort_by: title
  - stage: permalinks
    replacement: "_"
  - stage: rename
    from: '(.+)\.hbs'
    to: '$1.html'
"#,
        );

        let config = Config::load_from_file(&path).unwrap();
        let stages = config.stages();
        assert_eq!(stages.len(), 4);
        assert!(matches!(stages[0], StageConfig::Markdown));
        match &stages[1] {
            StageConfig::Collections(c) => {
                assert_eq!(c.name, "notes");
                assert_eq!(c.sort_by, SortKey::Title);
                assert!(!c.reverse);
            }
            other => panic!("unexpected stage: {other:?}"),
        }
        match &stages[2] {
            StageConfig::Permalinks(p) => {
                assert_eq!(p.replacement, "_");
                assert_eq!(p.disallowed, "[^a-z]+");
            }
            other => panic!("unexpected stage: {other:?}"),
        }
        match &stages[3] {
            StageConfig::Rename(r) => assert_eq!(r.to, "$1.html"),
            other => panic!("unexpected stage: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(
            base_path_from_config(Path::new("/project/ferrosmith.yaml")),
            PathBuf::from("/project")
        );
        assert_eq!(
            base_path_from_config(Path::new("ferrosmith.yaml")),
            PathBuf::from("")
        );
    }
}
