//! Pipeline context for sharing state across stages.

use std::path::{Path, PathBuf};

use crate::config::SiteMetadata;

/// Immutable build-wide context handed to every stage.
///
/// Stages communicate only through the file store; this context carries the
/// inputs that are fixed for the whole run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Directory content is read from
    pub source_dir: PathBuf,

    /// Directory other configured paths are relative to (the config file's)
    pub base_dir: PathBuf,

    /// Directory where output files are written
    pub output_dir: PathBuf,

    /// Remove `output_dir` before writing
    pub clean: bool,

    /// Site metadata (title, URL, description)
    pub site: SiteMetadata,
}

impl PipelineContext {
    pub fn new(source_dir: PathBuf, output_dir: PathBuf, site: SiteMetadata) -> Self {
        Self {
            source_dir,
            base_dir: PathBuf::from("."),
            output_dir,
            clean: true,
            site,
        }
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Resolve a configured path against `base_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}
