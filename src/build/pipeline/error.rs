//! Pipeline error types.

use std::path::PathBuf;

/// A failure reported by a single stage.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    File { path: String, message: String },

    #[error("{0}")]
    Failed(String),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while building or running the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// A stage failed; the run was aborted at this stage.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        source: StageError,
    },

    /// A stage was given an invalid pattern or template.
    #[error("stage '{stage}' is misconfigured: {message}")]
    Configuration {
        stage: &'static str,
        message: String,
    },
}

impl PipelineError {
    /// Create a configuration error for a stage.
    pub fn configuration(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            stage,
            message: message.into(),
        }
    }

    /// Name of the stage the error is attributed to.
    pub fn stage_name(&self) -> &'static str {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Configuration { stage, .. } => {
                *stage
            }
        }
    }
}

/// Compile a regex from stage configuration.
pub(crate) fn compile_pattern(
    stage: &'static str,
    field: &str,
    pattern: &str,
) -> Result<regex::Regex, PipelineError> {
    regex::Regex::new(pattern).map_err(|e| {
        PipelineError::configuration(stage, format!("invalid `{field}` pattern {pattern:?}: {e}"))
    })
}
