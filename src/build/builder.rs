use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::config::Config;

use super::pipeline::{Pipeline, PipelineContext, PipelineError};
use super::store::FileStore;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("source directory does not exist: {0}")]
    SourceNotFound(PathBuf),
}

#[derive(Debug)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    /// Records written
    pub files: usize,
    /// Records that replaced another record at the same path
    pub collisions: usize,
    pub elapsed: Duration,
}

/// Runs one complete build of a site.
///
/// Every call to [`Builder::build`] starts from an empty store and reads the
/// source directory again, so it can be called repeatedly (as `serve` does).
pub struct Builder {
    config: Config,
    /// Base path for resolving relative paths (typically the config file's directory)
    base_path: PathBuf,
    live_reload: bool,
}

impl Builder {
    pub fn new(config: Config, base_path: PathBuf) -> Self {
        Self {
            config,
            base_path,
            live_reload: false,
        }
    }

    /// Inject the live reload script into generated pages.
    pub fn with_live_reload(mut self, live_reload: bool) -> Self {
        self.live_reload = live_reload;
        self
    }

    pub fn source_dir(&self) -> PathBuf {
        self.config.resolve_path(&self.base_path, &self.config.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config
            .resolve_path(&self.base_path, &self.config.destination)
    }

    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let started = Instant::now();

        // Validate every stage before touching the filesystem
        let pipeline = Pipeline::from_config(
            &self.config.stages(),
            &self.config.markdown,
            self.live_reload,
        )?;

        let source_dir = self.source_dir();
        if !source_dir.is_dir() {
            return Err(BuildError::SourceNotFound(source_dir));
        }
        let output_dir = self.output_dir();

        let ctx = PipelineContext::new(source_dir, output_dir.clone(), self.config.site.clone())
            .with_clean(self.config.clean)
            .with_base_dir(self.base_path.clone());

        let collisions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&collisions);
        let mut files = FileStore::new().with_collision_hook(Box::new(move |collision| {
            counter.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                path = %collision.path,
                from = collision.incoming_from.as_deref().unwrap_or("-"),
                stage = collision.stage.unwrap_or("-"),
                "two files share an output path, keeping the later one"
            );
        }));

        tracing::info!(
            source = %ctx.source_dir.display(),
            stages = ?pipeline.stage_names(),
            "building site"
        );
        pipeline.run(&mut files, &ctx).await?;

        let result = BuildResult {
            output_dir,
            files: files.len(),
            collisions: collisions.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            files = result.files,
            collisions = result.collisions,
            elapsed_ms = result.elapsed.as_millis() as u64,
            output = %result.output_dir.display(),
            "build finished"
        );
        Ok(result)
    }
}
