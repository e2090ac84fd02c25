//! Build pipeline over the virtual file store.
//!
//! A run always looks like:
//! 1. Read (populate the store from the source directory)
//! 2. The configured stages, in declaration order
//! 3. Write (serialize the store to the output directory)
//!
//! Stages run strictly one after another against the same store. The first
//! failure aborts the run and no later stage is invoked.

mod context;
mod error;
pub mod stages;

use std::time::Instant;

use async_trait::async_trait;

pub use context::PipelineContext;
pub use error::{PipelineError, StageError};

use crate::build::store::FileStore;
use crate::config::{MarkdownConfig, StageConfig};

use stages::{
    AssetsStage, CollectionsStage, DateInFilenameStage, DateUrlsStage, ElevateStage,
    ExcerptsStage, FeedStage, FileMetadataStage, LiveReloadStage, MarkdownStage, PermalinksStage,
    ReadStage, RenameStage, SitemapStage, WriteStage,
};

/// A stage in the build pipeline.
///
/// A stage receives the whole store and mutates it in place. It may await
/// I/O internally; the pipeline does not start the next stage until the
/// returned future has resolved. Resolving is the stage's one completion
/// signal: `Ok(())` lets the run continue, `Err` aborts it.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs, collision reports and error attribution.
    fn name(&self) -> &'static str;

    /// Process the store.
    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError>;
}

/// An ordered list of stages.
///
/// Built once from configuration, then run any number of times. Holds no
/// state between runs.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Build the full pipeline for a site: read, the configured stages, write.
    ///
    /// Every stage is constructed (and its patterns validated) here, so a
    /// configuration error is reported before any file is touched.
    pub fn from_config(
        stages: &[StageConfig],
        markdown: &MarkdownConfig,
        live_reload: bool,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();
        pipeline.add_stage(ReadStage);

        for stage in stages {
            pipeline.add_boxed(build_stage(stage, markdown)?);
        }

        if live_reload {
            pipeline.add_stage(LiveReloadStage);
        }
        pipeline.add_stage(WriteStage);
        Ok(pipeline)
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    fn add_boxed(&mut self, stage: Box<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Run every stage in order against `files`.
    pub async fn run(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), PipelineError> {
        for stage in &self.stages {
            let name = stage.name();
            let started = Instant::now();
            tracing::debug!(stage = name, files = files.len(), "running stage");

            files.set_active_stage(Some(name));
            let result = stage.process(files, ctx).await;
            files.set_active_stage(None);

            if let Err(source) = result {
                tracing::debug!(stage = name, "stage failed, aborting run");
                return Err(PipelineError::Stage {
                    stage: name,
                    source,
                });
            }

            tracing::debug!(
                stage = name,
                files = files.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );
        }

        Ok(())
    }

    /// Get the names of all stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct one configured stage.
fn build_stage(
    config: &StageConfig,
    markdown: &MarkdownConfig,
) -> Result<Box<dyn Stage>, PipelineError> {
    Ok(match config {
        StageConfig::DateInFilename(c) => Box::new(DateInFilenameStage::new(c)),
        StageConfig::Collections(c) => Box::new(CollectionsStage::new(c)?),
        StageConfig::FileMetadata(c) => Box::new(FileMetadataStage::new(c)?),
        StageConfig::Elevate(c) => Box::new(ElevateStage::new(c)?),
        StageConfig::Markdown => Box::new(MarkdownStage::new(markdown)?),
        StageConfig::Permalinks(c) => Box::new(PermalinksStage::new(c)?),
        StageConfig::DateUrls(c) => Box::new(DateUrlsStage::new(c)),
        StageConfig::Excerpts => Box::new(ExcerptsStage),
        StageConfig::Assets(c) => Box::new(AssetsStage::new(c)),
        StageConfig::Rename(c) => Box::new(RenameStage::new(c)?),
        StageConfig::Feed(c) => Box::new(FeedStage::new(c)?),
        StageConfig::Sitemap(c) => Box::new(SitemapStage::new(c)?),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::error::compile_pattern;
    use super::*;
    use crate::build::document::FileRecord;
    use crate::config::{RenameConfig, SiteMetadata};

    fn ctx() -> PipelineContext {
        PipelineContext::new(
            PathBuf::from("src"),
            PathBuf::from("build"),
            SiteMetadata::default(),
        )
    }

    /// Inserts a marker file, optionally failing afterwards.
    struct Marker {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Stage for Marker {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn process(
            &self,
            files: &mut FileStore,
            _ctx: &PipelineContext,
        ) -> Result<(), StageError> {
            tokio::task::yield_now().await;
            files.set(self.name, FileRecord::default());
            if self.fail {
                return Err(StageError::Failed("boom".to_string()));
            }
            Ok(())
        }
    }

    /// Records the keys visible when it runs.
    struct Snapshot(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    #[async_trait]
    impl Stage for Snapshot {
        fn name(&self) -> &'static str {
            "snapshot"
        }

        async fn process(
            &self,
            files: &mut FileStore,
            _ctx: &PipelineContext,
        ) -> Result<(), StageError> {
            *self.0.lock().unwrap() = files.keys();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_stage(Marker { name: "one", fail: false })
            .add_stage(Marker { name: "two", fail: false });

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        pipeline.add_stage(Snapshot(seen.clone()));

        let mut files = FileStore::new();
        pipeline.run(&mut files, &ctx()).await.unwrap();

        assert_eq!(pipeline.stage_names(), vec!["one", "two", "snapshot"]);
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_failure_halts_pipeline() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_stage(Marker { name: "first", fail: false })
            .add_stage(Marker { name: "broken", fail: true })
            .add_stage(Marker { name: "never", fail: false });

        let mut files = FileStore::new();
        let err = pipeline.run(&mut files, &ctx()).await.unwrap_err();

        assert_eq!(err.stage_name(), "broken");
        assert!(matches!(err, PipelineError::Stage { stage: "broken", .. }));
        assert!(err.to_string().contains("boom"));
        assert!(files.contains("first"));
        assert!(files.contains("broken"));
        assert!(!files.contains("never"));
    }

    #[tokio::test]
    async fn test_later_stage_sees_only_renamed_paths() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.add_boxed(
            build_stage(
                &StageConfig::Rename(RenameConfig {
                    from: r"^(.+)\.hbs$".to_string(),
                    to: "$1.html".to_string(),
                }),
                &MarkdownConfig::default(),
            )
            .unwrap(),
        );
        pipeline.add_stage(Snapshot(seen.clone()));

        let mut files = FileStore::new();
        files.set("layouts/about.hbs", FileRecord::default());
        files.set("index.hbs", FileRecord::default());
        pipeline.run(&mut files, &ctx()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["index.html".to_string(), "layouts/about.html".to_string()]
        );
    }

    #[test]
    fn test_from_config_wraps_read_and_write() {
        let pipeline = Pipeline::from_config(
            &StageConfig::default_pipeline(),
            &MarkdownConfig::default(),
            false,
        )
        .unwrap();
        let names = pipeline.stage_names();
        assert_eq!(names.first(), Some(&"read"));
        assert_eq!(names.last(), Some(&"write"));
        assert!(!names.contains(&"live_reload"));

        let dev = Pipeline::from_config(&[], &MarkdownConfig::default(), true).unwrap();
        assert_eq!(dev.stage_names(), vec!["read", "live_reload", "write"]);
    }

    #[test]
    fn test_from_config_rejects_bad_template_eagerly() {
        let stages = vec![
            StageConfig::Markdown,
            StageConfig::Rename(RenameConfig {
                from: r"(.+)\.hbs".to_string(),
                to: "$2.html".to_string(),
            }),
        ];
        let err = Pipeline::from_config(&stages, &MarkdownConfig::default(), false)
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Configuration { stage: "rename", .. }));
    }

    #[test]
    fn test_compile_pattern_reports_stage() {
        let err = compile_pattern("elevate", "pattern", "(unclosed").unwrap_err();
        assert_eq!(err.stage_name(), "elevate");
        assert!(err.to_string().contains("invalid `pattern` pattern"));
    }
}
