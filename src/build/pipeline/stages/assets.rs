//! Static asset stage.
//!
//! Copies a directory that lives next to the source (stylesheets, images,
//! fonts) into the store without front matter processing.

use std::path::PathBuf;

use async_trait::async_trait;

use super::read::walk_directory;
use crate::build::document::FileRecord;
use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::AssetsConfig;

/// Stage that adds every file under `source` to the store below
/// `destination`.
///
/// Contents are stored byte for byte. A missing `source` directory is not an
/// error; the stage then adds nothing.
pub struct AssetsStage {
    source: PathBuf,
    destination: String,
}

impl AssetsStage {
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            source: config.source.clone(),
            destination: paths::join("", &config.destination),
        }
    }
}

#[async_trait]
impl Stage for AssetsStage {
    fn name(&self) -> &'static str {
        "assets"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let source = ctx.resolve(&self.source);
        if !tokio::fs::metadata(&source).await.is_ok_and(|m| m.is_dir()) {
            tracing::debug!(source = %source.display(), "no assets directory");
            return Ok(());
        }

        let mut found = Vec::new();
        walk_directory(&source, &ctx.output_dir, &mut found).await?;

        for path in &found {
            let relative = path.strip_prefix(&source).unwrap_or(path);
            let key = paths::join(&self.destination, &paths::key_from_relative(relative));
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| StageError::io(path, e))?;
            files.set(key.as_str(), FileRecord::new(key.as_str(), bytes));
        }

        tracing::debug!(assets = found.len(), source = %source.display(), "copied assets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::SiteMetadata;

    fn context(root: &Path) -> PipelineContext {
        PipelineContext::new(root.join("src"), root.join("build"), SiteMetadata::default())
            .with_base_dir(root.to_path_buf())
    }

    fn write(root: &Path, path: &str, contents: &[u8]) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_copies_assets_under_prefix() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "assets/css/site.css", b"---\nnot: front matter\n---\n");
        write(temp.path(), "assets/img/logo.png", &[0x89, 0x50, 0x4e, 0x47]);
        write(temp.path(), "assets/.DS_Store", b"junk");

        let mut files = FileStore::new();
        AssetsStage::new(&AssetsConfig::default())
            .process(&mut files, &context(temp.path()))
            .await
            .unwrap();

        assert_eq!(files.keys(), vec!["assets/css/site.css", "assets/img/logo.png"]);
        let css = files.get("assets/css/site.css").unwrap();
        assert_eq!(css.contents, b"---\nnot: front matter\n---\n");
        assert!(css.metadata.title.is_none());
        assert_eq!(
            files.get("assets/img/logo.png").unwrap().contents,
            vec![0x89, 0x50, 0x4e, 0x47]
        );
    }

    #[tokio::test]
    async fn test_custom_destination_and_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "static/robots.txt", b"User-agent: *");

        let mut files = FileStore::new();
        let stage = AssetsStage::new(&AssetsConfig {
            source: PathBuf::from("static"),
            destination: "/".to_string(),
        });
        stage.process(&mut files, &context(temp.path())).await.unwrap();
        assert_eq!(files.keys(), vec!["robots.txt"]);

        let mut empty = FileStore::new();
        AssetsStage::new(&AssetsConfig::default())
            .process(&mut empty, &context(temp.path()))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }
}
