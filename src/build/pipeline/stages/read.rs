//! Source reading stage.
//!
//! Populates the store from the source directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::build::document::{FileRecord, parse_front_matter};
use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;

/// Stage that reads every file under `source_dir` into the store.
///
/// Hidden files and directories are skipped. Text files have their front
/// matter parsed into metadata and stripped from the contents; anything
/// that is not valid UTF-8 is stored byte for byte.
pub struct ReadStage;

#[async_trait]
impl Stage for ReadStage {
    fn name(&self) -> &'static str {
        "read"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let mut found = Vec::new();
        walk_directory(&ctx.source_dir, &ctx.output_dir, &mut found).await?;

        for path in found {
            let relative = path.strip_prefix(&ctx.source_dir).unwrap_or(&path);
            let key = paths::key_from_relative(relative);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StageError::io(&path, e))?;

            let record = match String::from_utf8(bytes) {
                Ok(text) => {
                    let parsed = parse_front_matter(&text);
                    FileRecord::new(key.as_str(), parsed.content).with_metadata(parsed.metadata)
                }
                Err(e) => FileRecord::new(key.as_str(), e.into_bytes()),
            };
            files.set(key, record);
        }

        tracing::debug!(files = files.len(), source = %ctx.source_dir.display(), "read source");
        Ok(())
    }
}

/// Collect every regular file below `root`, skipping hidden entries and the
/// output directory when it is nested inside the source.
pub(super) async fn walk_directory(
    root: &Path,
    output_dir: &Path,
    found: &mut Vec<PathBuf>,
) -> Result<(), StageError> {
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StageError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StageError::io(&dir, e))?
        {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StageError::io(&path, e))?;
            if file_type.is_dir() {
                if path != output_dir {
                    pending.push(path);
                }
            } else if file_type.is_file() {
                found.push(path);
            } else if file_type.is_symlink() {
                // Follow links to files; linked directories are not descended
                let target = tokio::fs::metadata(&path).await;
                if target.is_ok_and(|m| m.is_file()) {
                    found.push(path);
                }
            }
        }
    }

    Ok(())
}
