//! File writing stage.
//!
//! Writes the final store to the filesystem.

use async_trait::async_trait;

use crate::build::paths::key_to_output_path;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;

/// Stage that writes every record to the output directory.
///
/// With `clean` set, the output directory is removed first so files dropped
/// from the store do not linger. This is the only stage that touches the
/// output directory, so a run that fails earlier leaves the previous build in
/// place.
pub struct WriteStage;

#[async_trait]
impl Stage for WriteStage {
    fn name(&self) -> &'static str {
        "write"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let output_dir = &ctx.output_dir;

        if ctx.clean && tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(output_dir)
                .await
                .map_err(|e| StageError::io(output_dir, e))?;
        }

        for (key, record) in files.iter() {
            let output_path = key_to_output_path(key, output_dir);
            if output_path == *output_dir {
                return Err(StageError::file(key.as_str(), "key has no usable path segments"));
            }

            if let Some(parent) = output_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StageError::io(parent, e))?;
            }
            tokio::fs::write(&output_path, &record.contents)
                .await
                .map_err(|e| StageError::io(&output_path, e))?;
        }

        tracing::debug!(files = files.len(), output = %output_dir.display(), "wrote output");
        Ok(())
    }
}
