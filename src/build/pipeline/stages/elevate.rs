//! Directory elevation stage.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;

use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::ElevateConfig;

const NAME: &str = "elevate";

/// Stage that moves matching records up the directory tree.
///
/// `posts/2023-03-05-hello.md` with depth 1 becomes `2023-03-05-hello.md`.
/// A record never loses its file name: one nested less deeply than `depth`
/// ends up at the top level.
pub struct ElevateStage {
    pattern: Regex,
    depth: usize,
}

impl ElevateStage {
    pub fn new(config: &ElevateConfig) -> Result<Self, PipelineError> {
        if config.depth == 0 {
            return Err(PipelineError::configuration(NAME, "depth must be at least 1"));
        }
        Ok(Self {
            pattern: compile_pattern(NAME, "pattern", &config.pattern)?,
            depth: config.depth,
        })
    }

    /// The elevated key for `path`.
    pub fn elevate<'a>(&self, path: &'a str) -> &'a str {
        let mut rest = path;
        for _ in 0..self.depth {
            match rest.split_once('/') {
                Some((_, tail)) => rest = tail,
                None => break,
            }
        }
        rest
    }
}

#[async_trait]
impl Stage for ElevateStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let mut placed: HashSet<String> = HashSet::new();

        for path in files.keys() {
            if placed.contains(&path) || !self.pattern.is_match(&path) {
                continue;
            }
            let target = self.elevate(&path).to_string();
            files.relocate(&path, &target);
            placed.insert(target);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::document::FileRecord;
    use crate::build::pipeline::stages::test_context;

    fn stage(pattern: &str, depth: usize) -> ElevateStage {
        ElevateStage::new(&ElevateConfig {
            pattern: pattern.to_string(),
            depth,
        })
        .unwrap()
    }

    #[test]
    fn test_elevate_path() {
        let one = stage("^posts/", 1);
        assert_eq!(one.elevate("posts/hello.md"), "hello.md");
        assert_eq!(one.elevate("posts/2023/hello.md"), "2023/hello.md");

        let two = stage("^posts/", 2);
        assert_eq!(two.elevate("posts/2023/hello.md"), "hello.md");
        assert_eq!(two.elevate("posts/hello.md"), "hello.md");
        assert_eq!(two.elevate("hello.md"), "hello.md");
    }

    #[tokio::test]
    async fn test_elevates_matching_records() {
        let mut files = FileStore::new();
        files.set("posts/2023-03-05-hello.md", FileRecord::new("", "hi"));
        files.set("posts/sub/deep.md", FileRecord::new("", "deep"));
        files.set("about.md", FileRecord::new("", "about"));

        stage("^posts/", 1)
            .process(&mut files, &test_context())
            .await
            .unwrap();

        assert_eq!(
            files.keys(),
            vec!["2023-03-05-hello.md", "about.md", "sub/deep.md"]
        );
        assert_eq!(
            files.get("sub/deep.md").unwrap().original_path.as_deref(),
            Some("posts/sub/deep.md")
        );
    }

    #[tokio::test]
    async fn test_elevated_records_are_not_elevated_twice() {
        let mut files = FileStore::new();
        files.set("a/a/a/file.md", FileRecord::default());

        stage("^a/", 1)
            .process(&mut files, &test_context())
            .await
            .unwrap();

        assert_eq!(files.keys(), vec!["a/a/file.md"]);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = ElevateStage::new(&ElevateConfig {
            pattern: "^posts/".to_string(),
            depth: 0,
        })
        .err()
        .unwrap();
        assert_eq!(err.stage_name(), "elevate");
    }
}
