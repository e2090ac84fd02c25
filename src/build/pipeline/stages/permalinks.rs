//! Title-derived permalink stage.
//!
//! Moves `posts/my-post.html` with `title: My Post` to
//! `posts/my-post/index.html`, storing `posts/my-post` as its permalink.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::{NoExpand, Regex};

use crate::build::document::Permalink;
use crate::build::paths;
use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::PermalinksConfig;

const NAME: &str = "permalinks";

/// Stage that gives titled records a clean directory-style URL.
///
/// A record is processed when it has a `title` and its permalink is not
/// `false`. An explicit permalink is used as-is; otherwise one is derived from
/// the title:
///
/// 1. lower-case the title
/// 2. delete everything matching `strip`
/// 3. replace each run matching `disallowed` with `replacement`
/// 4. collapse repeated replacements and trim them from both ends
///
/// The permalink is joined onto the record's directory and the record moves
/// to `<permalink>/index.html`. Two records landing on the same permalink
/// collide; the one processed last wins.
pub struct PermalinksStage {
    strip: Regex,
    disallowed: Regex,
    replacement: String,
    repeated_replacement: Option<Regex>,
    preserve_extension: bool,
}

impl PermalinksStage {
    pub fn new(config: &PermalinksConfig) -> Result<Self, PipelineError> {
        let strip = compile_pattern(NAME, "strip", &config.strip)?;
        let disallowed = compile_pattern(NAME, "disallowed", &config.disallowed)?;
        if disallowed.is_match("") {
            return Err(PipelineError::configuration(
                NAME,
                format!(
                    "`disallowed` pattern {:?} matches the empty string",
                    config.disallowed
                ),
            ));
        }

        let repeated_replacement = if config.replacement.is_empty() {
            None
        } else {
            let escaped = regex::escape(&config.replacement);
            Some(compile_pattern(
                NAME,
                "replacement",
                &format!("(?:{escaped}){{2,}}"),
            )?)
        };

        Ok(Self {
            strip,
            disallowed,
            replacement: config.replacement.clone(),
            repeated_replacement,
            preserve_extension: config.preserve_extension,
        })
    }

    /// Derive a permalink segment from a title.
    pub fn slugify(&self, title: &str) -> String {
        let lowered = title.to_lowercase();
        let stripped = self.strip.replace_all(&lowered, "");
        let replaced = self
            .disallowed
            .replace_all(&stripped, NoExpand(&self.replacement));

        let Some(repeated) = &self.repeated_replacement else {
            return replaced.into_owned();
        };
        let collapsed = repeated.replace_all(&replaced, NoExpand(&self.replacement));

        let mut slug: &str = &collapsed;
        while let Some(rest) = slug.strip_prefix(self.replacement.as_str()) {
            slug = rest;
        }
        while let Some(rest) = slug.strip_suffix(self.replacement.as_str()) {
            slug = rest;
        }
        slug.to_string()
    }

    fn index_extension<'a>(&self, path: &'a str) -> &'a str {
        if self.preserve_extension {
            paths::extension(path).unwrap_or("html")
        } else {
            "html"
        }
    }
}

#[async_trait]
impl Stage for PermalinksStage {
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
            if placed.contains(&path) {
                continue;
            }
            let Some(record) = files.get(&path) else {
                continue;
            };

            let ext = self.index_extension(&path);
            let permalink = match (&record.metadata.permalink, &record.metadata.title) {
                (Permalink::Disabled, _) | (_, None) => continue,
                (Permalink::Path(existing), Some(_)) => {
                    // Already moved by an earlier run
                    if path == paths::index_key(existing, ext) {
                        continue;
                    }
                    paths::join(paths::parent(&path), existing)
                }
                (Permalink::Unset, Some(title)) => {
                    let slug = self.slugify(title);
                    if slug.is_empty() {
                        tracing::warn!(
                            path = %path,
                            title = %title,
                            "title has no characters usable in a permalink, leaving file in place"
                        );
                        continue;
                    }
                    paths::join(paths::parent(&path), &slug)
                }
            };

            let target = paths::index_key(&permalink, ext);
            if let Some(record) = files.get_mut(&path) {
                record.metadata.permalink = Permalink::Path(permalink);
            }
            files.relocate(&path, &target);
            placed.insert(target);
        }

        Ok(())
    }
}
