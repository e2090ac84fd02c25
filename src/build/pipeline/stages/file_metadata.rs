//! Pattern-based metadata defaults.

use async_trait::async_trait;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::build::document::{Metadata, Permalink};
use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::FileMetadataConfig;

const NAME: &str = "file_metadata";

/// Stage that applies configured metadata to every record matching a pattern.
///
/// The configured values are written in front matter form and interpreted
/// the same way, so `type: post` sets the record's kind and unknown keys land
/// in `extra`. With `preserve` (the default) values a record already has are
/// kept.
pub struct FileMetadataStage {
    pattern: Regex,
    metadata: Metadata,
    preserve: bool,
}

impl FileMetadataStage {
    pub fn new(config: &FileMetadataConfig) -> Result<Self, PipelineError> {
        let mapping: Mapping = config
            .metadata
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect();

        Ok(Self {
            pattern: compile_pattern(NAME, "pattern", &config.pattern)?,
            metadata: Metadata::from_mapping(mapping),
            preserve: config.preserve,
        })
    }

    fn apply(&self, target: &mut Metadata) {
        let defaults = &self.metadata;
        let keep = self.preserve;

        merge(&mut target.title, &defaults.title, keep);
        merge(&mut target.date, &defaults.date, keep);
        merge(&mut target.kind, &defaults.kind, keep);
        merge(&mut target.layout, &defaults.layout, keep);
        merge(&mut target.excerpt, &defaults.excerpt, keep);

        if defaults.permalink != Permalink::Unset
            && (!keep || target.permalink == Permalink::Unset)
        {
            target.permalink = defaults.permalink.clone();
        }

        for (key, value) in &defaults.extra {
            if !keep || !target.extra.contains_key(key) {
                target.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge<T: Clone>(target: &mut Option<T>, default: &Option<T>, keep: bool) {
    if let Some(value) = default
        && (!keep || target.is_none())
    {
        *target = Some(value.clone());
    }
}

#[async_trait]
impl Stage for FileMetadataStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        for record in files.records_mut() {
            if self.pattern.is_match(&record.path) {
                self.apply(&mut record.metadata);
            }
        }
        Ok(())
    }
}
