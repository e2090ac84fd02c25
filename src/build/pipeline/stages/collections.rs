//! Collection grouping stage.

use std::cmp::Ordering;

use async_trait::async_trait;
use regex::Regex;

use crate::build::document::{CollectionMembership, FileRecord};
use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::{CollectionConfig, SortKey};

const NAME: &str = "collections";

/// Stage that groups matching records into a named, ordered collection.
///
/// Members get a [`CollectionMembership`] with their position and the keys of
/// their neighbours; later stages read the collection back with
/// [`FileStore::collection`]. Records missing
/// the sort key sort before all others (after them when reversed). Ties are
/// broken by path so the order is stable across runs.
pub struct CollectionsStage {
    name: String,
    pattern: Regex,
    sort_by: SortKey,
    reverse: bool,
}

impl CollectionsStage {
    pub fn new(config: &CollectionConfig) -> Result<Self, PipelineError> {
        if config.name.trim().is_empty() {
            return Err(PipelineError::configuration(NAME, "collection name is empty"));
        }
        Ok(Self {
            name: config.name.clone(),
            pattern: compile_pattern(NAME, "pattern", &config.pattern)?,
            sort_by: config.sort_by,
            reverse: config.reverse,
        })
    }

    fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let by_key = match self.sort_by {
            SortKey::Date => a.metadata.date.cmp(&b.metadata.date),
            SortKey::Title => a.metadata.title.cmp(&b.metadata.title),
            SortKey::Path => Ordering::Equal,
        };
        let ordering = by_key.then_with(|| a.path.cmp(&b.path));
        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[async_trait]
impl Stage for CollectionsStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let mut members: Vec<&FileRecord> = files
            .iter()
            .filter(|(path, _)| self.pattern.is_match(path))
            .map(|(_, record)| record)
            .collect();
        members.sort_by(|a, b| self.compare(a, b));
        let order: Vec<String> = members.into_iter().map(|r| r.path.clone()).collect();

        for record in files.records_mut() {
            record.metadata.collections.retain(|m| m.name != self.name);
        }
        for (position, path) in order.iter().enumerate() {
            let previous = position.checked_sub(1).map(|i| order[i].clone());
            let next = order.get(position + 1).cloned();
            if let Some(record) = files.get_mut(path) {
                record.metadata.collections.push(CollectionMembership {
                    name: self.name.clone(),
                    position,
                    previous,
                    next,
                });
            }
        }

        tracing::debug!(collection = %self.name, members = order.len(), "built collection");
        Ok(())
    }
}
