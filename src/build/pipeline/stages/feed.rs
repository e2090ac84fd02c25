//! RSS feed stage.

use async_trait::async_trait;
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};

use crate::build::document::FileRecord;
use crate::build::paths;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::FeedConfig;

const NAME: &str = "feed";

/// Stage that writes an RSS 2.0 feed of a collection.
///
/// Items follow collection order and are capped at `limit`. Each item links
/// to the member's final URL, so the stage belongs after the URL rewriting
/// stages. The channel is described by `site.title`, `site.url` and
/// `site.description`; without `site.url` the stage logs a warning and adds
/// nothing.
pub struct FeedStage {
    collection: String,
    limit: usize,
    destination: String,
}

impl FeedStage {
    pub fn new(config: &FeedConfig) -> Result<Self, PipelineError> {
        if config.collection.trim().is_empty() {
            return Err(PipelineError::configuration(NAME, "collection name is empty"));
        }
        let destination = paths::join("", &config.destination);
        if destination.is_empty() {
            return Err(PipelineError::configuration(NAME, "`destination` is empty"));
        }
        Ok(Self {
            collection: config.collection.clone(),
            limit: config.limit,
            destination,
        })
    }
}

/// Convert a collection member to a feed item.
fn record_to_item(site_url: &str, record: &FileRecord) -> Item {
    let link = paths::absolute_url(site_url, &record.path, true);
    let description = record
        .metadata
        .excerpt
        .clone()
        .or_else(|| record.text().map(str::to_string));

    ItemBuilder::default()
        .title(record.metadata.title.clone())
        .link(Some(link.clone()))
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .description(description)
        .pub_date(record.metadata.date.map(|date| date.to_rfc2822()))
        .build()
}

#[async_trait]
impl Stage for FeedStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let Some(site_url) = ctx.site.url.as_deref() else {
            tracing::warn!(collection = %self.collection, "no `site.url` configured, skipping feed");
            return Ok(());
        };

        let items: Vec<Item> = files
            .collection(&self.collection)
            .into_iter()
            .take(self.limit)
            .map(|record| record_to_item(site_url, record))
            .collect();
        let count = items.len();

        let channel = ChannelBuilder::default()
            .title(ctx.site.title.as_deref().unwrap_or_default())
            .link(site_url)
            .description(ctx.site.description.as_deref().unwrap_or_default())
            .generator("ferrosmith".to_string())
            .items(items)
            .build();
        channel
            .validate()
            .map_err(|e| StageError::Failed(format!("invalid feed: {e}")))?;

        tracing::debug!(items = count, path = %self.destination, "generated feed");
        files.set(self.destination.as_str(), FileRecord::new("", channel.to_string()));
        Ok(())
    }
}
