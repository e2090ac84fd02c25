//! Built-in pipeline stages.
//!
//! The default blog pipeline runs, between read and write:
//!
//! 1. **DateInFilenameStage** - Take `date` from `2023-03-05-title.md` names
//! 2. **CollectionsStage** - Group and order posts
//! 3. **FileMetadataStage** - Apply `type`/`layout` defaults to posts
//! 4. **ElevateStage** - Lift `posts/*` to the site root
//! 5. **MarkdownStage** - Render markdown to HTML
//! 6. **PermalinksStage** - Move titled pages to `<slug>/index.html`
//! 7. **DateUrlsStage** - Prefix dated pages with `YYYY/MM/DD`
//! 8. **ExcerptsStage** - Extract the first paragraph
//! 9. **AssetsStage** - Copy `assets/` into the site
//! 10. **RenameStage** - `*.hbs` to `*.html`
//! 11. **FeedStage** - RSS feed of the posts collection
//! 12. **RenameStage** - Move the feed to `rss/index.xml`
//! 13. **SitemapStage** - `sitemap.xml` of every page
//!
//! `serve` adds **LiveReloadStage** just before the write.

mod assets;
mod collections;
mod date_in_filename;
mod date_urls;
mod elevate;
mod excerpts;
mod feed;
mod file_metadata;
mod live_reload;
mod markdown;
mod permalinks;
mod read;
mod rename;
mod sitemap;
mod write;

pub use assets::AssetsStage;
pub use collections::CollectionsStage;
pub use date_in_filename::DateInFilenameStage;
pub use date_urls::DateUrlsStage;
pub use elevate::ElevateStage;
pub use excerpts::ExcerptsStage;
pub use feed::FeedStage;
pub use file_metadata::FileMetadataStage;
pub use live_reload::{LIVE_RELOAD_PATH, LiveReloadStage};
pub use markdown::MarkdownStage;
pub use permalinks::PermalinksStage;
pub use read::ReadStage;
pub use rename::RenameStage;
pub use sitemap::SitemapStage;
pub use write::WriteStage;

#[cfg(test)]
pub(crate) fn test_context() -> super::PipelineContext {
    super::PipelineContext::new(
        std::path::PathBuf::from("src"),
        std::path::PathBuf::from("build"),
        crate::config::SiteMetadata::default(),
    )
}
