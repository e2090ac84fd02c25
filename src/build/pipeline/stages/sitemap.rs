//! Sitemap generation stage.
//!
//! Adds a `sitemap.xml` listing the site's pages:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/2023/03/05/hello/</loc>
//!     <lastmod>2023-03-05</lastmod>
//!     <priority>0.8</priority>
//!   </url>
//! </urlset>
//! ```

use std::io::Cursor;

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;

use crate::build::document::FileRecord;
use crate::build::paths;
use crate::build::pipeline::error::compile_pattern;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::SitemapConfig;

const NAME: &str = "sitemap";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Single `<url>` entry
struct UrlEntry {
    loc: String,
    /// Record date as `YYYY-MM-DD`
    lastmod: Option<String>,
}

/// Stage that lists every record matching `pattern` in a sitemap.
///
/// URLs are built from `hostname`, falling back to `site.url`. Without
/// either the stage logs a warning and adds nothing.
pub struct SitemapStage {
    hostname: Option<String>,
    omit_index: bool,
    priority: Option<String>,
    pattern: Regex,
    destination: String,
}

impl SitemapStage {
    pub fn new(config: &SitemapConfig) -> Result<Self, PipelineError> {
        let destination = paths::join("", &config.destination);
        if destination.is_empty() {
            return Err(PipelineError::configuration(NAME, "`destination` is empty"));
        }
        Ok(Self {
            hostname: config.hostname.clone(),
            omit_index: config.omit_index,
            priority: config.priority.clone(),
            pattern: compile_pattern(NAME, "pattern", &config.pattern)?,
            destination,
        })
    }

    fn entry(&self, base_url: &str, record: &FileRecord) -> UrlEntry {
        UrlEntry {
            loc: paths::absolute_url(base_url, &record.path, self.omit_index),
            lastmod: record
                .metadata
                .date
                .map(|date| date.with_timezone(&Utc).format("%Y-%m-%d").to_string()),
        }
    }

    fn render(&self, entries: &[UrlEntry]) -> std::io::Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut urlset = BytesStart::new("urlset");
        urlset.push_attribute(("xmlns", SITEMAP_NS));
        writer.write_event(Event::Start(urlset))?;

        for entry in entries {
            writer.write_event(Event::Start(BytesStart::new("url")))?;
            write_text_element(&mut writer, "loc", &entry.loc)?;
            if let Some(lastmod) = &entry.lastmod {
                write_text_element(&mut writer, "lastmod", lastmod)?;
            }
            if let Some(priority) = &self.priority {
                write_text_element(&mut writer, "priority", priority)?;
            }
            writer.write_event(Event::End(BytesEnd::new("url")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("urlset")))?;
        let mut xml = writer.into_inner().into_inner();
        xml.push(b'\n');
        Ok(xml)
    }
}

fn write_text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[async_trait]
impl Stage for SitemapStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let Some(base_url) = self.hostname.as_deref().or(ctx.site.url.as_deref()) else {
            tracing::warn!("no `hostname` or `site.url` configured, skipping sitemap");
            return Ok(());
        };

        let entries: Vec<UrlEntry> = files
            .iter()
            .filter(|(path, _)| self.pattern.is_match(path))
            .map(|(_, record)| self.entry(base_url, record))
            .collect();

        let xml = self
            .render(&entries)
            .map_err(|e| StageError::Failed(format!("failed to render sitemap: {e}")))?;

        tracing::debug!(urls = entries.len(), path = %self.destination, "generated sitemap");
        files.set(self.destination.as_str(), FileRecord::new("", xml));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::document::parse_date;
    use crate::build::pipeline::stages::test_context;

    fn page(date: Option<&str>) -> FileRecord {
        let mut record = FileRecord::new("", "<p>page</p>");
        record.metadata.date = date.and_then(parse_date);
        record
    }

    fn site_context(url: &str) -> PipelineContext {
        let mut ctx = test_context();
        ctx.site.url = Some(url.to_string());
        ctx
    }

    fn store() -> FileStore {
        let mut files = FileStore::new();
        files.set("index.html", page(None));
        files.set("2023/03/05/hello/index.html", page(Some("2023-03-05T23:30:00-02:00")));
        files.set("about.html", page(None));
        files.set("assets/site.css", FileRecord::new("", "body {}"));
        files
    }

    #[tokio::test]
    async fn test_lists_pages_from_site_url() {
        let mut files = store();
        let stage = SitemapStage::new(&SitemapConfig::default()).unwrap();
        stage
            .process(&mut files, &site_context("https://example.com/"))
            .await
            .unwrap();

        let xml = String::from_utf8(files.get("sitemap.xml").unwrap().contents.clone()).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#)));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/2023/03/05/hello/</loc>"));
        assert!(xml.contains("<loc>https://example.com/about.html</loc>"));
        assert!(!xml.contains("site.css"));
        // Dates are reported as the UTC day
        assert!(xml.contains("<lastmod>2023-03-06</lastmod>"));
        assert_eq!(xml.matches("<lastmod>").count(), 1);
        assert_eq!(xml.matches("<priority>0.8</priority>").count(), 3);
    }

    #[tokio::test]
    async fn test_hostname_and_index_options() {
        let mut files = store();
        let stage = SitemapStage::new(&SitemapConfig {
            hostname: Some("https://jesperh.se".to_string()),
            omit_index: false,
            priority: None,
            ..SitemapConfig::default()
        })
        .unwrap();
        stage
            .process(&mut files, &site_context("https://ignored.example"))
            .await
            .unwrap();

        let xml = String::from_utf8(files.get("sitemap.xml").unwrap().contents.clone()).unwrap();
        assert!(xml.contains("<loc>https://jesperh.se/index.html</loc>"));
        assert!(!xml.contains("ignored.example"));
        assert!(!xml.contains("<priority>"));
    }

    #[tokio::test]
    async fn test_escapes_and_skips_without_url() {
        let mut files = FileStore::new();
        files.set("a&b.html", page(None));

        let stage = SitemapStage::new(&SitemapConfig::default()).unwrap();
        stage.process(&mut files, &test_context()).await.unwrap();
        assert!(!files.contains("sitemap.xml"));

        stage
            .process(&mut files, &site_context("https://example.com"))
            .await
            .unwrap();
        let xml = String::from_utf8(files.get("sitemap.xml").unwrap().contents.clone()).unwrap();
        assert!(xml.contains("<loc>https://example.com/a&amp;b.html</loc>"));
    }

    #[test]
    fn test_invalid_config() {
        let err = SitemapStage::new(&SitemapConfig {
            pattern: "(".to_string(),
            ..SitemapConfig::default()
        })
        .err()
        .unwrap();
        assert_eq!(err.stage_name(), "sitemap");
    }
}
