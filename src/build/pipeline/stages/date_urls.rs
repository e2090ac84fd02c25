//! Date-segmented URL stage.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};

use crate::build::document::DateUrlCache;
use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::DateUrlsConfig;

/// Stage that moves dated records under `<year>/<month>/<day>/<permalink>/`.
///
/// Only records with both a `date` and a permalink are moved. The date is
/// taken in UTC and truncated to the day. The computed URL is cached on the
/// record together with the date and permalink it came from; the cache is
/// reused on later runs only while both still match.
pub struct DateUrlsStage {
    separator: String,
}

impl DateUrlsStage {
    pub fn new(config: &DateUrlsConfig) -> Self {
        Self {
            separator: config.separator.clone(),
        }
    }

    fn date_prefix(&self, day: NaiveDate) -> String {
        let sep = &self.separator;
        format!(
            "{:04}{sep}{:02}{sep}{:02}",
            day.year(),
            day.month(),
            day.day()
        )
    }
}

#[async_trait]
impl Stage for DateUrlsStage {
    fn name(&self) -> &'static str {
        "date_urls"
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
            let Some(record) = files.get_mut(&path) else {
                continue;
            };
            let (Some(date), Some(permalink)) = (
                record.metadata.date,
                record.metadata.permalink.as_path().map(str::to_string),
            ) else {
                continue;
            };

            let day = date.with_timezone(&Utc).date_naive();
            let url = match &record.metadata.date_url {
                Some(cache) if cache.date == day && cache.permalink == permalink => {
                    cache.url.clone()
                }
                _ => {
                    let url = paths::join(&self.date_prefix(day), &permalink);
                    record.metadata.date_url = Some(DateUrlCache {
                        date: day,
                        permalink,
                        url: url.clone(),
                    });
                    url
                }
            };

            let target = paths::index_key(&url, "html");
            files.relocate(&path, &target);
            placed.insert(target);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::document::{FileRecord, Permalink, parse_date};
    use crate::build::pipeline::stages::test_context;

    fn post(date: &str, permalink: &str) -> FileRecord {
        let mut record = FileRecord::new("", "<p>post</p>");
        record.metadata.date = parse_date(date);
        record.metadata.permalink = Permalink::Path(permalink.to_string());
        record
    }

    fn stage() -> DateUrlsStage {
        DateUrlsStage::new(&DateUrlsConfig::default())
    }

    #[tokio::test]
    async fn test_date_segmentation() {
        let mut files = FileStore::new();
        files.set("my-post/index.html", post("2023-03-05T10:00:00Z", "my-post"));
        files.set("late/index.html", post("2023-03-05T23:59:59Z", "late"));

        stage().process(&mut files, &test_context()).await.unwrap();

        assert_eq!(
            files.keys(),
            vec![
                "2023/03/05/late/index.html",
                "2023/03/05/my-post/index.html"
            ]
        );
        let record = files.get("2023/03/05/my-post/index.html").unwrap();
        assert_eq!(record.original_path.as_deref(), Some("my-post/index.html"));
        assert_eq!(
            record.metadata.date_url.as_ref().map(|c| c.url.as_str()),
            Some("2023/03/05/my-post")
        );
    }

    #[tokio::test]
    async fn test_offset_dates_use_utc_day() {
        let mut files = FileStore::new();
        files.set("a/index.html", post("2023-03-05T23:30:00-05:00", "a"));

        stage().process(&mut files, &test_context()).await.unwrap();

        assert_eq!(files.keys(), vec!["2023/03/06/a/index.html"]);
    }

    #[tokio::test]
    async fn test_custom_separator() {
        let stage = DateUrlsStage::new(&DateUrlsConfig {
            separator: "-".to_string(),
        });
        let mut files = FileStore::new();
        files.set("my-post/index.html", post("2023-03-05", "my-post"));

        stage.process(&mut files, &test_context()).await.unwrap();

        assert_eq!(files.keys(), vec!["2023-03-05/my-post/index.html"]);
    }

    #[tokio::test]
    async fn test_requires_date_and_permalink() {
        let mut files = FileStore::new();

        let mut undated = FileRecord::new("", "");
        undated.metadata.permalink = Permalink::Path("about".to_string());
        files.set("about/index.html", undated);

        let mut no_permalink = FileRecord::new("", "");
        no_permalink.metadata.date = parse_date("2023-03-05");
        files.set("draft.html", no_permalink);

        let mut disabled = FileRecord::new("", "");
        disabled.metadata.date = parse_date("2023-03-05");
        disabled.metadata.permalink = Permalink::Disabled;
        files.set("raw.html", disabled);

        stage().process(&mut files, &test_context()).await.unwrap();

        assert_eq!(
            files.keys(),
            vec!["about/index.html", "draft.html", "raw.html"]
        );
    }

    #[tokio::test]
    async fn test_matching_cache_is_reused() {
        let mut record = post("2023-03-05", "my-post");
        record.metadata.date_url = Some(DateUrlCache {
            date: NaiveDate::from_ymd_opt(2023, 3, 5).unwrap(),
            permalink: "my-post".to_string(),
            url: "archive/my-post".to_string(),
        });
        let mut files = FileStore::new();
        files.set("my-post/index.html", record);

        stage().process(&mut files, &test_context()).await.unwrap();

        assert_eq!(files.keys(), vec!["archive/my-post/index.html"]);
    }

    #[tokio::test]
    async fn test_stale_cache_is_recomputed() {
        let mut record = post("2024-01-02", "my-post");
        record.metadata.date_url = Some(DateUrlCache {
            date: NaiveDate::from_ymd_opt(2023, 3, 5).unwrap(),
            permalink: "my-post".to_string(),
            url: "2023/03/05/my-post".to_string(),
        });
        let mut files = FileStore::new();
        files.set("2023/03/05/my-post/index.html", record);

        stage().process(&mut files, &test_context()).await.unwrap();

        assert_eq!(files.keys(), vec!["2024/01/02/my-post/index.html"]);
        let cache = files
            .get("2024/01/02/my-post/index.html")
            .unwrap()
            .metadata
            .date_url
            .clone()
            .unwrap();
        assert_eq!(cache.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn test_rerun_keeps_paths() {
        let mut files = FileStore::new();
        files.set("my-post/index.html", post("2023-03-05T10:00:00Z", "my-post"));

        let stage = stage();
        stage.process(&mut files, &test_context()).await.unwrap();
        stage.process(&mut files, &test_context()).await.unwrap();

        assert_eq!(files.keys(), vec!["2023/03/05/my-post/index.html"]);
    }
}
