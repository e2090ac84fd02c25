//! Date-from-filename stage.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::build::document::midnight_utc;
use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::DateInFilenameConfig;

/// Stage that reads a publication date from file names like
/// `2023-03-05-my-post.md`.
///
/// The date becomes midnight UTC of that day. A date from front matter wins
/// unless `override_existing` is set. Paths are not changed.
pub struct DateInFilenameStage {
    override_existing: bool,
}

impl DateInFilenameStage {
    pub fn new(config: &DateInFilenameConfig) -> Self {
        Self {
            override_existing: config.override_existing,
        }
    }
}

/// The `YYYY-MM-DD-` prefix of a file name, if it is a real date.
fn date_prefix(file_name: &str) -> Option<NaiveDate> {
    let prefix = file_name.get(..10)?;
    if file_name.as_bytes().get(10) != Some(&b'-') {
        return None;
    }
    if !prefix
        .bytes()
        .enumerate()
        .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() })
    {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[async_trait]
impl Stage for DateInFilenameStage {
    fn name(&self) -> &'static str {
        "date_in_filename"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        for record in files.records_mut() {
            if record.metadata.date.is_some() && !self.override_existing {
                continue;
            }
            if let Some(day) = date_prefix(paths::file_name(&record.path)) {
                record.metadata.date = Some(midnight_utc(day));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::document::{FileRecord, parse_date};
    use crate::build::pipeline::stages::test_context;

    #[test]
    fn test_date_prefix() {
        assert_eq!(
            date_prefix("2023-03-05-my-post.md"),
            NaiveDate::from_ymd_opt(2023, 3, 5)
        );
        assert_eq!(date_prefix("2023-03-05.md"), None);
        assert_eq!(date_prefix("2023-02-30-bad.md"), None);
        assert_eq!(date_prefix("2023-3-5-short.md"), None);
        assert_eq!(date_prefix("about.md"), None);
    }

    #[tokio::test]
    async fn test_sets_missing_dates() {
        let mut files = FileStore::new();
        files.set("posts/2023-03-05-hello.md", FileRecord::default());
        let mut dated = FileRecord::default();
        dated.metadata.date = parse_date("2020-01-01T12:00:00Z");
        files.set("posts/2023-03-06-dated.md", dated);
        files.set("2023-03-07/index.md", FileRecord::default());

        let stage = DateInFilenameStage::new(&DateInFilenameConfig::default());
        stage.process(&mut files, &test_context()).await.unwrap();

        assert_eq!(
            files.get("posts/2023-03-05-hello.md").unwrap().metadata.date,
            parse_date("2023-03-05T00:00:00Z")
        );
        assert_eq!(
            files.get("posts/2023-03-06-dated.md").unwrap().metadata.date,
            parse_date("2020-01-01T12:00:00Z")
        );
        assert_eq!(files.get("2023-03-07/index.md").unwrap().metadata.date, None);
    }

    #[tokio::test]
    async fn test_override_existing() {
        let mut files = FileStore::new();
        let mut dated = FileRecord::default();
        dated.metadata.date = parse_date("2020-01-01");
        files.set("2023-03-06-dated.md", dated);

        let stage = DateInFilenameStage::new(&DateInFilenameConfig {
            override_existing: true,
        });
        stage.process(&mut files, &test_context()).await.unwrap();

        assert_eq!(
            files.get("2023-03-06-dated.md").unwrap().metadata.date,
            parse_date("2023-03-06")
        );
    }
}
