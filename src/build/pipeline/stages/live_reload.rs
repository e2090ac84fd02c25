//! Live reload injection stage (serve only).

use async_trait::async_trait;

use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;

/// Route of the server-sent events endpoint the snippet subscribes to.
pub const LIVE_RELOAD_PATH: &str = "/_ferrosmith/live-reload";

fn snippet() -> String {
    format!(
        "<script>new EventSource(\"{LIVE_RELOAD_PATH}\")\
         .addEventListener(\"reload\", () => location.reload());</script>"
    )
}

/// Stage that injects the live reload script into every HTML page.
///
/// The script goes right before the last `</body>`, or at the end of pages
/// without one.
pub struct LiveReloadStage;

fn inject(html: &str, script: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{script}{}", &html[..pos], &html[pos..]),
        None => format!("{html}{script}"),
    }
}

#[async_trait]
impl Stage for LiveReloadStage {
    fn name(&self) -> &'static str {
        "live_reload"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        let script = snippet();
        for record in files.records_mut() {
            if paths::extension(&record.path) != Some("html") {
                continue;
            }
            if let Some(html) = record.text() {
                record.contents = inject(html, &script).into_bytes();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::document::FileRecord;
    use crate::build::pipeline::stages::test_context;

    #[test]
    fn test_inject_before_body_end() {
        let out = inject("<html><body><p>x</p></body></html>", "<s/>");
        assert_eq!(out, "<html><body><p>x</p><s/></body></html>");
        assert_eq!(inject("<p>fragment</p>", "<s/>"), "<p>fragment</p><s/>");
    }

    #[tokio::test]
    async fn test_only_html_records_are_touched() {
        let mut files = FileStore::new();
        files.set("index.html", FileRecord::new("", "<body></body>"));
        files.set("style.css", FileRecord::new("", "body {}"));

        LiveReloadStage
            .process(&mut files, &test_context())
            .await
            .unwrap();

        let html = files.get("index.html").unwrap().text().unwrap();
        assert!(html.contains(LIVE_RELOAD_PATH));
        assert!(html.ends_with("</script></body>"));
        assert_eq!(files.get("style.css").unwrap().text(), Some("body {}"));
    }
}
