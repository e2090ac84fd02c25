//! Excerpt extraction stage.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::QName;

use crate::build::paths;
use crate::build::pipeline::{PipelineContext, Stage, StageError};
use crate::build::store::FileStore;

/// Stage that sets `excerpt` to the first paragraph of each HTML record.
///
/// Markdown records already get their excerpt while rendering; this covers
/// HTML written by hand. The excerpt keeps its `<p>` tags. Records that
/// already have an excerpt (usually from front matter) and records without a
/// paragraph are left alone.
pub struct ExcerptsStage;

/// The first `<p>...</p>` element of an HTML fragment.
///
/// The markup is tokenized, so paragraphs inside comments or attribute values
/// do not count. Returns `None` when the first paragraph is never closed.
pub fn first_paragraph(html: &str) -> Option<&str> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);

    let is_paragraph = |name: QName<'_>| name.as_ref().eq_ignore_ascii_case(b"p");
    let mut start = None;
    loop {
        let before = usize::try_from(reader.buffer_position()).ok()?;
        match reader.read_event() {
            Ok(Event::Start(tag)) if start.is_none() && is_paragraph(tag.name()) => {
                start = Some(before);
            }
            Ok(Event::End(tag)) if is_paragraph(tag.name()) => {
                if let Some(start) = start {
                    let end = usize::try_from(reader.buffer_position()).ok()?;
                    return html.get(start..end);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl Stage for ExcerptsStage {
    fn name(&self) -> &'static str {
        "excerpts"
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        for record in files.records_mut() {
            if record.metadata.excerpt.is_some() {
                continue;
            }
            if paths::extension(&record.path) != Some("html") {
                continue;
            }
            let excerpt = record.text().and_then(first_paragraph).map(str::to_string);
            record.metadata.excerpt = excerpt;
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
    fn test_first_paragraph() {
        assert_eq!(
            first_paragraph("<h1>T</h1>\n<p>One</p>\n<p>Two</p>"),
            Some("<p>One</p>")
        );
        assert_eq!(
            first_paragraph("<pre><code>x</code></pre><p class=\"lead\">Lead</p>"),
            Some("<p class=\"lead\">Lead</p>")
        );
        assert_eq!(first_paragraph("<pre>only code</pre>"), None);
        assert_eq!(first_paragraph("<p>unclosed"), None);
    }

    #[test]
    fn test_first_paragraph_ignores_comments_and_attributes() {
        assert_eq!(
            first_paragraph("<!-- <p>draft</p> -->\n<p>Real</p>"),
            Some("<p>Real</p>")
        );
        assert_eq!(
            first_paragraph("<div title=\"<p>quoted</p>\"><p>Body<br>text</p></div>"),
            Some("<p>Body<br>text</p>")
        );
        assert_eq!(
            first_paragraph("<!DOCTYPE html><html><body><P>Upper</P></body></html>"),
            Some("<P>Upper</P>")
        );
    }

    #[tokio::test]
    async fn test_sets_missing_excerpts() {
        let mut files = FileStore::new();
        files.set(
            "post/index.html",
            FileRecord::new("", "<h1>Title</h1>\n<p>Intro <em>text</em>.</p>\n<p>More</p>"),
        );
        let mut manual = FileRecord::new("", "<p>Body</p>");
        manual.metadata.excerpt = Some("Hand written".to_string());
        files.set("manual.html", manual);
        files.set("notes.txt", FileRecord::new("", "<p>Not html</p>"));

        ExcerptsStage
            .process(&mut files, &test_context())
            .await
            .unwrap();

        assert_eq!(
            files.get("post/index.html").unwrap().metadata.excerpt.as_deref(),
            Some("<p>Intro <em>text</em>.</p>")
        );
        assert_eq!(
            files.get("manual.html").unwrap().metadata.excerpt.as_deref(),
            Some("Hand written")
        );
        assert_eq!(files.get("notes.txt").unwrap().metadata.excerpt, None);
    }
}
