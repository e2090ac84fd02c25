//! Markdown rendering stage.
//!
//! Renders `.md`/`.markdown` records to HTML with pulldown-cmark and takes
//! the first paragraph as the record's excerpt.

use async_trait::async_trait;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

use crate::build::paths;
use crate::build::pipeline::{PipelineContext, PipelineError, Stage, StageError};
use crate::build::store::FileStore;
use crate::config::MarkdownConfig;

const NAME: &str = "markdown";

/// Stage that converts markdown records to HTML.
///
/// Each markdown record's contents are replaced with the rendered HTML and
/// the record moves to the same path with an `.html` extension. Raw HTML in
/// the source is passed through. Records without an `excerpt` get the first
/// rendered paragraph; other metadata is left untouched.
pub struct MarkdownStage {
    options: Options,
}

impl MarkdownStage {
    pub fn new(config: &MarkdownConfig) -> Result<Self, PipelineError> {
        let mut options = Options::empty();
        for extension in &config.extensions {
            match extension.as_str() {
                "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
                "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
                "gfm" => options.insert(Options::ENABLE_GFM),
                "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
                "smart_punctuation" => options.insert(Options::ENABLE_SMART_PUNCTUATION),
                "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
                "tables" => options.insert(Options::ENABLE_TABLES),
                "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
                other => {
                    return Err(PipelineError::configuration(
                        NAME,
                        format!("invalid markdown extension: {other}"),
                    ));
                }
            }
        }
        Ok(Self { options })
    }

    /// Render markdown to HTML, also returning the first paragraph.
    pub fn render_with_excerpt(&self, markdown: &str) -> (String, Option<String>) {
        let events: Vec<Event<'_>> = Parser::new_ext(markdown, self.options).collect();
        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.iter().cloned());
        (html_output, first_paragraph(&events))
    }
}

/// The first paragraph of a rendered event stream, `<p>` tags included.
fn first_paragraph(events: &[Event<'_>]) -> Option<String> {
    let start = events
        .iter()
        .position(|e| matches!(e, Event::Start(Tag::Paragraph)))?;
    let len = events[start..]
        .iter()
        .position(|e| matches!(e, Event::End(TagEnd::Paragraph)))?;

    let mut excerpt = String::new();
    html::push_html(&mut excerpt, events[start..=start + len].iter().cloned());
    Some(excerpt.trim_end().to_string())
}

fn is_markdown(path: &str) -> bool {
    paths::extension(path)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

#[async_trait]
impl Stage for MarkdownStage {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn process(
        &self,
        files: &mut FileStore,
        _ctx: &PipelineContext,
    ) -> Result<(), StageError> {
        for path in files.keys().into_iter().filter(|p| is_markdown(p)) {
            let Some(record) = files.get_mut(&path) else {
                continue;
            };
            let Some(markdown) = record.text() else {
                return Err(StageError::file(path, "markdown source is not valid UTF-8"));
            };

            let (rendered, excerpt) = self.render_with_excerpt(markdown);
            record.contents = rendered.into_bytes();
            if record.metadata.excerpt.is_none() {
                record.metadata.excerpt = excerpt;
            }
            files.relocate(&path, &paths::with_extension(&path, "html"));
        }

        Ok(())
    }
}
