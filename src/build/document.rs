use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_yaml::{Mapping, Value};

// =============================================================================
// File records
// =============================================================================

/// One logical content unit flowing through the pipeline.
///
/// Records are owned by the [`FileStore`](super::store::FileStore) and keyed by
/// their current path. Stages move them around with
/// [`FileStore::relocate`](super::store::FileStore::relocate), which keeps
/// `path` and `original_path` in sync with the store key.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    /// Current key in the store (e.g., "posts/hello/index.html")
    pub path: String,
    /// Raw payload; only the markdown, excerpt and live-reload stages look inside
    pub contents: Vec<u8>,
    /// Typed front matter plus collaborator-defined attributes
    pub metadata: Metadata,
    /// Path before the most recent relocation
    pub original_path: Option<String>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            metadata: Metadata::default(),
            original_path: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Contents as UTF-8, if they are valid text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// The permalink attribute of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Permalink {
    /// No permalink yet; the permalinks stage derives one from the title.
    #[default]
    Unset,
    /// `permalink: false` in front matter: the record opts out and keeps its path.
    Disabled,
    /// An explicit or previously computed permalink.
    Path(String),
}

impl Permalink {
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Permalink::Path(p) => Some(p),
            _ => None,
        }
    }
}

/// Cached result of the date URL rewrite.
///
/// Holds the inputs it was computed from so a rerun can tell whether the
/// cached URL is still valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateUrlCache {
    pub date: NaiveDate,
    pub permalink: String,
    pub url: String,
}

/// A record's position inside a named collection.
///
/// `previous` and `next` are the store keys of the neighbouring members. The
/// store keeps them current when either neighbour is relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMembership {
    pub name: String,
    pub position: usize,
    pub previous: Option<String>,
    pub next: Option<String>,
}

/// Metadata attached to a record.
///
/// Well-known attributes get typed fields; anything else from the front
/// matter lands in `extra` untouched.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub permalink: Permalink,
    pub date_url: Option<DateUrlCache>,
    /// The front matter `type` attribute
    pub kind: Option<String>,
    pub layout: Option<String>,
    pub excerpt: Option<String>,
    pub collections: Vec<CollectionMembership>,
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    /// Build metadata from a parsed front matter mapping.
    ///
    /// Unparseable values for typed attributes are kept in `extra` with a
    /// warning rather than failing the build.
    pub fn from_mapping(mapping: Mapping) -> Self {
        let mut metadata = Metadata::default();

        for (key, value) in mapping {
            let Some(key) = key.as_str().map(str::to_string) else {
                continue;
            };

            match (key.as_str(), value) {
                ("title", Value::String(title)) => metadata.title = Some(title),
                ("date", Value::String(raw)) => match parse_date(&raw) {
                    Some(date) => metadata.date = Some(date),
                    None => {
                        tracing::warn!(value = %raw, "unrecognized date in front matter");
                        metadata.extra.insert(key.clone(), Value::String(raw));
                    }
                },
                ("permalink", Value::Bool(false)) => metadata.permalink = Permalink::Disabled,
                ("permalink", Value::Bool(true)) => metadata.permalink = Permalink::Unset,
                ("permalink", Value::String(p)) => {
                    let p = p.trim_matches('/').to_string();
                    metadata.permalink = if p.is_empty() {
                        Permalink::Unset
                    } else {
                        Permalink::Path(p)
                    };
                }
                ("type", Value::String(kind)) => metadata.kind = Some(kind),
                ("layout", Value::String(layout)) => metadata.layout = Some(layout),
                ("excerpt", Value::String(excerpt)) => metadata.excerpt = Some(excerpt),
                (_, value) => {
                    metadata.extra.insert(key.clone(), value);
                }
            }
        }

        metadata
    }
}

/// Parse a date from front matter or a file name.
///
/// Accepts RFC 3339 (`2023-03-05T10:00:00+02:00`), a naive date-time
/// (`2023-03-05 10:00:00`, read as UTC) or a bare date (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date);
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(midnight_utc)
}

/// A calendar date at midnight UTC.
pub fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

// =============================================================================
// Front matter
// =============================================================================

/// Result of splitting front matter from a file.
#[derive(Debug)]
pub struct ParsedContent {
    /// The parsed front matter (default if none found)
    pub metadata: Metadata,
    /// The body without the front matter block
    pub content: String,
}

/// Split and parse front matter from text content.
///
/// Front matter is a YAML block delimited by `---` at the start of the file:
///
/// ```markdown
/// ---
/// title: My Page
/// date: 2023-03-05
/// ---
///
/// # Content starts here
/// ```
pub fn parse_front_matter(content: &str) -> ParsedContent {
    let trimmed = content.trim_start();

    if !trimmed.starts_with("---") {
        return ParsedContent {
            metadata: Metadata::default(),
            content: content.to_string(),
        };
    }

    let after_opening = &trimmed[3..];
    let Some(closing_pos) = after_opening.find("\n---") else {
        // No closing delimiter: not front matter
        return ParsedContent {
            metadata: Metadata::default(),
            content: content.to_string(),
        };
    };

    let yaml_content = after_opening[..closing_pos].trim_start_matches('\n');

    // Skip the closing delimiter and the rest of its line
    let rest = &after_opening[closing_pos + 4..];
    let body = match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim_start_matches('\n'),
        None => "",
    };

    let metadata = if yaml_content.trim().is_empty() {
        Metadata::default()
    } else {
        match serde_yaml::from_str::<Mapping>(yaml_content) {
            Ok(mapping) => Metadata::from_mapping(mapping),
            Err(e) => {
                tracing::warn!("failed to parse front matter: {e}");
                Metadata::default()
            }
        }
    };

    ParsedContent {
        metadata,
        content: body.to_string(),
    }
}
