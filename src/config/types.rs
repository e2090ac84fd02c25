//! Configuration type definitions.
//!
//! This module contains the data structures read from `ferrosmith.yaml`.
//! These types are pure data - no I/O or complex logic.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// =============================================================================
// Top-level config
// =============================================================================

/// Site configuration - everything needed to run one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide metadata available to every stage
    #[serde(default)]
    pub site: SiteMetadata,
    /// Directory to read content from (relative to the config file)
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Directory to write the site to (relative to the config file)
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    /// Remove the destination directory before writing
    #[serde(default = "default_true")]
    pub clean: bool,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    /// Transform stages, in order. `None` selects the default pipeline.
    #[serde(default)]
    pub pipeline: Option<Vec<StageConfig>>,
    /// Development-specific settings (watch mode, etc.)
    #[serde(default)]
    pub dev: DevConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_source() -> PathBuf {
    PathBuf::from("src")
}

fn default_destination() -> PathBuf {
    PathBuf::from("build")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// The configured stages, or the default pipeline if none are configured.
    pub fn stages(&self) -> Vec<StageConfig> {
        self.pipeline
            .clone()
            .unwrap_or_else(StageConfig::default_pipeline)
    }
}

// =============================================================================
// Site metadata
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    /// Arbitrary settings for collaborator stages
    #[serde(default)]
    pub extra: serde_json::Value,
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Extensions to enable for markdown processing
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
}

fn default_markdown_extensions() -> Vec<String> {
    vec![
        "footnotes".to_string(),
        "heading_attributes".to_string(),
        "strikethrough".to_string(),
        "tables".to_string(),
        "tasklists".to_string(),
    ]
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
        }
    }
}

// =============================================================================
// Stage configuration
// =============================================================================

/// One entry of the `pipeline:` list.
///
/// ```yaml
/// pipeline:
///   - stage: markdown
///   - stage: permalinks
///     replacement: "_"
///   - stage: rename
///     from: '(.+)\.hbs'
///     to: '$1.html'
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    DateInFilename(DateInFilenameConfig),
    Collections(CollectionConfig),
    FileMetadata(FileMetadataConfig),
    Elevate(ElevateConfig),
    Markdown,
    Permalinks(PermalinksConfig),
    DateUrls(DateUrlsConfig),
    Excerpts,
    Assets(AssetsConfig),
    Rename(RenameConfig),
    Feed(FeedConfig),
    Sitemap(SitemapConfig),
}

impl StageConfig {
    /// The pipeline used when the config file does not list one: a blog with
    /// dated posts under `posts/`.
    pub fn default_pipeline() -> Vec<StageConfig> {
        vec![
            StageConfig::DateInFilename(DateInFilenameConfig::default()),
            StageConfig::Collections(CollectionConfig {
                name: "posts".to_string(),
                pattern: "^posts/".to_string(),
                sort_by: SortKey::Date,
                reverse: true,
            }),
            StageConfig::FileMetadata(FileMetadataConfig {
                pattern: "^posts/[^/]+$".to_string(),
                metadata: BTreeMap::from([
                    ("type".to_string(), serde_yaml::Value::from("post")),
                    ("layout".to_string(), serde_yaml::Value::from("post.hbs")),
                ]),
                preserve: true,
            }),
            StageConfig::Elevate(ElevateConfig {
                pattern: "^posts/".to_string(),
                depth: 1,
            }),
            StageConfig::Markdown,
            StageConfig::Permalinks(PermalinksConfig::default()),
            StageConfig::DateUrls(DateUrlsConfig::default()),
            StageConfig::Excerpts,
            StageConfig::Assets(AssetsConfig::default()),
            StageConfig::Rename(RenameConfig {
                from: r"(.+)\.hbs$".to_string(),
                to: "$1.html".to_string(),
            }),
            StageConfig::Feed(FeedConfig::default()),
            StageConfig::Rename(RenameConfig {
                from: r"^rss\.xml$".to_string(),
                to: "rss/index.xml".to_string(),
            }),
            StageConfig::Sitemap(SitemapConfig::default()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateInFilenameConfig {
    /// Replace a date already set in front matter
    #[serde(default)]
    pub override_existing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    /// Regex matched against store keys
    pub pattern: String,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub reverse: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Title,
    Path,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadataConfig {
    /// Regex matched against store keys
    pub pattern: String,
    /// Attributes to apply, in front matter form (`type`, `layout`, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_yaml::Value>,
    /// Keep values the record already has
    #[serde(default = "default_true")]
    pub preserve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevateConfig {
    /// Regex matched against store keys
    pub pattern: String,
    /// Number of leading directories to remove
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermalinksConfig {
    /// Characters deleted from the title before slugging
    #[serde(default = "default_strip")]
    pub strip: String,
    /// Runs of characters replaced by `replacement`
    #[serde(default = "default_disallowed")]
    pub disallowed: String,
    #[serde(default = "default_replacement")]
    pub replacement: String,
    /// Keep the record's extension for the index file instead of `html`
    #[serde(default)]
    pub preserve_extension: bool,
}

fn default_strip() -> String {
    "['‘’]".to_string()
}

fn default_disallowed() -> String {
    "[^a-z]+".to_string()
}

fn default_replacement() -> String {
    "-".to_string()
}

impl Default for PermalinksConfig {
    fn default() -> Self {
        Self {
            strip: default_strip(),
            disallowed: default_disallowed(),
            replacement: default_replacement(),
            preserve_extension: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateUrlsConfig {
    /// Placed between year, month and day
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "/".to_string()
}

impl Default for DateUrlsConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameConfig {
    /// Regex matched against store keys
    pub from: String,
    /// Target template with `$1`, `$2`, ... placeholders
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory copied into the site (relative to the config file)
    #[serde(default = "default_assets_source")]
    pub source: PathBuf,
    /// Store prefix the copied files are placed under
    #[serde(default = "default_assets_destination")]
    pub destination: String,
}

fn default_assets_source() -> PathBuf {
    PathBuf::from("assets")
}

fn default_assets_destination() -> String {
    "assets".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            source: default_assets_source(),
            destination: default_assets_destination(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Collection the items are taken from
    #[serde(default = "default_feed_collection")]
    pub collection: String,
    /// Maximum number of items
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
    /// Store key of the generated feed
    #[serde(default = "default_feed_destination")]
    pub destination: String,
}

fn default_feed_collection() -> String {
    "posts".to_string()
}

fn default_feed_limit() -> usize {
    20
}

fn default_feed_destination() -> String {
    "rss.xml".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            collection: default_feed_collection(),
            limit: default_feed_limit(),
            destination: default_feed_destination(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Base URL of the site; `site.url` when unset
    #[serde(default)]
    pub hostname: Option<String>,
    /// List `a/index.html` as `a/`
    #[serde(default = "default_true")]
    pub omit_index: bool,
    /// `<priority>` given to every entry
    #[serde(default = "default_sitemap_priority")]
    pub priority: Option<String>,
    /// Regex selecting the records to list
    #[serde(default = "default_sitemap_pattern")]
    pub pattern: String,
    /// Store key of the generated sitemap
    #[serde(default = "default_sitemap_destination")]
    pub destination: String,
}

fn default_sitemap_pattern() -> String {
    r"\.html$".to_string()
}

fn default_sitemap_priority() -> Option<String> {
    Some("0.8".to_string())
}

fn default_sitemap_destination() -> String {
    "sitemap.xml".to_string()
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            omit_index: true,
            priority: default_sitemap_priority(),
            pattern: default_sitemap_pattern(),
            destination: default_sitemap_destination(),
        }
    }
}

// =============================================================================
// Development configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// File watching configuration
    #[serde(default)]
    pub watch: WatchConfig,
    /// Enable live reload in the browser when files change (default: true)
    #[serde(default = "default_true")]
    pub live_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            live_reload: true,
        }
    }
}

/// Configuration for file watching during development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems, Docker volumes, or other situations
    /// where native events are unreliable.
    #[serde(default)]
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    /// Changes within this window are batched together.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

// =============================================================================
// Logging configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
