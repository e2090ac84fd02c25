//! Configuration loading and types for ferrosmith.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Loading configs from files and the environment (`load`)

mod load;
mod types;

// Re-export all types for convenient access
pub use types::{
    AssetsConfig, CollectionConfig, Config, DateInFilenameConfig, DateUrlsConfig, DevConfig,
    ElevateConfig, FeedConfig, FileMetadataConfig, LogConfig, LogFormat, MarkdownConfig,
    PermalinksConfig, RenameConfig, SiteMetadata, SitemapConfig, SortKey, StageConfig,
    WatchConfig,
};

pub use load::{DEFAULT_CONFIG_FILE, base_path_from_config};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),
}
