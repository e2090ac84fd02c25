mod builder;
pub mod document;
pub mod paths;
pub mod pipeline;
pub mod store;
mod watch;

pub use builder::{BuildResult, Builder};
pub use watch::{FileWatcher, WatchEvent, WatchPaths};
