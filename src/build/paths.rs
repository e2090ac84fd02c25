//! Virtual path utilities.
//!
//! Store keys are relative, `/`-separated paths independent of the host OS.
//! This module converts between them and real filesystem paths and provides
//! the small amount of path arithmetic the relocation stages need.

use std::path::{Component, Path, PathBuf};

/// Convert a source-relative filesystem path to a store key.
///
/// # Examples
/// ```ignore
/// key_from_relative("posts/hello.md") => "posts/hello.md"
/// key_from_relative("posts\\hello.md") => "posts/hello.md"   // on Windows
/// ```
pub fn key_from_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a store key to an output file path under `output_dir`.
///
/// Empty and `.`/`..` segments are dropped so a key can never escape the
/// output directory.
pub fn key_to_output_path(key: &str, output_dir: &Path) -> PathBuf {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .fold(output_dir.to_path_buf(), |path, segment| path.join(segment))
}

/// Directory part of a key, without a trailing slash ("" for top-level keys).
pub fn parent(key: &str) -> &str {
    match key.rfind('/') {
        Some(pos) => &key[..pos],
        None => "",
    }
}

/// Final segment of a key.
pub fn file_name(key: &str) -> &str {
    match key.rfind('/') {
        Some(pos) => &key[pos + 1..],
        None => key,
    }
}

/// Extension of the final segment, if any (a leading dot is not an extension).
pub fn extension(key: &str) -> Option<&str> {
    let name = file_name(key);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&name[pos + 1..]),
    }
}

/// Replace (or add) the extension of a key.
pub fn with_extension(key: &str, ext: &str) -> String {
    let dir = parent(key);
    let name = file_name(key);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    };
    join(dir, &format!("{stem}.{ext}"))
}

/// Join two virtual paths, normalizing slashes.
///
/// ```ignore
/// join("posts/sub", "my-post") => "posts/sub/my-post"
/// join("", "my-post") => "my-post"
/// join("a/", "/b/") => "a/b"
/// ```
pub fn join(base: &str, rest: &str) -> String {
    base.split('/')
        .chain(rest.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Key of the index page for a directory-style URL.
///
/// ```ignore
/// index_key("posts/my-post", "html") => "posts/my-post/index.html"
/// ```
pub fn index_key(dir: &str, ext: &str) -> String {
    join(dir, &format!("index.{ext}"))
}

/// URL path of a key relative to the site root.
///
/// With `omit_index`, `a/index.html` becomes `a/` and `index.html` becomes "".
pub fn url_path(key: &str, omit_index: bool) -> String {
    if omit_index && file_name(key) == "index.html" {
        match parent(key) {
            "" => String::new(),
            dir => format!("{dir}/"),
        }
    } else {
        key.to_string()
    }
}

/// Absolute URL of a key under `base_url`.
pub fn absolute_url(base_url: &str, key: &str, omit_index: bool) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url_path(key, omit_index)
    )
}
