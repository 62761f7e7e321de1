//! Locating and loading a generated file's source map.
//!
//! Discovery order, first success wins:
//!
//! 1. An explicit map URL announced by the runtime
//! 2. A `//# sourceMappingURL=` comment in the generated file
//! 3. A `<generated>.map` sibling file
//!
//! `data:` URLs in (1) or (2) are decoded in memory. Every failure falls
//! through to the next step; running out of steps means "no map".

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::paths;

use super::map::{MapContext, SourceMap};

// ============================================================================
// Constants
// ============================================================================

/// Matches `//# sourceMappingURL=<url>` and the legacy `//@` form.
static SOURCE_MAPPING_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*//[#@]\s*sourceMappingURL\s*=\s*(\S+)\s*$")
        .unwrap_or_else(|e| panic!("invalid sourceMappingURL pattern: {e}"))
});

/// Suffix of sibling map files.
const MAP_SUFFIX: &str = ".map";

// ============================================================================
// Public API
// ============================================================================

/// Finds, reads and parses the source map of `generated_path`.
///
/// `generated_path` is the local path of the generated file (or its URL when
/// no local path is known; the filesystem steps are skipped then).
pub async fn load_source_map(
    generated_path: &str,
    explicit_url: Option<&str>,
    context: &MapContext,
) -> Option<SourceMap> {
    if let Some(url) = explicit_url.filter(|url| !url.is_empty()) {
        match load_from_url(url, generated_path, context).await {
            Ok(map) => return Some(map),
            Err(e) => debug!(generated_path, url, error = %e, "Explicit source map unusable"),
        }
    }

    if paths::is_url(generated_path) {
        return None;
    }

    if let Some(url) = read_source_mapping_url(generated_path).await {
        match load_from_url(&url, generated_path, context).await {
            Ok(map) => return Some(map),
            Err(e) => debug!(generated_path, url, error = %e, "Inline source map comment unusable"),
        }
    }

    let sibling = format!("{generated_path}{MAP_SUFFIX}");
    match read_map_file(&sibling, generated_path, context).await {
        Ok(map) => Some(map),
        Err(e) => {
            trace!(generated_path, error = %e, "No source map found");
            None
        }
    }
}

/// Returns the last `sourceMappingURL` comment in the file, if any.
pub async fn read_source_mapping_url(generated_path: &str) -> Option<String> {
    let text = tokio::fs::read_to_string(generated_path).await.ok()?;
    find_source_mapping_url(&text)
}

/// Returns the last `sourceMappingURL` comment in `text`, scanning line by line.
#[must_use]
pub fn find_source_mapping_url(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| SOURCE_MAPPING_URL.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .last()
}

/// Decodes the JSON payload of a `data:` URL.
///
/// # Errors
///
/// Returns [`Error::SourceMap`] if the URL is malformed or not valid UTF-8.
pub fn decode_data_url(url: &str) -> Result<String> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::source_map("not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::source_map("data URL without payload"))?;

    if meta.ends_with(";base64") {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::source_map(format!("invalid base64: {e}")))?;
        String::from_utf8(bytes).map_err(|_| Error::source_map("data URL is not UTF-8"))
    } else {
        urlencoding::decode(payload)
            .map(|decoded| decoded.into_owned())
            .map_err(|_| Error::source_map("data URL is not UTF-8"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_from_url(url: &str, generated_path: &str, context: &MapContext) -> Result<SourceMap> {
    if url.starts_with("data:") {
        let json = decode_data_url(url)?;
        return SourceMap::parse(&json, generated_path, context);
    }

    let map_path = if let Some(local) = paths::file_url_to_path(url) {
        local
    } else if let Some(local) = paths::web_url_to_path(url, &context.web_root) {
        local
    } else if paths::is_url(url) {
        return Err(Error::source_map(format!("unsupported map URL {url}")));
    } else if paths::is_url(generated_path) {
        let url_dir = paths::url_directory(generated_path).unwrap_or_default();
        paths::join(&paths::join_under(&context.web_root, &url_dir), url)
    } else {
        paths::join(&paths::dirname(generated_path), url)
    };

    read_map_file(&map_path, generated_path, context).await
}

async fn read_map_file(map_path: &str, generated_path: &str, context: &MapContext) -> Result<SourceMap> {
    let json = tokio::fs::read_to_string(map_path).await?;
    let map = SourceMap::parse(&json, generated_path, context)?;
    debug!(generated_path, map_path, "Source map loaded");
    Ok(map)
}

// ============================================================================
// Tests
// ============================================================================
