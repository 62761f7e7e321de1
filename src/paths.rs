//! Path and URL helpers shared by the resolvers.
//!
//! Paths are handled as strings rather than [`std::path::Path`] because the
//! bridge routinely sees paths from another platform: a Windows client may
//! debug a runtime that reports POSIX URLs and vice versa. A path is
//! "Windows-style" when it starts with a drive letter or a UNC prefix, and
//! keeps backslash separators through every operation.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use url::Url;

// ============================================================================
// Constants
// ============================================================================

const SEPARATORS: [char; 2] = ['/', '\\'];

const FILE_SCHEME: &str = "file://";

// ============================================================================
// Classification
// ============================================================================

/// Returns `true` if `path` starts with a drive letter such as `C:`.
#[must_use]
pub fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Returns `true` for drive-letter and UNC paths.
#[must_use]
pub fn is_windows_path(path: &str) -> bool {
    has_drive_letter(path) || path.starts_with("\\\\")
}

/// Returns `true` if `path` is absolute on either platform.
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATORS) || has_drive_letter(path)
}

/// Returns `true` if `value` carries a URL scheme (`http://`, `webpack://`, `data:`).
///
/// Drive letters are not schemes.
#[must_use]
pub fn is_url(value: &str) -> bool {
    if value.starts_with("data:") {
        return true;
    }
    match value.find("://") {
        Some(end) if end >= 2 => value[..end]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

// ============================================================================
// Manipulation
// ============================================================================

/// Resolves `.` and `..`, collapses repeated separators, strips trailing
/// separators and upper-cases the drive letter.
///
/// Windows-style paths come back with `\` separators, everything else with `/`.
#[must_use]
pub fn normalize(path: &str) -> String {
    let windows = is_windows_path(path);
    let sep = if windows { '\\' } else { '/' };

    let (mut out, rest) = if has_drive_letter(path) {
        let drive = path[..1].to_ascii_uppercase();
        (format!("{drive}:"), &path[2..])
    } else if path.starts_with("\\\\") {
        (String::from("\\\\"), &path[2..])
    } else {
        (String::new(), path)
    };

    let rooted = rest.starts_with(SEPARATORS);
    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split(SEPARATORS) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    if rooted {
        out.push(sep);
    }
    out.push_str(&parts.join(&sep.to_string()));
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Joins `relative` onto `base`; an absolute `relative` replaces `base`.
#[must_use]
pub fn join(base: &str, relative: &str) -> String {
    if base.is_empty() || is_absolute(relative) {
        return normalize(relative);
    }
    let sep = if is_windows_path(base) { '\\' } else { '/' };
    normalize(&format!("{base}{sep}{relative}"))
}

/// Joins a possibly rooted `relative` under `base`, treating a leading
/// separator as "relative to base" rather than "replace base".
#[must_use]
pub fn join_under(base: &str, relative: &str) -> String {
    join(base, relative.trim_start_matches(SEPARATORS))
}

/// Returns the directory part of `path`.
#[must_use]
pub fn dirname(path: &str) -> String {
    let path = normalize(path);
    match path.rfind(SEPARATORS) {
        Some(0) => path[..1].to_string(),
        Some(2) if has_drive_letter(&path) => path[..3].to_string(),
        Some(idx) => path[..idx].to_string(),
        None => String::from("."),
    }
}

/// Returns the last component of `path` or URL.
#[must_use]
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATORS);
    trimmed
        .rfind(SEPARATORS)
        .map_or(trimmed, |idx| &trimmed[idx + 1..])
}

/// Replaces backslashes with forward slashes.
#[must_use]
pub fn to_forward_slashes(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Returns a stable lookup key for `path`.
///
/// Windows-style paths compare case-insensitively, so their key is
/// lower-cased; POSIX paths compare exactly.
#[must_use]
pub fn canonical_key(path: &str) -> String {
    if let Some(local) = file_url_to_path(path) {
        return canonical_key(&local);
    }
    if is_url(path) {
        return path.to_string();
    }
    let normalized = normalize(path);
    if is_windows_path(&normalized) {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

// ============================================================================
// URLs
// ============================================================================

/// Decodes a `file://` URL to a local path.
///
/// `file:///C:/proj/src` becomes `C:\proj\src`; `file:///home/a.js` becomes
/// `/home/a.js`. Returns `None` for other schemes.
#[must_use]
pub fn file_url_to_path(value: &str) -> Option<String> {
    let rest = value
        .get(..FILE_SCHEME.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(FILE_SCHEME))
        .map(|_| &value[FILE_SCHEME.len()..])?;

    let decoded = urlencoding::decode(rest).unwrap_or(Cow::Borrowed(rest));

    if let Some(stripped) = decoded.strip_prefix('/')
        && has_drive_letter(stripped)
    {
        return Some(normalize(stripped));
    }
    Some(normalize(&decoded))
}

/// Maps an `http(s)` URL onto a path under `web_root`.
///
/// `http://localhost:8080/js/app.js` with web root `/proj/www` becomes
/// `/proj/www/js/app.js`. Query strings and fragments are dropped.
#[must_use]
pub fn web_url_to_path(value: &str, web_root: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let decoded = urlencoding::decode(url.path()).ok()?;
    Some(join_under(web_root, &decoded))
}

/// Returns the directory portion of a URL's path, e.g. `/js` for
/// `http://host/js/app.js`.
#[must_use]
pub fn url_directory(value: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    let decoded = urlencoding::decode(url.path()).ok()?;
    Some(dirname(&decoded))
}

// ============================================================================
// Tests
// ============================================================================
