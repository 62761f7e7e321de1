//! `sourceRoot` and `sources` resolution.
//!
//! Turns the relative, URL-ish entries of a source map into absolute local
//! paths that can be compared with the paths a client sends.

// ============================================================================
// Imports
// ============================================================================

use crate::paths;

use super::overrides::PathOverrides;

// ============================================================================
// sourceRoot
// ============================================================================

/// Resolves a map's `sourceRoot` to an absolute directory.
///
/// `generated` is the generated file's local path, or its URL when no local
/// path is known. Rules, in order:
///
/// 1. `file:///` roots decode to a local path.
/// 2. Rooted paths (`/src`) are taken relative to `web_root`.
/// 3. Relative roots resolve against the generated file's directory, or
///    against `web_root` plus the URL's directory for URL-only files.
/// 4. No root means the generated file's directory.
///
/// The result has no trailing separator and an upper-case drive letter.
#[must_use]
pub fn resolve_source_root(source_root: Option<&str>, generated: &str, web_root: &str) -> String {
    let generated_dir = || {
        if paths::is_url(generated) {
            let url_dir = paths::url_directory(generated).unwrap_or_default();
            paths::join_under(web_root, &url_dir)
        } else {
            paths::dirname(generated)
        }
    };

    let resolved = match source_root.filter(|root| !root.is_empty()) {
        Some(root) => {
            if let Some(local) = paths::file_url_to_path(root) {
                local
            } else if let Some(local) = paths::web_url_to_path(root, web_root) {
                local
            } else if root.starts_with(['/', '\\']) {
                paths::join_under(web_root, root)
            } else {
                paths::join(&generated_dir(), root)
            }
        }
        None => generated_dir(),
    };

    paths::normalize(&resolved)
}

// ============================================================================
// sources
// ============================================================================

/// Resolves one `sources` entry against the resolved source root.
///
/// Path overrides are tried first; entries that are already absolute paths
/// or `file://` URLs are used as they are.
#[must_use]
pub fn resolve_source(
    source: &str,
    abs_source_root: &str,
    web_root: &str,
    overrides: &PathOverrides,
) -> String {
    if let Some(mapped) = overrides.apply(source, web_root) {
        return paths::join(abs_source_root, &mapped);
    }
    if let Some(local) = paths::file_url_to_path(source) {
        return local;
    }
    if let Some(local) = paths::web_url_to_path(source, web_root) {
        return local;
    }
    if paths::is_url(source) {
        return source.to_string();
    }
    paths::join(abs_source_root, source)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GEN_PATH: &str = "C:\\proj\\web\\code\\a.js";
    const WEB_ROOT: &str = "C:\\proj\\web";

    #[test]
    fn test_relative_root() {
        assert_eq!(
            resolve_source_root(Some("../src"), GEN_PATH, WEB_ROOT),
            "C:\\proj\\web\\src"
        );
    }

    #[test]
    fn test_rooted_root_uses_web_root() {
        assert_eq!(
            resolve_source_root(Some("/src"), GEN_PATH, WEB_ROOT),
            "C:\\proj\\web\\src"
        );
    }

    #[test]
    fn test_file_url_root() {
        assert_eq!(
            resolve_source_root(Some("file:///C:/proj/src"), GEN_PATH, WEB_ROOT),
            "C:\\proj\\src"
        );
    }

    #[test]
    fn test_missing_root_is_generated_dir() {
        assert_eq!(resolve_source_root(None, GEN_PATH, WEB_ROOT), "C:\\proj\\web\\code");
        assert_eq!(resolve_source_root(Some(""), GEN_PATH, WEB_ROOT), "C:\\proj\\web\\code");
    }

    #[test]
    fn test_trailing_separator_and_drive_case() {
        assert_eq!(
            resolve_source_root(Some("../src/"), "c:\\proj\\web\\code\\a.js", WEB_ROOT),
            "C:\\proj\\web\\src"
        );
    }

    #[test]
    fn test_url_only_generated_file() {
        assert_eq!(
            resolve_source_root(Some("../src"), "http://localhost:8080/js/app.js", "/proj/www"),
            "/proj/www/src"
        );
        assert_eq!(
            resolve_source_root(None, "http://localhost:8080/js/app.js", "/proj/www"),
            "/proj/www/js"
        );
    }

    #[test]
    fn test_resolve_sources() {
        let overrides = PathOverrides::defaults();
        let root = "/proj/src";

        assert_eq!(resolve_source("lib/a.ts", root, "/proj", &overrides), "/proj/src/lib/a.ts");
        assert_eq!(resolve_source("/abs/b.ts", root, "/proj", &overrides), "/abs/b.ts");
        assert_eq!(
            resolve_source("file:///abs/c.ts", root, "/proj", &overrides),
            "/abs/c.ts"
        );
        assert_eq!(
            resolve_source("webpack:///./app/d.ts", root, "/proj", &overrides),
            "/proj/app/d.ts"
        );
        assert_eq!(
            resolve_source("custom://e.ts", root, "/proj", &PathOverrides::new()),
            "custom://e.ts"
        );
    }
}
