//! Parsed source map for one generated file.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::trace;

use crate::error::{Error, Result};
use crate::paths;

use super::mappings::{self, MappingTable};
use super::overrides::PathOverrides;
use super::root;

// ============================================================================
// RawSourceMap
// ============================================================================

/// On-disk source map format (revision 3).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    mappings: String,
    #[serde(default)]
    sections: Option<serde_json::Value>,
}

// ============================================================================
// MapContext
// ============================================================================

/// Session-wide inputs to source resolution.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    /// Project/web root used for rooted `sourceRoot`s and web URLs.
    pub web_root: String,
    /// Bundler-specific source rewrites.
    pub overrides: PathOverrides,
}

// ============================================================================
// MappingResult
// ============================================================================

/// A mapped position, 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingResult {
    /// File the position lies in.
    pub path: String,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

// ============================================================================
// SourceMap
// ============================================================================

/// An immutable, fully resolved source map.
///
/// All `sources` are absolute paths. Public positions are 0-based; the
/// mapping table underneath uses 1-based lines.
#[derive(Debug, Clone)]
pub struct SourceMap {
    generated_path: String,
    abs_source_root: String,
    sources: Vec<String>,
    source_index: FxHashMap<String, u32>,
    table: MappingTable,
}

impl SourceMap {
    /// Parses map JSON for the generated file known as `generated`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceMap`] for unsupported versions, indexed maps or
    /// undecodable mappings, and [`Error::Json`] for invalid JSON.
    pub fn parse(json: &str, generated: &str, context: &MapContext) -> Result<Self> {
        let raw: RawSourceMap = serde_json::from_str(json)?;

        if let Some(version) = raw.version
            && version != 3
        {
            return Err(Error::source_map(format!("unsupported version {version}")));
        }
        if raw.sections.is_some() {
            return Err(Error::source_map("indexed source maps are not supported"));
        }

        let abs_source_root =
            root::resolve_source_root(raw.source_root.as_deref(), generated, &context.web_root);

        let sources: Vec<String> = raw
            .sources
            .iter()
            .map(|source| {
                root::resolve_source(
                    source.as_deref().unwrap_or_default(),
                    &abs_source_root,
                    &context.web_root,
                    &context.overrides,
                )
            })
            .collect();

        let mut source_index = FxHashMap::default();
        for (idx, source) in sources.iter().enumerate() {
            source_index
                .entry(paths::canonical_key(source))
                .or_insert(idx as u32);
        }

        let decoded = mappings::decode(&raw.mappings, sources.len())?;
        let table = MappingTable::new(&decoded);

        trace!(
            generated,
            sources = sources.len(),
            mappings = table.len(),
            "Source map parsed"
        );

        Ok(Self {
            generated_path: generated.to_string(),
            abs_source_root,
            sources,
            source_index,
            table,
        })
    }

    /// Path (or URL) of the generated file.
    #[inline]
    #[must_use]
    pub fn generated_path(&self) -> &str {
        &self.generated_path
    }

    /// Resolved absolute source root.
    #[inline]
    #[must_use]
    pub fn abs_source_root(&self) -> &str {
        &self.abs_source_root
    }

    /// Absolute authored source paths, in map order.
    #[inline]
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Returns `true` if `path` is one of this map's authored sources.
    #[must_use]
    pub fn contains_source(&self, path: &str) -> bool {
        self.source_index.contains_key(&paths::canonical_key(path))
    }

    /// Maps an authored position to the generated file.
    #[must_use]
    pub fn generated_position_for(
        &self,
        authored_path: &str,
        line: u32,
        column: u32,
    ) -> Option<MappingResult> {
        let source = *self.source_index.get(&paths::canonical_key(authored_path))?;
        let generated = self
            .table
            .generated_position_for(source, line + 1, column)?;

        Some(MappingResult {
            path: self.generated_path.clone(),
            line: generated.line - 1,
            column: generated.column,
        })
    }

    /// Maps a generated position to its authored source.
    #[must_use]
    pub fn authored_position_for(&self, line: u32, column: u32) -> Option<MappingResult> {
        let original = self.table.original_position_for(line + 1, column)?;
        let path = self.sources.get(original.source as usize)?;

        Some(MappingResult {
            path: path.clone(),
            line: original.line - 1,
            column: original.column,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::sourcemap::testing::identity_map;

    fn context() -> MapContext {
        MapContext {
            web_root: "/proj".into(),
            overrides: PathOverrides::defaults(),
        }
    }

    #[test]
    fn test_identity_round_trip() {
        let map = SourceMap::parse(&identity_map(20, "app.ts"), "/proj/out/app.js", &context())
            .expect("parse");

        assert_eq!(map.sources(), ["/proj/out/app.ts"]);

        let generated = map
            .generated_position_for("/proj/out/app.ts", 7, 0)
            .expect("mapped");
        assert_eq!((generated.line, generated.column), (7, 0));
        assert_eq!(generated.path, "/proj/out/app.js");

        let authored = map
            .authored_position_for(generated.line, generated.column)
            .expect("mapped");
        assert_eq!(authored.path, "/proj/out/app.ts");
        assert_eq!((authored.line, authored.column), (7, 0));
    }

    #[test]
    fn test_source_root_applied_to_sources() {
        let json = json!({
            "version": 3,
            "sourceRoot": "../src",
            "sources": ["a.ts", "webpack:///./lib/b.ts"],
            "mappings": "AAAA"
        })
        .to_string();

        let map = SourceMap::parse(&json, "/proj/out/a.js", &context()).expect("parse");
        assert_eq!(map.abs_source_root(), "/proj/src");
        assert_eq!(map.sources(), ["/proj/src/a.ts", "/proj/lib/b.ts"]);
        assert!(map.contains_source("/proj/src/./a.ts"));
        assert!(!map.contains_source("/proj/src/c.ts"));
    }

    #[test]
    fn test_windows_sources_match_case_insensitively() {
        let map = SourceMap::parse(
            &identity_map(3, "App.ts"),
            "C:\\proj\\out\\app.js",
            &context(),
        )
        .expect("parse");

        let generated = map
            .generated_position_for("c:/PROJ/out/app.ts", 2, 0)
            .expect("mapped");
        assert_eq!(generated.line, 2);
    }

    #[test]
    fn test_unknown_source_is_not_found() {
        let map = SourceMap::parse(&identity_map(3, "app.ts"), "/proj/app.js", &context())
            .expect("parse");
        assert!(map.generated_position_for("/proj/other.ts", 0, 0).is_none());
        assert!(map.authored_position_for(50, 0).is_none());
    }

    #[test]
    fn test_rejects_indexed_and_wrong_version() {
        let indexed = json!({"version": 3, "sections": []}).to_string();
        assert!(SourceMap::parse(&indexed, "/a.js", &context()).is_err());

        let v2 = json!({"version": 2, "sources": [], "mappings": ""}).to_string();
        assert!(SourceMap::parse(&v2, "/a.js", &context()).is_err());
    }
}
