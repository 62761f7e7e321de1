//! Source map engine.
//!
//! Everything needed to turn a generated file into a position index over
//! its authored sources, independent of the translator that uses it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `discovery` | Finding and reading a file's map |
//! | `map` | Parsed map and 0-based position queries |
//! | `mappings` | VLQ decoding and the mapping table |
//! | `overrides` | Bundler path overrides |
//! | `root` | `sourceRoot` and `sources` resolution |

// ============================================================================
// Submodules
// ============================================================================

/// Finding and reading a file's map.
pub mod discovery;

/// Parsed map and 0-based position queries.
pub mod map;

/// VLQ decoding and the mapping table.
pub mod mappings;

/// Bundler path overrides.
pub mod overrides;

/// `sourceRoot` and `sources` resolution.
pub mod root;

// ============================================================================
// Re-exports
// ============================================================================

pub use discovery::load_source_map;
pub use map::{MapContext, MappingResult, SourceMap};
pub use overrides::PathOverrides;

// ============================================================================
// Test Support
// ============================================================================
