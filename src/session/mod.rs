//! Session wiring and configuration.
//!
//! # Example
//!
//! ```ignore
//! use dap_sourcemap_bridge::{BridgeOptions, Session};
//!
//! let (reader, writer) = tokio::io::split(stream);
//! let session = Session::builder()
//!     .web_root("/home/me/project")
//!     .remote(remote)
//!     .options(BridgeOptions::new().with_source_maps(true))
//!     .build(reader, writer)?;
//!
//! let listener = session.spawn_script_listener(scripts);
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session core.
pub mod core;

/// Bridge options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::Session;
pub use options::BridgeOptions;
