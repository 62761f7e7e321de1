//! DAP Source Map Bridge - debug adapter translation layer.
//!
//! This library sits between a debugging client (an IDE speaking the Debug
//! Adapter Protocol) and a remote JavaScript runtime that only knows about
//! generated scripts. It translates what the client sees (authored files,
//! 1-based lines, local paths) into what the runtime needs (generated
//! scripts, 0-based lines, URLs) and back again.
//!
//! # Architecture
//!
//! ```text
//!  Client ──► Channel ──► TranslatorPipeline ──► BridgeAdapter ──► Runtime
//!                          │ LineColumn                 │
//!                          │ SourceMap                  ▼
//!                          │ Path               BreakpointCommitter
//! ```
//!
//! Key design principles:
//!
//! - Request hooks run in registration order, response hooks in reverse
//! - Everything behind the translators is 0-based and URL-addressed
//! - Requests for scripts the runtime has not loaded yet wait for them
//! - The breakpoint set of a file is replaced as a whole, one commit at a time
//!
//! # Quick Start
//!
//! ```ignore
//! use dap_sourcemap_bridge::{Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let remote = connect_runtime().await?;
//!     let (scripts_tx, scripts_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let session = Session::builder()
//!         .web_root("/home/me/project")
//!         .remote(remote)
//!         .build(tokio::io::stdin(), tokio::io::stdout())?;
//!
//!     session.spawn_script_listener(scripts_rx).await.ok();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Operations behind the translators |
//! | [`breakpoints`] | Remote runtime seam and whole-set commits |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`paths`] | Path and URL helpers |
//! | [`protocol`] | Client message types |
//! | [`session`] | Session wiring and configuration |
//! | [`sourcemap`] | Source map parsing and lookup |
//! | [`translator`] | Translator trait and pipeline |
//! | [`transport`] | Framed client channel |

// ============================================================================
// Modules
// ============================================================================

/// Operations behind the translators.
pub mod adapter;

/// Remote runtime seam and whole-set breakpoint commits.
pub mod breakpoints;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for runtime entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Path and URL helpers shared by the translators.
pub mod paths;

/// Client protocol message types.
pub mod protocol;

/// Session wiring and configuration.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// Source map parsing, discovery and lookup.
pub mod sourcemap;

/// Translator trait and pipeline.
pub mod translator;

/// Framed client channel.
///
/// Handles `Content-Length` framing and request/response correlation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{BridgeOptions, Session, SessionBuilder};

// Breakpoint types
pub use breakpoints::{BreakpointCommitter, RemoteBreakpoint, RemoteDebuggerClient, RemoteFrame};

// Translator types
pub use translator::{
    DebugAdapter, HookContext, LineColumnTranslator, PathResolver, SourceMapResolver, Translator,
    TranslatorPipeline,
};

// Transport types
pub use transport::{Channel, MessageSink};

// Protocol types
pub use protocol::{Event, Request, Response, ScriptObserved};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{BreakpointId, ScriptId};
