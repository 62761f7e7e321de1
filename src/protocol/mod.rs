//! Client protocol message types.
//!
//! This module defines the JSON messages exchanged with the debugging client.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Either | Command request |
//! | `Response` | Either | Reply correlated by `request_seq` |
//! | `Event` | Either | Notification |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Envelope types |
//! | `types` | Arguments and bodies of translated commands |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope types.
pub mod message;

/// Arguments and bodies of translated commands.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Event, ProtocolMessage, Request, Response};
pub use types::{
    Breakpoint, BreakpointLocation, InitializeArguments, ScriptObserved, SetBreakpointsArguments,
    SetBreakpointsResponseBody, Source, SourceBreakpoint, StackFrame, StackTraceArguments,
    StackTraceResponseBody,
};

// ============================================================================
// Command Names
// ============================================================================

/// Command names the bridge knows about.
pub mod command {
    /// `initialize`
    pub const INITIALIZE: &str = "initialize";
    /// `launch`
    pub const LAUNCH: &str = "launch";
    /// `attach`
    pub const ATTACH: &str = "attach";
    /// `configurationDone`
    pub const CONFIGURATION_DONE: &str = "configurationDone";
    /// `disconnect`
    pub const DISCONNECT: &str = "disconnect";
    /// `setBreakpoints`
    pub const SET_BREAKPOINTS: &str = "setBreakpoints";
    /// `stackTrace`
    pub const STACK_TRACE: &str = "stackTrace";
}
