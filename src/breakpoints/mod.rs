//! Breakpoint commits against the remote runtime.
//!
//! The runtime only adds and removes single breakpoints; the client always
//! sends the complete set for a file. [`BreakpointCommitter`] bridges the
//! two by clearing and rebuilding a script's set on every request.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RemoteDebuggerClient`] | Runtime operations the bridge needs |
//! | [`BreakpointCommitter`] | Whole-set replacement, one commit at a time |

// ============================================================================
// Submodules
// ============================================================================

/// Whole-set breakpoint replacement.
pub mod committer;

// ============================================================================
// Imports
// ============================================================================

use futures_util::future::BoxFuture;

use crate::error::Result;
use crate::identifiers::{BreakpointId, ScriptId};

// ============================================================================
// Re-exports
// ============================================================================

pub use committer::BreakpointCommitter;

// ============================================================================
// Remote Types
// ============================================================================

/// A breakpoint the runtime accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBreakpoint {
    /// Runtime identifier, used to remove it later.
    pub breakpoint_id: BreakpointId,
    /// 0-based line the runtime actually bound to.
    pub actual_line: u32,
    /// 0-based column the runtime actually bound to.
    pub actual_column: u32,
}

/// One frame of the runtime's current call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFrame {
    /// Script the frame executes in.
    pub script_id: ScriptId,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    /// Function name; empty for anonymous code.
    pub function_name: String,
}

// ============================================================================
// RemoteDebuggerClient
// ============================================================================

/// Connection to the debuggee's own protocol.
///
/// All coordinates are 0-based and refer to generated scripts.
pub trait RemoteDebuggerClient: Send + Sync + 'static {
    /// Adds one breakpoint.
    fn set_breakpoint<'a>(
        &'a self,
        script_id: &'a ScriptId,
        line: u32,
        column: u32,
        condition: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RemoteBreakpoint>>;

    /// Removes one breakpoint.
    fn remove_breakpoint<'a>(&'a self, breakpoint_id: &'a BreakpointId) -> BoxFuture<'a, Result<()>>;

    /// Returns the paused call stack, innermost frame first.
    fn stack_trace(&self) -> BoxFuture<'_, Result<Vec<RemoteFrame>>>;
}

// ============================================================================
// Test Support
// ============================================================================
