//! Typed argument and body structures for the commands the bridge translates.
//!
//! Fields the bridge does not interpret are kept in `extra` maps so that
//! translators rewriting a request never drop what the client sent.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::ScriptId;

// ============================================================================
// Source
// ============================================================================

/// A source file reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Client path or target URL, depending on pipeline stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Source {
    /// Creates a source pointing at `path`, named after its last component.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: Some(crate::paths::basename(&path).to_string()),
            path: Some(path),
            extra: Map::new(),
        }
    }
}

// ============================================================================
// setBreakpoints
// ============================================================================

/// A breakpoint requested by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBreakpoint {
    /// Requested line.
    pub line: u32,

    /// Requested column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Break condition expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments of `setBreakpoints`.
///
/// Carries the complete desired breakpoint set for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetBreakpointsArguments {
    /// Source the breakpoints belong to.
    pub source: Source,

    /// Requested breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,

    /// Legacy line list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<u32>>,

    /// Columns parallel to `lines`; synthesized by source map translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<Vec<u32>>,

    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SetBreakpointsArguments {
    /// Returns the requested locations in request order.
    ///
    /// `breakpoints` wins over the legacy `lines`/`cols` pair.
    #[must_use]
    pub fn locations(&self) -> Vec<BreakpointLocation> {
        if let Some(breakpoints) = &self.breakpoints {
            return breakpoints
                .iter()
                .map(|bp| BreakpointLocation {
                    line: bp.line,
                    column: bp.column,
                    condition: bp.condition.clone(),
                })
                .collect();
        }

        let cols = self.cols.as_deref().unwrap_or_default();
        self.lines
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, &line)| BreakpointLocation {
                line,
                column: cols.get(i).copied(),
                condition: None,
            })
            .collect()
    }
}

/// One requested breakpoint position, independent of request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointLocation {
    /// 0-based line.
    pub line: u32,
    /// 0-based column, if known.
    pub column: Option<u32>,
    /// Break condition.
    pub condition: Option<String>,
}

/// A breakpoint as reported back to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Whether the runtime accepted the breakpoint.
    pub verified: bool,

    /// Why the breakpoint is unverified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Source the breakpoint resolved in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Actual line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Actual column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Body of the `setBreakpoints` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetBreakpointsResponseBody {
    /// One entry per requested breakpoint, in request order.
    pub breakpoints: Vec<Breakpoint>,
}

// ============================================================================
// stackTrace
// ============================================================================

/// Arguments of `stackTrace`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// Thread to inspect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,

    /// Index of the first frame to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<usize>,

    /// Maximum number of frames; 0 or absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<usize>,
}

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Frame identifier.
    pub id: i64,

    /// Function name.
    pub name: String,

    /// Frame source; `None` or a source without path when unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Line within the source.
    pub line: u32,

    /// Column within the line.
    pub column: u32,
}

/// Body of the `stackTrace` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    /// Frames, innermost first.
    pub stack_frames: Vec<StackFrame>,

    /// Total frames available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<usize>,
}

// ============================================================================
// initialize
// ============================================================================

/// The subset of `initialize` arguments the bridge honours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    /// Client identifier.
    #[serde(default, rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Lines are 1-based when absent or true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,

    /// Columns are 1-based when absent or true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
}

// ============================================================================
// Script observed
// ============================================================================

/// Notification that the remote runtime loaded a script.
///
/// Translators rewrite `url` in place as the notification travels through
/// them; after the path translator it holds the client path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptObserved {
    /// Runtime script identifier.
    pub script_id: ScriptId,

    /// Script URL as announced by the runtime.
    pub url: String,

    /// Source map URL announced alongside the script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
}

impl ScriptObserved {
    /// Creates a notification without an explicit source map URL.
    #[must_use]
    pub fn new(script_id: impl Into<ScriptId>, url: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            url: url.into(),
            source_map_url: None,
        }
    }

    /// Attaches an explicit source map URL.
    #[must_use]
    pub fn with_source_map_url(mut self, url: impl Into<String>) -> Self {
        self.source_map_url = Some(url.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
