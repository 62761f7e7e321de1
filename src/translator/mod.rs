//! Request/response translators.
//!
//! A translator intercepts requests on their way to the adapter and their
//! response bodies on the way back, rewriting both in place. Translators
//! declare which commands they care about in a [`HookTable`]; the
//! [`TranslatorPipeline`] skips every hook a translator does not declare.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TranslatorPipeline`] | Ordered dispatch around the adapter |
//! | [`LineColumnTranslator`] | Client line/column base conversion |
//! | [`SourceMapResolver`] | Authored ↔ generated positions |
//! | [`PathResolver`] | Client path ↔ target URL |

// ============================================================================
// Submodules
// ============================================================================

/// Client line/column base conversion.
pub mod line_column;

/// Client path ↔ target URL resolution.
pub mod path;

/// Ordered dispatch around the adapter.
pub mod pipeline;

/// Source-map-backed position translation.
pub mod source_map;

// ============================================================================
// Imports
// ============================================================================

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{Request, ScriptObserved};

// ============================================================================
// Re-exports
// ============================================================================

pub use line_column::LineColumnTranslator;
pub use path::PathResolver;
pub use pipeline::{DebugAdapter, TranslatorPipeline};
pub use source_map::SourceMapResolver;

// ============================================================================
// HookContext
// ============================================================================

/// Identity of the request a hook runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// Sequence number of the client request.
    pub seq: i64,
    /// Command name.
    pub command: String,
}

impl HookContext {
    /// Creates a context for `command` issued with `seq`.
    #[inline]
    #[must_use]
    pub fn new(seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            command: command.into(),
        }
    }
}

impl From<&Request> for HookContext {
    fn from(request: &Request) -> Self {
        Self::new(request.seq, request.command.clone())
    }
}

// ============================================================================
// HookTable
// ============================================================================

/// The hooks a translator implements.
///
/// # Example
///
/// ```ignore
/// let hooks = HookTable::new()
///     .request("setBreakpoints")
///     .response("stackTrace")
///     .script_observed();
/// ```
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    requests: FxHashSet<&'static str>,
    responses: FxHashSet<&'static str>,
    script_observed: bool,
}

impl HookTable {
    /// Creates an empty table; every hook passes through.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a request hook for `command`.
    #[must_use]
    pub fn request(mut self, command: &'static str) -> Self {
        self.requests.insert(command);
        self
    }

    /// Declares a `<command>Response` hook.
    #[must_use]
    pub fn response(mut self, command: &'static str) -> Self {
        self.responses.insert(command);
        self
    }

    /// Declares a script-observed hook.
    #[must_use]
    pub fn script_observed(mut self) -> Self {
        self.script_observed = true;
        self
    }

    /// Returns `true` if the translator rewrites `command` requests.
    #[inline]
    #[must_use]
    pub fn handles_request(&self, command: &str) -> bool {
        self.requests.contains(command)
    }

    /// Returns `true` if the translator rewrites `command` responses.
    #[inline]
    #[must_use]
    pub fn handles_response(&self, command: &str) -> bool {
        self.responses.contains(command)
    }

    /// Returns `true` if the translator observes scripts.
    #[inline]
    #[must_use]
    pub fn handles_script_observed(&self) -> bool {
        self.script_observed
    }
}

// ============================================================================
// Translator
// ============================================================================

/// A pluggable request/response interceptor.
///
/// Hooks are only called for entries present in [`Translator::hooks`]; the
/// default bodies pass through.
pub trait Translator: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// The hooks this translator implements.
    fn hooks(&self) -> &HookTable;

    /// Rewrites request arguments in place.
    ///
    /// May suspend; the pipeline does not start the next translator until
    /// the returned future settles.
    fn on_request<'a>(
        &'a self,
        _ctx: &'a HookContext,
        _arguments: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async { Ok(()) }.boxed()
    }

    /// Rewrites a response body in place.
    fn on_response<'a>(
        &'a self,
        _ctx: &'a HookContext,
        _body: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async { Ok(()) }.boxed()
    }

    /// Observes (and may rewrite) a script notification.
    fn on_script_observed<'a>(&'a self, _event: &'a mut ScriptObserved) -> BoxFuture<'a, ()> {
        async {}.boxed()
    }

    /// Called when a request this translator hooked fails later on.
    ///
    /// Drops whatever the request hook kept for the response hook.
    fn request_failed(&self, _ctx: &HookContext) {}

    /// Forgets client-side state (new launch or attach).
    fn client_context_cleared(&self) {}

    /// Forgets target-side state (runtime reload).
    fn target_context_cleared(&self) {}
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_table_lookup() {
        let hooks = HookTable::new()
            .request("setBreakpoints")
            .response("stackTrace");

        assert!(hooks.handles_request("setBreakpoints"));
        assert!(!hooks.handles_response("setBreakpoints"));
        assert!(hooks.handles_response("stackTrace"));
        assert!(!hooks.handles_script_observed());
    }

    #[test]
    fn test_hook_context_from_request() {
        let mut request = Request::new("threads", Value::Null);
        request.seq = 12;

        let ctx = HookContext::from(&request);
        assert_eq!(ctx, HookContext::new(12, "threads"));
    }
}
