//! Adapter operations behind the translators.
//!
//! By the time a request reaches [`BridgeAdapter`] its coordinates are
//! 0-based and its paths are target URLs of generated scripts, so the
//! adapter talks to the runtime directly.
//!
//! | Command | Operation |
//! |---------|-----------|
//! | `initialize` | Report capabilities |
//! | `launch`, `attach` | Acknowledge; the runtime is started elsewhere |
//! | `configurationDone`, `disconnect` | Acknowledge |
//! | `setBreakpoints` | Whole-set commit through [`BreakpointCommitter`] |
//! | `stackTrace` | Paged runtime stack |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use tracing::debug;

use crate::breakpoints::{BreakpointCommitter, RemoteDebuggerClient};
use crate::error::{Error, Result};
use crate::protocol::{
    SetBreakpointsArguments, SetBreakpointsResponseBody, Source, StackFrame, StackTraceArguments,
    StackTraceResponseBody, command,
};
use crate::translator::{DebugAdapter, HookContext};

// ============================================================================
// BridgeAdapter
// ============================================================================

/// Adapter operations backed by a remote runtime.
pub struct BridgeAdapter {
    committer: Arc<BreakpointCommitter>,
}

impl BridgeAdapter {
    /// Creates an adapter committing breakpoints through `committer`.
    #[must_use]
    pub fn new(committer: Arc<BreakpointCommitter>) -> Self {
        Self { committer }
    }

    fn remote(&self) -> &Arc<dyn RemoteDebuggerClient> {
        self.committer.remote()
    }

    fn initialize(&self) -> Value {
        json!({
            "supportsConfigurationDoneRequest": true,
            "supportsConditionalBreakpoints": true,
            "supportsDelayedStackTraceLoading": true,
        })
    }

    async fn set_breakpoints(&self, arguments: Value) -> Result<Value> {
        let args: SetBreakpointsArguments = serde_json::from_value(arguments)?;
        let url = args
            .source
            .path
            .as_deref()
            .ok_or_else(|| Error::invalid_argument("setBreakpoints without source.path"))?;

        let breakpoints = self
            .committer
            .set_breakpoints(url, &args.locations())
            .await?;

        Ok(serde_json::to_value(SetBreakpointsResponseBody { breakpoints })?)
    }

    async fn stack_trace(&self, arguments: Value) -> Result<Value> {
        let args: StackTraceArguments = if arguments.is_null() {
            StackTraceArguments::default()
        } else {
            serde_json::from_value(arguments)?
        };

        let frames = self.remote().stack_trace().await?;
        let total = frames.len();
        let start = args.start_frame.unwrap_or(0).min(total);
        let levels = match args.levels {
            Some(levels) if levels > 0 => levels,
            _ => total,
        };

        let stack_frames = frames
            .into_iter()
            .enumerate()
            .skip(start)
            .take(levels)
            .map(|(index, frame)| StackFrame {
                id: index as i64,
                name: if frame.function_name.is_empty() {
                    String::from("(anonymous function)")
                } else {
                    frame.function_name
                },
                source: self
                    .committer
                    .url_for_script(&frame.script_id)
                    .map(Source::from_path),
                line: frame.line,
                column: frame.column,
            })
            .collect();

        Ok(serde_json::to_value(StackTraceResponseBody {
            stack_frames,
            total_frames: Some(total),
        })?)
    }
}

impl DebugAdapter for BridgeAdapter {
    fn supports(&self, name: &str) -> bool {
        matches!(
            name,
            command::INITIALIZE
                | command::LAUNCH
                | command::ATTACH
                | command::CONFIGURATION_DONE
                | command::DISCONNECT
                | command::SET_BREAKPOINTS
                | command::STACK_TRACE
        )
    }

    fn handle<'a>(&'a self, ctx: &'a HookContext, arguments: Value) -> BoxFuture<'a, Result<Value>> {
        async move {
            debug!(command = %ctx.command, seq = ctx.seq, "Adapter operation");
            match ctx.command.as_str() {
                command::INITIALIZE => Ok(self.initialize()),
                command::LAUNCH
                | command::ATTACH
                | command::CONFIGURATION_DONE
                | command::DISCONNECT => Ok(Value::Null),
                command::SET_BREAKPOINTS => self.set_breakpoints(arguments).await,
                command::STACK_TRACE => self.stack_trace(arguments).await,
                other => Err(Error::unknown_command(other)),
            }
        }
        .boxed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::breakpoints::RemoteFrame;
    use crate::breakpoints::testing::FakeRemote;
    use crate::identifiers::ScriptId;

    fn frame(script: &str, line: u32, name: &str) -> RemoteFrame {
        RemoteFrame {
            script_id: ScriptId::new(script),
            line,
            column: 0,
            function_name: name.to_string(),
        }
    }

    fn adapter() -> (BridgeAdapter, Arc<FakeRemote>) {
        let remote = FakeRemote::new();
        *remote.frames.lock() = vec![
            frame("1", 10, "inner"),
            frame("1", 20, ""),
            frame("2", 30, "outer"),
        ];
        let committer = Arc::new(BreakpointCommitter::new(remote.clone()));
        committer.script_observed(&ScriptId::new("1"), "http://host/app.js");
        (BridgeAdapter::new(committer), remote)
    }

    async fn run(adapter: &BridgeAdapter, command: &str, arguments: Value) -> Result<Value> {
        adapter.handle(&HookContext::new(1, command), arguments).await
    }

    #[tokio::test]
    async fn test_stack_trace_paging() {
        let (adapter, _remote) = adapter();

        let body = run(&adapter, command::STACK_TRACE, json!({"startFrame": 1, "levels": 1}))
            .await
            .expect("stackTrace");

        assert_eq!(body["totalFrames"], 3);
        let frames = body["stackFrames"].as_array().expect("frames");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["id"], 1);
        assert_eq!(frames[0]["name"], "(anonymous function)");
        assert_eq!(frames[0]["source"]["path"], "http://host/app.js");
    }

    #[tokio::test]
    async fn test_stack_trace_unknown_script_has_no_source() {
        let (adapter, _remote) = adapter();

        let body = run(&adapter, command::STACK_TRACE, Value::Null)
            .await
            .expect("stackTrace");

        let frames = body["stackFrames"].as_array().expect("frames");
        assert_eq!(frames.len(), 3);
        assert!(frames[2].get("source").is_none());
    }

    #[tokio::test]
    async fn test_set_breakpoints_commits() {
        let (adapter, remote) = adapter();

        let body = run(
            &adapter,
            command::SET_BREAKPOINTS,
            json!({"source": {"path": "http://host/app.js"}, "breakpoints": [{"line": 4}]}),
        )
        .await
        .expect("setBreakpoints");

        assert_eq!(body["breakpoints"][0]["verified"], true);
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (adapter, _remote) = adapter();
        assert!(!adapter.supports("evaluate"));
        assert!(matches!(
            run(&adapter, "evaluate", Value::Null).await,
            Err(Error::UnknownCommand { .. })
        ));
    }
}
