//! Client path ↔ target URL resolution.
//!
//! The client names files by local path, the runtime by URL. Each observed
//! script adds one pair to a bijection; requests for paths the runtime has
//! not loaded yet wait until it does.

// ============================================================================
// Imports
// ============================================================================

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::paths;
use crate::protocol::{
    ScriptObserved, SetBreakpointsArguments, Source, StackTraceResponseBody, command,
};

use super::{HookContext, HookTable, Translator};

// ============================================================================
// Types
// ============================================================================

/// A `setBreakpoints` request waiting for its script.
struct PendingPathRequest {
    request_seq: i64,
    args: SetBreakpointsArguments,
    responder: oneshot::Sender<Result<SetBreakpointsArguments>>,
}

/// Outcome of looking up a request's target URL.
enum Lookup {
    Ready(SetBreakpointsArguments),
    Waiting(oneshot::Receiver<Result<SetBreakpointsArguments>>),
}

/// Both directions of the path bijection plus the waiting requests.
#[derive(Default)]
struct PathState {
    /// Canonical client path → target URL.
    client_to_target: FxHashMap<String, String>,
    /// Target URL → client path.
    target_to_client: FxHashMap<String, String>,
    /// Canonical client path → waiting request.
    pending: FxHashMap<String, PendingPathRequest>,
}

impl PathState {
    /// Inserts a pair, evicting any pair that shares either side.
    fn insert(&mut self, client_path: &str, target_url: &str) {
        let key = paths::canonical_key(client_path);
        if let Some(old_url) = self.client_to_target.remove(&key) {
            self.target_to_client.remove(&old_url);
        }
        if let Some(old_path) = self.target_to_client.remove(target_url) {
            self.client_to_target.remove(&paths::canonical_key(&old_path));
        }
        self.client_to_target.insert(key, target_url.to_string());
        self.target_to_client
            .insert(target_url.to_string(), client_path.to_string());
    }
}

// ============================================================================
// PathResolver
// ============================================================================

/// Translates client paths to target URLs and back.
pub struct PathResolver {
    hooks: HookTable,
    web_root: String,
    state: Mutex<PathState>,
}

impl PathResolver {
    /// Creates a resolver mapping web URLs under `web_root`.
    #[must_use]
    pub fn new(web_root: impl Into<String>) -> Self {
        Self {
            hooks: HookTable::new()
                .request(command::SET_BREAKPOINTS)
                .response(command::STACK_TRACE)
                .script_observed(),
            web_root: web_root.into(),
            state: Mutex::new(PathState::default()),
        }
    }

    /// Returns the target URL known for `client_path`.
    #[must_use]
    pub fn target_url(&self, client_path: &str) -> Option<String> {
        self.state
            .lock()
            .client_to_target
            .get(&paths::canonical_key(client_path))
            .cloned()
    }

    /// Returns the client path known for `target_url`.
    #[must_use]
    pub fn client_path(&self, target_url: &str) -> Option<String> {
        self.state.lock().target_to_client.get(target_url).cloned()
    }

    /// Number of requests waiting for a script.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Computes the local path a target URL stands for.
    ///
    /// `file://` URLs decode, `http(s)` URLs map under the web root and plain
    /// absolute paths are used as they are. Anything else has no client path.
    #[must_use]
    pub fn url_to_client_path(&self, target_url: &str) -> Option<String> {
        if let Some(local) = paths::file_url_to_path(target_url) {
            return Some(local);
        }
        if let Some(local) = paths::web_url_to_path(target_url, &self.web_root) {
            return Some(local);
        }
        (!paths::is_url(target_url) && paths::is_absolute(target_url))
            .then(|| paths::normalize(target_url))
    }

    async fn translate_set_breakpoints(&self, ctx: &HookContext, arguments: &mut Value) -> Result<()> {
        let mut args: SetBreakpointsArguments = serde_json::from_value(arguments.take())?;
        let Some(client_path) = args.source.path.clone() else {
            return Err(Error::invalid_argument("setBreakpoints without source.path"));
        };
        let key = paths::canonical_key(&client_path);

        let lookup = {
            let mut state = self.state.lock();
            if let Some(url) = state.client_to_target.get(&key) {
                args.source.path = Some(url.clone());
                Lookup::Ready(args)
            } else {
                let (responder, waiting) = oneshot::channel();
                let previous = state.pending.insert(
                    key,
                    PendingPathRequest {
                        request_seq: ctx.seq,
                        args,
                        responder,
                    },
                );
                if let Some(previous) = previous {
                    debug!(path = %client_path, superseded = previous.request_seq, "Pending request superseded");
                    let _ = previous.responder.send(Err(Error::superseded(&client_path)));
                }
                Lookup::Waiting(waiting)
            }
        };

        let args = match lookup {
            Lookup::Ready(args) => args,
            Lookup::Waiting(waiting) => {
                debug!(path = %client_path, seq = ctx.seq, "Waiting for script");
                waiting.await??
            }
        };

        *arguments = serde_json::to_value(args)?;
        Ok(())
    }

    fn translate_stack_trace(&self, body: &mut Value) -> Result<()> {
        let mut trace: StackTraceResponseBody = serde_json::from_value(body.take())?;
        {
            let state = self.state.lock();
            for frame in &mut trace.stack_frames {
                let Some(source) = frame.source.as_mut() else {
                    continue;
                };
                let resolved = source
                    .path
                    .as_deref()
                    .and_then(|url| state.target_to_client.get(url));
                match resolved {
                    Some(client_path) => {
                        let extra = std::mem::take(&mut source.extra);
                        *source = Source::from_path(client_path.clone());
                        source.extra = extra;
                    }
                    None => {
                        trace!(frame = frame.id, "Frame source unresolved");
                        source.path = None;
                    }
                }
            }
        }
        *body = serde_json::to_value(trace)?;
        Ok(())
    }

    fn observe_script(&self, event: &mut ScriptObserved) {
        let Some(client_path) = self.url_to_client_path(&event.url) else {
            trace!(url = %event.url, "Script has no client path");
            return;
        };

        let mut state = self.state.lock();
        state.insert(&client_path, &event.url);

        if let Some(mut pending) = state.pending.remove(&paths::canonical_key(&client_path)) {
            debug!(path = %client_path, seq = pending.request_seq, "Releasing pending request");
            pending.args.source.path = Some(event.url.clone());
            let _ = pending.responder.send(Ok(pending.args));
        }

        event.url = client_path;
    }
}

impl Translator for PathResolver {
    fn name(&self) -> &'static str {
        "path"
    }

    fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    fn on_request<'a>(
        &'a self,
        ctx: &'a HookContext,
        arguments: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        self.translate_set_breakpoints(ctx, arguments).boxed()
    }

    fn on_response<'a>(
        &'a self,
        _ctx: &'a HookContext,
        body: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async move { self.translate_stack_trace(body) }.boxed()
    }

    fn on_script_observed<'a>(&'a self, event: &'a mut ScriptObserved) -> BoxFuture<'a, ()> {
        async move { self.observe_script(event) }.boxed()
    }

    fn client_context_cleared(&self) {
        self.state.lock().pending.clear();
    }

    fn target_context_cleared(&self) {
        let mut state = self.state.lock();
        state.client_to_target.clear();
        state.target_to_client.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    fn resolver() -> Arc<PathResolver> {
        Arc::new(PathResolver::new("/proj/www"))
    }

    fn set_breakpoints(path: &str) -> Value {
        json!({"source": {"path": path}, "breakpoints": [{"line": 3}]})
    }

    #[test]
    fn test_url_to_client_path() {
        let resolver = resolver();
        assert_eq!(
            resolver.url_to_client_path("file:///proj/out/app.js").as_deref(),
            Some("/proj/out/app.js")
        );
        assert_eq!(
            resolver.url_to_client_path("http://localhost:8080/js/app.js").as_deref(),
            Some("/proj/www/js/app.js")
        );
        assert_eq!(
            resolver.url_to_client_path("/srv/app.js").as_deref(),
            Some("/srv/app.js")
        );
        assert_eq!(resolver.url_to_client_path("node:internal/main"), None);
    }

    #[tokio::test]
    async fn test_known_path_rewrites_immediately() {
        let resolver = resolver();
        let mut event = ScriptObserved::new("1", "http://localhost/js/app.js");
        resolver.on_script_observed(&mut event).await;
        assert_eq!(event.url, "/proj/www/js/app.js");

        let mut args = set_breakpoints("/proj/www/js/app.js");
        resolver
            .on_request(&HookContext::new(1, "setBreakpoints"), &mut args)
            .await
            .expect("translate");

        assert_eq!(args["source"]["path"], "http://localhost/js/app.js");
        assert_eq!(args["breakpoints"][0]["line"], 3);
    }

    #[tokio::test]
    async fn test_unknown_path_waits_for_script() {
        let resolver = resolver();

        let task = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                let mut args = set_breakpoints("/proj/www/app.js");
                resolver
                    .on_request(&HookContext::new(4, "setBreakpoints"), &mut args)
                    .await
                    .map(|()| args)
            }
        });

        while resolver.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        let mut event = ScriptObserved::new("9", "http://localhost/app.js");
        resolver.on_script_observed(&mut event).await;

        let args = task.await.expect("join").expect("translate");
        assert_eq!(args["source"]["path"], "http://localhost/app.js");
        assert_eq!(resolver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_pending() {
        let resolver = resolver();

        let first = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                let mut args = set_breakpoints("/proj/www/app.js");
                resolver
                    .on_request(&HookContext::new(1, "setBreakpoints"), &mut args)
                    .await
            }
        });
        while resolver.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        let second = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move {
                let mut args = set_breakpoints("/proj/www/app.js");
                resolver
                    .on_request(&HookContext::new(2, "setBreakpoints"), &mut args)
                    .await
            }
        });

        let err = first.await.expect("join").expect_err("superseded");
        assert!(matches!(err, Error::Superseded { .. }));

        let mut event = ScriptObserved::new("1", "http://localhost/app.js");
        resolver.on_script_observed(&mut event).await;
        second.await.expect("join").expect("translate");
    }

    #[tokio::test]
    async fn test_bijection_replaces_stale_pairs() {
        let resolver = resolver();

        let mut first = ScriptObserved::new("1", "file:///proj/www/a.js");
        resolver.on_script_observed(&mut first).await;
        let mut second = ScriptObserved::new("2", "http://localhost/a.js");
        resolver.on_script_observed(&mut second).await;

        assert_eq!(
            resolver.target_url("/proj/www/a.js").as_deref(),
            Some("http://localhost/a.js")
        );
        assert_eq!(resolver.client_path("file:///proj/www/a.js"), None);
    }

    #[tokio::test]
    async fn test_stack_trace_clears_unresolved_paths() {
        let resolver = resolver();
        let mut event = ScriptObserved::new("1", "http://localhost/app.js");
        resolver.on_script_observed(&mut event).await;

        let mut body = json!({
            "stackFrames": [
                {"id": 0, "name": "main", "line": 4, "column": 0,
                 "source": {"path": "http://localhost/app.js"}},
                {"id": 1, "name": "vendor", "line": 9, "column": 2,
                 "source": {"path": "http://cdn/vendor.js"}},
                {"id": 2, "name": "native", "line": 0, "column": 0}
            ],
            "totalFrames": 3
        });
        resolver
            .on_response(&HookContext::new(1, "stackTrace"), &mut body)
            .await
            .expect("translate");

        let frames = &body["stackFrames"];
        assert_eq!(frames[0]["source"]["path"], "/proj/www/app.js");
        assert_eq!(frames[0]["source"]["name"], "app.js");
        assert!(frames[1]["source"].get("path").is_none());
        assert_eq!(frames[1]["name"], "vendor");
        assert_eq!(frames[1]["line"], 9);
        assert!(frames[2].get("source").is_none());
    }

    #[tokio::test]
    async fn test_context_clears() {
        let resolver = resolver();
        let mut event = ScriptObserved::new("1", "http://localhost/app.js");
        resolver.on_script_observed(&mut event).await;

        resolver.client_context_cleared();
        assert!(resolver.target_url("/proj/www/app.js").is_some());

        resolver.target_context_cleared();
        assert!(resolver.target_url("/proj/www/app.js").is_none());
    }
}
