//! Source-map-backed position translation.
//!
//! Breakpoints requested in authored files are moved onto the generated
//! file the runtime executes, and positions reported by the runtime are
//! moved back. Maps are discovered when the runtime announces a script;
//! requests for authored files whose map is not known yet wait for it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::paths;
use crate::protocol::{
    BreakpointLocation, ScriptObserved, SetBreakpointsArguments, SetBreakpointsResponseBody,
    Source, StackTraceResponseBody, command,
};
use crate::sourcemap::{MapContext, SourceMap, load_source_map};

use super::{HookContext, HookTable, Translator};

// ============================================================================
// Types
// ============================================================================

/// A `setBreakpoints` request waiting for its map or script.
struct PendingMapRequest {
    request_seq: i64,
    args: SetBreakpointsArguments,
    responder: oneshot::Sender<SetBreakpointsArguments>,
}

/// Authored locations of a request that was moved to a generated file.
struct RecordedRequest {
    authored_path: String,
    locations: Vec<BreakpointLocation>,
}

/// Result of trying to translate a request with what is known so far.
enum Resolution {
    /// Forward these arguments.
    Ready(SetBreakpointsArguments),
    /// Nothing is known about the file yet.
    Unknown(SetBreakpointsArguments),
}

/// Outcome of the request hook's critical section.
enum Lookup {
    Ready(SetBreakpointsArguments),
    Waiting(oneshot::Receiver<SetBreakpointsArguments>),
}

// ============================================================================
// MapState
// ============================================================================

#[derive(Default)]
struct MapState {
    /// Canonical generated path → map.
    maps: FxHashMap<String, Arc<SourceMap>>,
    /// Canonical authored path → canonical generated path.
    authored_index: FxHashMap<String, String>,
    /// Canonical paths of loaded scripts that have no map.
    unmapped_scripts: FxHashSet<String>,
    /// Canonical path → waiting requests, in request order.
    pending: FxHashMap<String, Vec<PendingMapRequest>>,
    /// Request seq → authored locations, consumed by the response.
    recorded: FxHashMap<i64, RecordedRequest>,
}

impl MapState {
    fn map_for_authored(&self, key: &str) -> Option<Arc<SourceMap>> {
        let generated = self.authored_index.get(key)?;
        self.maps.get(generated).cloned()
    }

    fn resolve(&mut self, request_seq: i64, args: SetBreakpointsArguments) -> Resolution {
        let Some(path) = args.source.path.clone() else {
            return Resolution::Ready(args);
        };
        let key = paths::canonical_key(&path);

        if let Some(map) = self.map_for_authored(&key) {
            let locations = args.locations();
            let args = remap_to_generated(args, &map, &path, &locations);
            self.recorded.insert(
                request_seq,
                RecordedRequest {
                    authored_path: path,
                    locations,
                },
            );
            return Resolution::Ready(args);
        }

        if self.unmapped_scripts.contains(&key) || self.maps.contains_key(&key) {
            return Resolution::Ready(args);
        }

        Resolution::Unknown(args)
    }

    /// Records a script's map (or lack of one) and releases the requests
    /// waiting on its authored sources, then on the script itself.
    ///
    /// Returns the seqs of the released requests, in release order.
    fn attach(&mut self, generated: &str, map: Option<SourceMap>) -> Vec<i64> {
        let generated_key = paths::canonical_key(generated);
        let mut released = Vec::new();

        match map {
            Some(map) => {
                for source in map.sources() {
                    let key = paths::canonical_key(source);
                    self.authored_index.insert(key.clone(), generated_key.clone());
                    released.push(key);
                }
                self.unmapped_scripts.remove(&generated_key);
                self.maps.insert(generated_key.clone(), Arc::new(map));
            }
            None => {
                self.maps.remove(&generated_key);
                self.unmapped_scripts.insert(generated_key.clone());
            }
        }
        released.push(generated_key);

        let mut order = Vec::new();
        for key in released {
            let Some(mut waiting) = self.pending.remove(&key) else {
                continue;
            };
            waiting.sort_by_key(|pending| pending.request_seq);

            for pending in waiting {
                debug!(path = %key, seq = pending.request_seq, "Releasing pending request");
                let args = match self.resolve(pending.request_seq, pending.args) {
                    Resolution::Ready(args) | Resolution::Unknown(args) => args,
                };
                order.push(pending.request_seq);
                let _ = pending.responder.send(args);
            }
        }
        order
    }
}

// ============================================================================
// SourceMapResolver
// ============================================================================

/// Translates between authored and generated coordinates.
pub struct SourceMapResolver {
    hooks: HookTable,
    enabled: bool,
    context: MapContext,
    state: Mutex<MapState>,
}

impl SourceMapResolver {
    /// Creates a resolver.
    ///
    /// With `enabled` false every request passes through and response
    /// columns are stripped.
    #[must_use]
    pub fn new(context: MapContext, enabled: bool) -> Self {
        Self {
            hooks: HookTable::new()
                .request(command::SET_BREAKPOINTS)
                .response(command::SET_BREAKPOINTS)
                .response(command::STACK_TRACE)
                .script_observed(),
            enabled,
            context,
            state: Mutex::new(MapState::default()),
        }
    }

    /// Returns `true` if source maps are used.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the cached map of a generated file.
    #[must_use]
    pub fn map_for_generated(&self, generated_path: &str) -> Option<Arc<SourceMap>> {
        self.state
            .lock()
            .maps
            .get(&paths::canonical_key(generated_path))
            .cloned()
    }

    /// Number of requests waiting for a map.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.values().map(Vec::len).sum()
    }

    async fn translate_set_breakpoints(&self, ctx: &HookContext, arguments: &mut Value) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let args: SetBreakpointsArguments = serde_json::from_value(arguments.take())?;
        let Some(path) = args.source.path.clone() else {
            return Err(Error::invalid_argument("setBreakpoints without source.path"));
        };

        let lookup = {
            let mut state = self.state.lock();
            match state.resolve(ctx.seq, args) {
                Resolution::Ready(args) => Lookup::Ready(args),
                Resolution::Unknown(args) => {
                    let (responder, waiting) = oneshot::channel();
                    state
                        .pending
                        .entry(paths::canonical_key(&path))
                        .or_default()
                        .push(PendingMapRequest {
                            request_seq: ctx.seq,
                            args,
                            responder,
                        });
                    Lookup::Waiting(waiting)
                }
            }
        };

        let args = match lookup {
            Lookup::Ready(args) => args,
            Lookup::Waiting(waiting) => {
                debug!(path = %path, seq = ctx.seq, "Waiting for source map");
                waiting.await?
            }
        };

        *arguments = serde_json::to_value(args)?;
        Ok(())
    }

    fn translate_breakpoints_response(&self, ctx: &HookContext, body: &mut Value) -> Result<()> {
        let mut response: SetBreakpointsResponseBody = serde_json::from_value(body.take())?;

        let (record, map) = {
            let mut state = self.state.lock();
            let record = state.recorded.remove(&ctx.seq);
            let map = record
                .as_ref()
                .and_then(|r| state.map_for_authored(&paths::canonical_key(&r.authored_path)));
            (record, map)
        };

        match record {
            Some(record) => {
                let authored_key = paths::canonical_key(&record.authored_path);
                for (i, breakpoint) in response.breakpoints.iter_mut().enumerate() {
                    let mapped = breakpoint.line.zip(map.as_ref()).and_then(|(line, map)| {
                        map.authored_position_for(line, breakpoint.column.unwrap_or(0))
                            .filter(|r| paths::canonical_key(&r.path) == authored_key)
                    });

                    match (mapped, record.locations.get(i)) {
                        (Some(position), _) => {
                            breakpoint.line = Some(position.line);
                            breakpoint.column = Some(position.column);
                        }
                        (None, Some(requested)) => {
                            trace!(seq = ctx.seq, index = i, "Falling back to requested position");
                            breakpoint.line = Some(requested.line);
                            breakpoint.column = requested.column;
                        }
                        (None, None) => breakpoint.column = None,
                    }
                }
            }
            None => {
                for breakpoint in &mut response.breakpoints {
                    breakpoint.column = None;
                }
            }
        }

        *body = serde_json::to_value(response)?;
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
                let Some(map) = source
                    .path
                    .as_deref()
                    .and_then(|path| state.maps.get(&paths::canonical_key(path)))
                else {
                    continue;
                };
                let Some(position) = map.authored_position_for(frame.line, frame.column) else {
                    continue;
                };

                let extra = std::mem::take(&mut source.extra);
                *source = Source::from_path(position.path);
                source.extra = extra;
                frame.line = position.line;
                frame.column = position.column;
            }
        }
        *body = serde_json::to_value(trace)?;
        Ok(())
    }

    async fn observe_script(&self, event: &ScriptObserved) {
        if !self.enabled {
            return;
        }

        let map = load_source_map(&event.url, event.source_map_url.as_deref(), &self.context).await;
        match &map {
            Some(map) => debug!(script = %event.script_id, path = %event.url, sources = map.sources().len(), "Source map attached"),
            None => trace!(script = %event.script_id, path = %event.url, "Script has no source map"),
        }

        let released = self.state.lock().attach(&event.url, map);
        if !released.is_empty() {
            debug!(path = %event.url, released = released.len(), "Released pending requests");
        }
    }
}

impl Translator for SourceMapResolver {
    fn name(&self) -> &'static str {
        "source-map"
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
        ctx: &'a HookContext,
        body: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            match ctx.command.as_str() {
                command::SET_BREAKPOINTS => self.translate_breakpoints_response(ctx, body),
                command::STACK_TRACE => self.translate_stack_trace(body),
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn on_script_observed<'a>(&'a self, event: &'a mut ScriptObserved) -> BoxFuture<'a, ()> {
        self.observe_script(event).boxed()
    }

    fn request_failed(&self, ctx: &HookContext) {
        if self.state.lock().recorded.remove(&ctx.seq).is_some() {
            trace!(seq = ctx.seq, "Dropped record of failed request");
        }
    }

    fn client_context_cleared(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.recorded.clear();
    }

    fn target_context_cleared(&self) {
        let mut state = self.state.lock();
        state.maps.clear();
        state.authored_index.clear();
        state.unmapped_scripts.clear();
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Moves every requested location onto the generated file.
///
/// Lines without a mapping keep their authored coordinates.
fn remap_to_generated(
    mut args: SetBreakpointsArguments,
    map: &SourceMap,
    authored_path: &str,
    locations: &[BreakpointLocation],
) -> SetBreakpointsArguments {
    let generated: Vec<(u32, u32)> = locations
        .iter()
        .map(|location| {
            let column = location.column.unwrap_or(0);
            map.generated_position_for(authored_path, location.line, column)
                .map_or((location.line, column), |r| (r.line, r.column))
        })
        .collect();

    if let Some(breakpoints) = args.breakpoints.as_mut() {
        for (breakpoint, &(line, column)) in breakpoints.iter_mut().zip(&generated) {
            breakpoint.line = line;
            breakpoint.column = Some(column);
        }
    } else {
        args.lines = Some(generated.iter().map(|&(line, _)| line).collect());
        args.cols = Some(generated.iter().map(|&(_, column)| column).collect());
    }

    args.source.path = Some(map.generated_path().to_string());
    args.source.name = Some(paths::basename(map.generated_path()).to_string());
    args
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::sourcemap::PathOverrides;
    use crate::sourcemap::testing::offset_map;
    use crate::translator::{DebugAdapter, TranslatorPipeline};

    struct Fixture {
        _root: TempDir,
        resolver: Arc<SourceMapResolver>,
        generated: String,
        authored: String,
    }

    /// `src/app.ts` compiled to `out/app.js`, authored line N at generated
    /// line N + 5.
    fn fixture(enabled: bool) -> Fixture {
        let root = TempDir::new().expect("tempdir");
        let base = root.path().to_string_lossy().into_owned();
        fs::create_dir_all(root.path().join("out")).expect("mkdir");
        fs::create_dir_all(root.path().join("src")).expect("mkdir");
        fs::write(root.path().join("out/app.js"), "var a;\n").expect("write");
        fs::write(
            root.path().join("out/app.js.map"),
            offset_map(30, "../src/app.ts", 5),
        )
        .expect("write");

        let context = MapContext {
            web_root: base.clone(),
            overrides: PathOverrides::defaults(),
        };
        Fixture {
            resolver: Arc::new(SourceMapResolver::new(context, enabled)),
            generated: format!("{base}/out/app.js"),
            authored: format!("{base}/src/app.ts"),
            _root: root,
        }
    }

    async fn observe(fixture: &Fixture) {
        let mut event = ScriptObserved::new("7", fixture.generated.clone());
        fixture.resolver.on_script_observed(&mut event).await;
    }

    async fn request(resolver: &SourceMapResolver, seq: i64, mut args: Value) -> Value {
        resolver
            .on_request(&HookContext::new(seq, command::SET_BREAKPOINTS), &mut args)
            .await
            .expect("request");
        args
    }

    async fn respond(resolver: &SourceMapResolver, seq: i64, mut body: Value) -> Value {
        resolver
            .on_response(&HookContext::new(seq, command::SET_BREAKPOINTS), &mut body)
            .await
            .expect("response");
        body
    }

    #[tokio::test]
    async fn test_breakpoints_move_to_generated_and_back() {
        let fixture = fixture(true);
        observe(&fixture).await;
        assert!(fixture.resolver.map_for_generated(&fixture.generated).is_some());

        let args = request(
            &fixture.resolver,
            3,
            json!({"source": {"path": fixture.authored}, "breakpoints": [{"line": 8}]}),
        )
        .await;
        assert_eq!(args["source"]["path"], fixture.generated.as_str());
        assert_eq!(args["breakpoints"][0]["line"], 13);
        assert_eq!(args["breakpoints"][0]["column"], 0);

        let body = respond(
            &fixture.resolver,
            3,
            json!({"breakpoints": [{"verified": true, "line": 13, "column": 2}]}),
        )
        .await;
        assert_eq!(body["breakpoints"][0]["line"], 8);
        assert_eq!(body["breakpoints"][0]["column"], 0);
    }

    #[tokio::test]
    async fn test_legacy_lines_get_columns() {
        let fixture = fixture(true);
        observe(&fixture).await;

        let args = request(
            &fixture.resolver,
            3,
            json!({"source": {"path": fixture.authored}, "lines": [0, 2]}),
        )
        .await;
        assert_eq!(args["lines"], json!([5, 7]));
        assert_eq!(args["cols"], json!([0, 0]));
    }

    #[tokio::test]
    async fn test_request_waits_for_script() {
        let fixture = fixture(true);

        let task = tokio::spawn({
            let resolver = Arc::clone(&fixture.resolver);
            let authored = fixture.authored.clone();
            async move {
                request(
                    &resolver,
                    5,
                    json!({"source": {"path": authored}, "breakpoints": [{"line": 1}]}),
                )
                .await
            }
        });

        while fixture.resolver.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        observe(&fixture).await;

        let args = task.await.expect("join");
        assert_eq!(args["source"]["path"], fixture.generated.as_str());
        assert_eq!(args["breakpoints"][0]["line"], 6);
        assert_eq!(fixture.resolver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_script_passes_through() {
        let fixture = fixture(true);
        let plain = fixture.generated.replace("app.js", "plain.js");
        let mut event = ScriptObserved::new("8", plain.clone());
        fixture.resolver.on_script_observed(&mut event).await;

        let args = request(
            &fixture.resolver,
            1,
            json!({"source": {"path": plain}, "breakpoints": [{"line": 4}]}),
        )
        .await;
        assert_eq!(args["breakpoints"][0]["line"], 4);
        assert!(args["breakpoints"][0].get("column").is_none());

        let body = respond(
            &fixture.resolver,
            1,
            json!({"breakpoints": [{"verified": true, "line": 4, "column": 9}]}),
        )
        .await;
        assert!(body["breakpoints"][0].get("column").is_none());
    }

    #[tokio::test]
    async fn test_unmappable_response_falls_back_to_request() {
        let fixture = fixture(true);
        observe(&fixture).await;

        request(
            &fixture.resolver,
            2,
            json!({"source": {"path": fixture.authored}, "breakpoints": [{"line": 3, "column": 4}]}),
        )
        .await;
        let body = respond(
            &fixture.resolver,
            2,
            json!({"breakpoints": [{"verified": true, "line": 400, "column": 0}]}),
        )
        .await;
        assert_eq!(body["breakpoints"][0]["line"], 3);
        assert_eq!(body["breakpoints"][0]["column"], 4);
    }

    #[tokio::test]
    async fn test_stack_frames_map_to_authored() {
        let fixture = fixture(true);
        observe(&fixture).await;

        let mut body = json!({
            "stackFrames": [
                {"id": 0, "name": "main", "line": 13, "column": 0,
                 "source": {"path": fixture.generated}},
                {"id": 1, "name": "lib", "line": 2, "column": 0,
                 "source": {"path": "/lib/vendor.js"}}
            ]
        });
        fixture
            .resolver
            .on_response(&HookContext::new(9, command::STACK_TRACE), &mut body)
            .await
            .expect("response");

        let frames = &body["stackFrames"];
        assert_eq!(frames[0]["source"]["path"], fixture.authored.as_str());
        assert_eq!(frames[0]["source"]["name"], "app.ts");
        assert_eq!(frames[0]["line"], 8);
        assert_eq!(frames[1]["source"]["path"], "/lib/vendor.js");
        assert_eq!(frames[1]["line"], 2);
    }

    #[tokio::test]
    async fn test_disabled_passes_everything_through() {
        let fixture = fixture(false);
        observe(&fixture).await;
        assert!(fixture.resolver.map_for_generated(&fixture.generated).is_none());

        let args = request(
            &fixture.resolver,
            1,
            json!({"source": {"path": fixture.authored}, "breakpoints": [{"line": 8}]}),
        )
        .await;
        assert_eq!(args["source"]["path"], fixture.authored.as_str());

        let body = respond(
            &fixture.resolver,
            1,
            json!({"breakpoints": [{"verified": true, "line": 8, "column": 3}]}),
        )
        .await;
        assert!(body["breakpoints"][0].get("column").is_none());
    }

    #[tokio::test]
    async fn test_release_follows_file_then_request_order() {
        let fixture = fixture(true);

        let spawn_request = |seq: i64, path: String| {
            let resolver = Arc::clone(&fixture.resolver);
            tokio::spawn(async move {
                request(
                    &resolver,
                    seq,
                    json!({"source": {"path": path}, "breakpoints": [{"line": 1}]}),
                )
                .await
            })
        };

        let late = spawn_request(9, fixture.authored.clone());
        while fixture.resolver.pending_count() < 1 {
            tokio::task::yield_now().await;
        }
        let early = spawn_request(4, fixture.authored.clone());
        while fixture.resolver.pending_count() < 2 {
            tokio::task::yield_now().await;
        }
        let generated = spawn_request(2, fixture.generated.clone());
        while fixture.resolver.pending_count() < 3 {
            tokio::task::yield_now().await;
        }

        let map = load_source_map(&fixture.generated, None, &fixture.resolver.context).await;
        assert!(map.is_some());
        let released = fixture.resolver.state.lock().attach(&fixture.generated, map);
        assert_eq!(released, [4, 9, 2]);

        for task in [late, early, generated] {
            let args = task.await.expect("join");
            assert_eq!(args["source"]["path"], fixture.generated.as_str());
        }
    }

    #[tokio::test]
    async fn test_client_context_cleared_drops_pending_and_records() {
        let fixture = fixture(true);
        let plain = fixture.generated.replace("app.js", "lib.js");

        let waiting = tokio::spawn({
            let resolver = Arc::clone(&fixture.resolver);
            async move {
                let mut args = json!({"source": {"path": plain}, "breakpoints": [{"line": 1}]});
                resolver
                    .on_request(&HookContext::new(1, command::SET_BREAKPOINTS), &mut args)
                    .await
            }
        });
        while fixture.resolver.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        observe(&fixture).await;
        request(
            &fixture.resolver,
            2,
            json!({"source": {"path": fixture.authored}, "breakpoints": [{"line": 3}]}),
        )
        .await;
        assert_eq!(fixture.resolver.state.lock().recorded.len(), 1);

        fixture.resolver.client_context_cleared();

        assert_eq!(fixture.resolver.pending_count(), 0);
        assert!(fixture.resolver.state.lock().recorded.is_empty());
        assert!(waiting.await.expect("join").is_err());
    }

    struct FailingAdapter;

    impl DebugAdapter for FailingAdapter {
        fn supports(&self, name: &str) -> bool {
            name == command::SET_BREAKPOINTS
        }

        fn handle<'a>(
            &'a self,
            _ctx: &'a HookContext,
            _arguments: Value,
        ) -> BoxFuture<'a, Result<Value>> {
            async { Err(Error::remote("runtime went away")) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_failed_requests_leave_no_records() {
        let fixture = fixture(true);
        observe(&fixture).await;
        let pipeline = TranslatorPipeline::new(Arc::new(FailingAdapter))
            .with_translator(fixture.resolver.clone());

        for seq in 0..100 {
            let result = pipeline
                .dispatch(
                    &HookContext::new(seq, command::SET_BREAKPOINTS),
                    json!({"source": {"path": fixture.authored}, "breakpoints": [{"line": 3}]}),
                )
                .await;
            assert!(result.is_err());
        }

        assert!(fixture.resolver.state.lock().recorded.is_empty());
    }

    #[tokio::test]
    async fn test_target_context_cleared_forgets_maps() {
        let fixture = fixture(true);
        observe(&fixture).await;

        fixture.resolver.target_context_cleared();
        assert!(fixture.resolver.map_for_generated(&fixture.generated).is_none());
    }
}
