//! The debug session.
//!
//! A [`Session`] owns the client channel, the translator pipeline and the
//! breakpoint committer. Client requests flow through the pipeline; script
//! notifications from the remote runtime flow through the committer and the
//! translators before being announced to the client.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::BridgeAdapter;
use crate::breakpoints::{BreakpointCommitter, RemoteDebuggerClient};
use crate::error::Result;
use crate::protocol::{Event, Request, Response, ScriptObserved, Source, command};
use crate::sourcemap::MapContext;
use crate::transport::{Channel, MessageSink};
use crate::translator::{
    HookContext, LineColumnTranslator, PathResolver, SourceMapResolver, TranslatorPipeline,
};

use super::builder::SessionBuilder;
use super::options::BridgeOptions;

// ============================================================================
// RequestRouter
// ============================================================================

/// Channel sink that runs client requests through the pipeline.
struct RequestRouter {
    pipeline: Arc<TranslatorPipeline>,
}

impl MessageSink for RequestRouter {
    fn on_request(&self, mut request: Request) -> BoxFuture<'static, Response> {
        let pipeline = Arc::clone(&self.pipeline);

        async move {
            if matches!(request.command.as_str(), command::LAUNCH | command::ATTACH) {
                pipeline.client_context_cleared();
            }

            let ctx = HookContext::from(&request);
            let arguments = std::mem::take(&mut request.arguments);

            match pipeline.dispatch(&ctx, arguments).await {
                Ok(body) => Response::success(&request, body),
                Err(e) => {
                    warn!(command = %ctx.command, seq = ctx.seq, error = %e, "Request failed");
                    Response::failure(request.seq, &request.command, e.to_string())
                }
            }
        }
        .boxed()
    }

    fn on_event(&self, event: Event) {
        debug!(event = %event.event, "Ignoring client event");
    }
}

// ============================================================================
// Session
// ============================================================================

/// A debug session between one client and one remote runtime.
///
/// # Thread Safety
///
/// `Session` is `Send + Sync` and cheap to clone.
#[derive(Clone)]
pub struct Session {
    channel: Channel,
    pipeline: Arc<TranslatorPipeline>,
    committer: Arc<BreakpointCommitter>,
}

impl Session {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Wires the components and starts the channel.
    pub(crate) fn new<R, W>(
        web_root: String,
        remote: Arc<dyn RemoteDebuggerClient>,
        options: &BridgeOptions,
        reader: R,
        writer: W,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let context = MapContext {
            web_root: web_root.clone(),
            overrides: options.to_path_overrides()?,
        };

        let committer = Arc::new(BreakpointCommitter::with_timeout(
            remote,
            options.commit_timeout,
        ));
        let adapter = Arc::new(BridgeAdapter::new(Arc::clone(&committer)));

        let pipeline = Arc::new(
            TranslatorPipeline::new(adapter)
                .with_translator(Arc::new(LineColumnTranslator::new()))
                .with_translator(Arc::new(SourceMapResolver::new(context, options.source_maps)))
                .with_translator(Arc::new(PathResolver::new(web_root.clone()))),
        );

        let router = Arc::new(RequestRouter {
            pipeline: Arc::clone(&pipeline),
        });
        let channel =
            Channel::new(reader, writer, router).with_request_timeout(options.request_timeout);

        info!(
            web_root = %web_root,
            source_maps = options.source_maps,
            translators = ?pipeline.translator_names(),
            "Session started"
        );

        Ok(Self {
            channel,
            pipeline,
            committer,
        })
    }

    /// Returns the client channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the breakpoint committer.
    #[inline]
    #[must_use]
    pub fn committer(&self) -> &Arc<BreakpointCommitter> {
        &self.committer
    }

    /// Handles a script the remote runtime loaded.
    ///
    /// Registers the script for breakpoint commits, runs the translators'
    /// script hooks (releasing requests waiting for it) and announces the
    /// script to the client as a `loadedSource` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the client is gone.
    pub async fn script_observed(&self, event: ScriptObserved) -> Result<()> {
        debug!(script = %event.script_id, url = %event.url, "Script observed");
        self.committer.script_observed(&event.script_id, &event.url);

        let mut event = event;
        self.pipeline.script_observed(&mut event).await;

        let source = Source::from_path(event.url);
        self.channel
            .send_event("loadedSource", json!({ "reason": "new", "source": source }))
    }

    /// Feeds script notifications from `receiver` into the session, in order.
    ///
    /// The task ends when the sender is dropped or the client disconnects.
    pub fn spawn_script_listener(
        &self,
        mut receiver: mpsc::UnboundedReceiver<ScriptObserved>,
    ) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = session.script_observed(event).await {
                    if e.is_connection_error() {
                        warn!(error = %e, "Script listener stopped");
                        break;
                    }
                    warn!(error = %e, "Script notification failed");
                }
            }
            debug!("Script listener terminated");
        })
    }

    /// Forgets everything known about the runtime after a reload.
    pub fn target_context_cleared(&self) {
        self.committer.target_context_cleared();
        self.pipeline.target_context_cleared();
    }

    /// Shuts down the client channel.
    pub fn shutdown(&self) {
        self.channel.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
