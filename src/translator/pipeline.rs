//! Ordered translator dispatch.
//!
//! Request hooks run in registration order, response hooks in reverse, so
//! the first registered translator sees the request first and the response
//! last:
//!
//! ```text
//! request ──▶ T1 ──▶ T2 ──▶ T3 ──▶ adapter
//!                                     │
//! response ◀── T1 ◀── T2 ◀── T3 ◀─────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::ScriptObserved;

use super::{HookContext, Translator};

// ============================================================================
// DebugAdapter
// ============================================================================

/// The operations translated requests finally reach.
pub trait DebugAdapter: Send + Sync + 'static {
    /// Returns `true` if `command` has an operation.
    fn supports(&self, command: &str) -> bool;

    /// Runs the operation for `ctx.command` with translated arguments.
    fn handle<'a>(&'a self, ctx: &'a HookContext, arguments: Value)
    -> BoxFuture<'a, Result<Value>>;
}

// ============================================================================
// TranslatorPipeline
// ============================================================================

/// Translators wrapped around an adapter.
pub struct TranslatorPipeline {
    translators: Vec<Arc<dyn Translator>>,
    adapter: Arc<dyn DebugAdapter>,
}

impl TranslatorPipeline {
    /// Creates a pipeline with no translators.
    #[must_use]
    pub fn new(adapter: Arc<dyn DebugAdapter>) -> Self {
        Self {
            translators: Vec::new(),
            adapter,
        }
    }

    /// Appends a translator; later translators sit closer to the adapter.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translators.push(translator);
        self
    }

    /// Names of the registered translators, in registration order.
    #[must_use]
    pub fn translator_names(&self) -> Vec<&'static str> {
        self.translators.iter().map(|t| t.name()).collect()
    }

    /// Dispatches one request and returns its translated response body.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownCommand`] if the adapter has no operation; no hook runs
    /// - Any error raised by a hook or the adapter, which aborts the pipeline
    ///
    /// On failure every translator with a request hook for the command is
    /// told through [`Translator::request_failed`].
    pub async fn dispatch(&self, ctx: &HookContext, arguments: Value) -> Result<Value> {
        if !self.adapter.supports(&ctx.command) {
            return Err(Error::unknown_command(&ctx.command));
        }

        let result = self.run(ctx, arguments).await;
        if result.is_err() {
            for translator in &self.translators {
                if translator.hooks().handles_request(&ctx.command) {
                    translator.request_failed(ctx);
                }
            }
        }
        result
    }

    async fn run(&self, ctx: &HookContext, mut arguments: Value) -> Result<Value> {
        for translator in &self.translators {
            if translator.hooks().handles_request(&ctx.command) {
                trace!(translator = translator.name(), command = %ctx.command, seq = ctx.seq, "Request hook");
                translator.on_request(ctx, &mut arguments).await?;
            }
        }

        let mut body = self.adapter.handle(ctx, arguments).await?;

        for translator in self.translators.iter().rev() {
            if translator.hooks().handles_response(&ctx.command) {
                trace!(translator = translator.name(), command = %ctx.command, seq = ctx.seq, "Response hook");
                translator.on_response(ctx, &mut body).await?;
            }
        }

        Ok(body)
    }

    /// Runs script-observed hooks in reverse registration order.
    pub async fn script_observed(&self, event: &mut ScriptObserved) {
        for translator in self.translators.iter().rev() {
            if translator.hooks().handles_script_observed() {
                translator.on_script_observed(event).await;
            }
        }
    }

    /// Tells every translator the client context was reset.
    pub fn client_context_cleared(&self) {
        debug!("Client context cleared");
        for translator in &self.translators {
            translator.client_context_cleared();
        }
    }

    /// Tells every translator the target context was reset.
    pub fn target_context_cleared(&self) {
        debug!("Target context cleared");
        for translator in &self.translators {
            translator.target_context_cleared();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
