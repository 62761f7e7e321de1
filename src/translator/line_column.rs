//! Client line/column base conversion.
//!
//! Clients declare in `initialize` whether their lines and columns start at
//! 1 (the default) or 0. Everything behind this translator is 0-based.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::protocol::{
    InitializeArguments, SetBreakpointsArguments, SetBreakpointsResponseBody,
    StackTraceResponseBody, command,
};

use super::{HookContext, HookTable, Translator};

// ============================================================================
// LineColumnTranslator
// ============================================================================

/// Converts client coordinates to 0-based and back.
pub struct LineColumnTranslator {
    hooks: HookTable,
    lines_start_at1: AtomicBool,
    columns_start_at1: AtomicBool,
}

impl Default for LineColumnTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl LineColumnTranslator {
    /// Creates a translator assuming 1-based client coordinates until
    /// `initialize` says otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: HookTable::new()
                .request(command::INITIALIZE)
                .request(command::SET_BREAKPOINTS)
                .response(command::SET_BREAKPOINTS)
                .response(command::STACK_TRACE),
            lines_start_at1: AtomicBool::new(true),
            columns_start_at1: AtomicBool::new(true),
        }
    }

    /// Converts a client line to 0-based.
    #[inline]
    #[must_use]
    pub fn line_from_client(&self, line: u32) -> u32 {
        from_client(line, self.lines_start_at1.load(Ordering::Relaxed))
    }

    /// Converts a 0-based line to the client's base.
    #[inline]
    #[must_use]
    pub fn line_to_client(&self, line: u32) -> u32 {
        to_client(line, self.lines_start_at1.load(Ordering::Relaxed))
    }

    /// Converts a client column to 0-based.
    #[inline]
    #[must_use]
    pub fn column_from_client(&self, column: u32) -> u32 {
        from_client(column, self.columns_start_at1.load(Ordering::Relaxed))
    }

    /// Converts a 0-based column to the client's base.
    #[inline]
    #[must_use]
    pub fn column_to_client(&self, column: u32) -> u32 {
        to_client(column, self.columns_start_at1.load(Ordering::Relaxed))
    }

    fn record_initialize(&self, arguments: &Value) -> Result<()> {
        let args: InitializeArguments = if arguments.is_null() {
            InitializeArguments::default()
        } else {
            serde_json::from_value(arguments.clone())?
        };
        let lines = args.lines_start_at1.unwrap_or(true);
        let columns = args.columns_start_at1.unwrap_or(true);

        self.lines_start_at1.store(lines, Ordering::Relaxed);
        self.columns_start_at1.store(columns, Ordering::Relaxed);
        debug!(client = ?args.client_id, lines_start_at1 = lines, columns_start_at1 = columns, "Client coordinate base");
        Ok(())
    }

    fn translate_set_breakpoints(&self, arguments: &mut Value) -> Result<()> {
        let mut args: SetBreakpointsArguments = serde_json::from_value(arguments.take())?;

        for breakpoint in args.breakpoints.iter_mut().flatten() {
            breakpoint.line = self.line_from_client(breakpoint.line);
            breakpoint.column = breakpoint.column.map(|c| self.column_from_client(c));
        }
        for line in args.lines.iter_mut().flatten() {
            *line = self.line_from_client(*line);
        }
        for column in args.cols.iter_mut().flatten() {
            *column = self.column_from_client(*column);
        }

        *arguments = serde_json::to_value(args)?;
        Ok(())
    }

    fn translate_breakpoints_response(&self, body: &mut Value) -> Result<()> {
        let mut response: SetBreakpointsResponseBody = serde_json::from_value(body.take())?;
        for breakpoint in &mut response.breakpoints {
            breakpoint.line = breakpoint.line.map(|l| self.line_to_client(l));
            breakpoint.column = breakpoint.column.map(|c| self.column_to_client(c));
        }
        *body = serde_json::to_value(response)?;
        Ok(())
    }

    fn translate_stack_trace(&self, body: &mut Value) -> Result<()> {
        let mut trace: StackTraceResponseBody = serde_json::from_value(body.take())?;
        for frame in &mut trace.stack_frames {
            frame.line = self.line_to_client(frame.line);
            frame.column = self.column_to_client(frame.column);
        }
        *body = serde_json::to_value(trace)?;
        Ok(())
    }
}

impl Translator for LineColumnTranslator {
    fn name(&self) -> &'static str {
        "line-column"
    }

    fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    fn on_request<'a>(
        &'a self,
        ctx: &'a HookContext,
        arguments: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            match ctx.command.as_str() {
                command::INITIALIZE => self.record_initialize(arguments),
                command::SET_BREAKPOINTS => self.translate_set_breakpoints(arguments),
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn on_response<'a>(
        &'a self,
        ctx: &'a HookContext,
        body: &'a mut Value,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            match ctx.command.as_str() {
                command::SET_BREAKPOINTS => self.translate_breakpoints_response(body),
                command::STACK_TRACE => self.translate_stack_trace(body),
                _ => Ok(()),
            }
        }
        .boxed()
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[inline]
fn from_client(value: u32, one_based: bool) -> u32 {
    if one_based { value.saturating_sub(1) } else { value }
}

#[inline]
fn to_client(value: u32, one_based: bool) -> u32 {
    if one_based { value.saturating_add(1) } else { value }
}

// ============================================================================
// Tests
// ============================================================================
