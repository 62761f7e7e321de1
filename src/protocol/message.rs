//! Request, Response and Event message types.
//!
//! Defines the envelope shared by every message on the client stream.
//! The `type` field discriminates between the three kinds.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// ProtocolMessage
// ============================================================================

/// Any message carried by the client stream.
///
/// # Format
///
/// ```json
/// { "seq": 1, "type": "request", "command": "setBreakpoints", "arguments": { ... } }
/// { "seq": 2, "type": "response", "request_seq": 1, "success": true, "command": "setBreakpoints", "body": { ... } }
/// { "seq": 3, "type": "event", "event": "loadedSource", "body": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    /// Command request.
    Request(Request),
    /// Reply to a request.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

impl ProtocolMessage {
    /// Returns the message's sequence number.
    #[inline]
    #[must_use]
    pub fn seq(&self) -> i64 {
        match self {
            Self::Request(request) => request.seq,
            Self::Response(response) => response.seq,
            Self::Event(event) => event.seq,
        }
    }

    /// Stamps the message with an outgoing sequence number.
    pub(crate) fn set_seq(&mut self, seq: i64) {
        match self {
            Self::Request(request) => request.seq = seq,
            Self::Response(response) => response.seq = seq,
            Self::Event(event) => event.seq = seq,
        }
    }

    /// Returns the command or event name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Request(request) => &request.command,
            Self::Response(response) => &response.command,
            Self::Event(event) => &event.event,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A command request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number assigned by the sender.
    #[serde(default)]
    pub seq: i64,

    /// Command name, e.g. `setBreakpoints`.
    pub command: String,

    /// Command arguments.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl Request {
    /// Creates an unsequenced request; the channel stamps `seq` on send.
    #[inline]
    #[must_use]
    pub fn new(command: impl Into<String>, arguments: Value) -> Self {
        Self {
            seq: 0,
            command: command.into(),
            arguments,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number assigned by the sender.
    #[serde(default)]
    pub seq: i64,

    /// Sequence number of the request being answered.
    pub request_seq: i64,

    /// Whether the request succeeded.
    pub success: bool,

    /// Command of the request being answered.
    pub command: String,

    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result body.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Response {
    /// Creates a successful response to `request`.
    #[must_use]
    pub fn success(request: &Request, body: Value) -> Self {
        Self {
            seq: 0,
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body,
        }
    }

    /// Creates a failed response carrying the originating command name.
    #[must_use]
    pub fn failure(request_seq: i64, command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            request_seq,
            success: false,
            command: command.into(),
            message: Some(message.into()),
            body: Value::Null,
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Extracts the body, returning an error if the response failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response was a failure.
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            Ok(self.body)
        } else {
            let message = self
                .message
                .unwrap_or_else(|| format!("{} failed", self.command));
            Err(Error::protocol(message))
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An unsolicited notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number assigned by the sender.
    #[serde(default)]
    pub seq: i64,

    /// Event name, e.g. `loadedSource`.
    pub event: String,

    /// Event payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Event {
    /// Creates an unsequenced event.
    #[inline]
    #[must_use]
    pub fn new(event: impl Into<String>, body: Value) -> Self {
        Self {
            seq: 0,
            event: event.into(),
            body,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
