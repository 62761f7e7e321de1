//! Error types for the debug bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use dap_sourcemap_bridge::{Error, Result};
//!
//! async fn example(channel: &Channel) -> Result<()> {
//!     let response = channel.send_request("runInTerminal", args).await?;
//!     response.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::RequestTimeout`] |
//! | Protocol | [`Error::UnknownCommand`], [`Error::InvalidArgument`], [`Error::Protocol`], [`Error::Framing`] |
//! | Breakpoints | [`Error::CommitTimeout`], [`Error::Remote`], [`Error::Superseded`] |
//! | Source maps | [`Error::SourceMap`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::ScriptId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Client stream closed unexpectedly.
    ///
    /// Returned to every outstanding request when the channel shuts down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Locally issued request timed out.
    #[error("Request {seq} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Sequence number of the request.
        seq: i64,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unknown command.
    ///
    /// Returned when no adapter operation exists for a request.
    #[error("Unknown command: {command}")]
    UnknownCommand {
        /// The unrecognized command.
        command: String,
    },

    /// Invalid argument in a request.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Protocol violation or failed response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Malformed frame on the wire.
    #[error("Framing error: {message}")]
    Framing {
        /// Description of the framing problem.
        message: String,
    },

    // ========================================================================
    // Breakpoint Errors
    // ========================================================================
    /// Breakpoint commit transaction exceeded its time budget.
    #[error("Breakpoint commit for script {script_id} timed out after {timeout_ms}ms")]
    CommitTimeout {
        /// Script whose transaction timed out.
        script_id: ScriptId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Remote runtime rejected an operation.
    #[error("Remote error: {message}")]
    Remote {
        /// Message reported by the remote runtime.
        message: String,
    },

    /// A pending breakpoint request was replaced by a newer one for the same file.
    #[error("Breakpoint request for {path} superseded by a newer request")]
    Superseded {
        /// Path the request was waiting on.
        path: String,
    },

    // ========================================================================
    // Source Map Errors
    // ========================================================================
    /// Source map could not be decoded.
    #[error("Source map error: {message}")]
    SourceMap {
        /// Description of the decoding problem.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(seq: i64, timeout_ms: u64) -> Self {
        Self::RequestTimeout { seq, timeout_ms }
    }

    /// Creates an unknown command error.
    #[inline]
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a framing error.
    #[inline]
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing {
            message: message.into(),
        }
    }

    /// Creates a commit timeout error.
    #[inline]
    pub fn commit_timeout(script_id: ScriptId, timeout_ms: u64) -> Self {
        Self::CommitTimeout {
            script_id,
            timeout_ms,
        }
    }

    /// Creates a remote runtime error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a superseded request error.
    #[inline]
    pub fn superseded(path: impl Into<String>) -> Self {
        Self::Superseded { path: path.into() }
    }

    /// Creates a source map error.
    #[inline]
    pub fn source_map(message: impl Into<String>) -> Self {
        Self::SourceMap {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::CommitTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::ChannelClosed(_) | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::unknown_command("evaluate");
        assert_eq!(err.to_string(), "Unknown command: evaluate");
    }

    #[test]
    fn test_commit_timeout_display() {
        let err = Error::commit_timeout(ScriptId::new("42"), 5000);
        assert_eq!(
            err.to_string(),
            "Breakpoint commit for script 42 timed out after 5000ms"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(3, 1000);
        let other_err = Error::protocol("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
