//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```ignore
//! use dap_sourcemap_bridge::Session;
//!
//! let (reader, writer) = tokio::io::split(stream);
//! let session = Session::builder()
//!     .web_root("/home/me/project")
//!     .remote(remote)
//!     .build(reader, writer)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::breakpoints::RemoteDebuggerClient;
use crate::error::{Error, Result};
use crate::paths;

use super::core::Session;
use super::options::BridgeOptions;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Project/web root.
    web_root: Option<String>,
    /// Remote runtime client.
    remote: Option<Arc<dyn RemoteDebuggerClient>>,
    /// Behaviour switches.
    options: BridgeOptions,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project/web root.
    ///
    /// Web URLs map under this directory and rooted `sourceRoot`s resolve
    /// against it.
    #[inline]
    #[must_use]
    pub fn web_root(mut self, web_root: impl Into<String>) -> Self {
        self.web_root = Some(web_root.into());
        self
    }

    /// Sets the remote runtime client.
    #[inline]
    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn RemoteDebuggerClient>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the bridge options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the session over a connected client stream.
    ///
    /// Spawns the channel's event loop, so this must be called from within
    /// a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the web root is missing or relative
    /// - [`Error::Config`] if the remote client is missing
    /// - [`Error::Config`] if the options are invalid
    pub fn build<R, W>(self, reader: R, writer: W) -> Result<Session>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let web_root = self.validate_web_root()?;
        let remote = self.validate_remote()?;
        self.options.validate().map_err(Error::config)?;

        Session::new(web_root, remote, &self.options, reader, writer)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the web root configuration.
    fn validate_web_root(&self) -> Result<String> {
        let web_root = self.web_root.as_deref().ok_or_else(|| {
            Error::config(
                "Web root is required. Use .web_root() to set it.\n\
                 Example: Session::builder().web_root(\"/home/me/project\")",
            )
        })?;

        if !paths::is_absolute(web_root) {
            return Err(Error::config(format!(
                "Web root must be an absolute path, got: {web_root}"
            )));
        }

        Ok(paths::normalize(web_root))
    }

    /// Validates the remote client configuration.
    fn validate_remote(&self) -> Result<Arc<dyn RemoteDebuggerClient>> {
        self.remote.clone().ok_or_else(|| {
            Error::config("Remote runtime client is required. Use .remote() to set it.")
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
