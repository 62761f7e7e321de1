//! Bridge configuration options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use dap_sourcemap_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_path_override("app://*", "${webRoot}/app/*")
//!     .with_commit_timeout(Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::breakpoints::committer::DEFAULT_COMMIT_TIMEOUT;
use crate::error::Result;
use crate::sourcemap::PathOverrides;
use crate::transport::channel::DEFAULT_REQUEST_TIMEOUT;

// ============================================================================
// BridgeOptions
// ============================================================================

/// Session behaviour switches and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Translate through source maps.
    pub source_maps: bool,

    /// Start from the built-in bundler overrides.
    pub default_overrides: bool,

    /// Extra `(pattern, replacement)` overrides, applied after the defaults.
    pub path_overrides: Vec<(String, String)>,

    /// Time budget of one breakpoint commit.
    pub commit_timeout: Duration,

    /// Time budget of requests the bridge sends to the client.
    pub request_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with source maps on and default limits.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source_maps: true,
            default_overrides: true,
            path_overrides: Vec::new(),
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Turns source map translation on or off.
    #[inline]
    #[must_use]
    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    /// Drops the built-in bundler overrides.
    #[inline]
    #[must_use]
    pub fn without_default_overrides(mut self) -> Self {
        self.default_overrides = false;
        self
    }

    /// Adds a source path override.
    ///
    /// `pattern` may contain one `*`; `replacement` may use `*` and
    /// `${webRoot}`.
    #[inline]
    #[must_use]
    pub fn with_path_override(
        mut self,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.path_overrides.push((pattern.into(), replacement.into()));
        self
    }

    /// Sets the time budget of one breakpoint commit.
    #[inline]
    #[must_use]
    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Sets the time budget of requests sent to the client.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl BridgeOptions {
    /// Compiles the configured overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for a pattern with more than one `*`.
    pub fn to_path_overrides(&self) -> Result<PathOverrides> {
        let mut overrides = if self.default_overrides {
            PathOverrides::defaults()
        } else {
            PathOverrides::new()
        };
        for (pattern, replacement) in &self.path_overrides {
            overrides.insert(pattern, replacement)?;
        }
        Ok(overrides)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.commit_timeout.is_zero() {
            return Err("Commit timeout must be greater than zero".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("Request timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
