//! Source map path overrides.
//!
//! Bundlers often emit source entries with their own URL schemes
//! (`webpack:///./src/app.ts`). An override rule maps such an entry onto a
//! local path:
//!
//! | Pattern | Replacement |
//! |---------|-------------|
//! | `webpack:///./~/*` | `${webRoot}/node_modules/*` |
//! | `webpack:///./*` | `${webRoot}/*` |
//! | `webpack:///src/*` | `${webRoot}/src/*` |
//! | `webpack:///*` | `*` |
//! | `meteor://💻app/*` | `${webRoot}/*` |
//!
//! Each pattern may contain one `*`. When several patterns match, the one
//! with the longest literal prefix wins.

// ============================================================================
// Imports
// ============================================================================

use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Placeholder replaced by the configured web root.
const WEB_ROOT_PLACEHOLDER: &str = "${webRoot}";

/// Rules applied when none are configured.
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("webpack:///./~/*", "${webRoot}/node_modules/*"),
    ("webpack:///./*", "${webRoot}/*"),
    ("webpack:///src/*", "${webRoot}/src/*"),
    ("webpack:///*", "*"),
    ("meteor://💻app/*", "${webRoot}/*"),
];

// ============================================================================
// PathOverride
// ============================================================================

/// One compiled `pattern → replacement` rule.
#[derive(Debug, Clone)]
struct PathOverride {
    pattern: String,
    matcher: Regex,
    replacement: String,
    specificity: usize,
}

impl PathOverride {
    fn compile(pattern: &str, replacement: &str) -> Result<Self> {
        let (prefix, suffix) = match pattern.split_once('*') {
            Some((prefix, suffix)) if !suffix.contains('*') => (prefix, Some(suffix)),
            None => (pattern, None),
            Some(_) => {
                return Err(Error::config(format!(
                    "path override {pattern:?} has more than one '*'"
                )));
            }
        };

        let source = match suffix {
            Some(suffix) => format!("^{}(.*){}$", regex::escape(prefix), regex::escape(suffix)),
            None => format!("^{}$", regex::escape(prefix)),
        };
        let matcher = Regex::new(&source)
            .map_err(|e| Error::config(format!("path override {pattern:?}: {e}")))?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            replacement: replacement.to_string(),
            specificity: prefix.len(),
        })
    }
}

// ============================================================================
// PathOverrides
// ============================================================================

/// Ordered set of override rules.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    rules: Vec<PathOverride>,
}

impl PathOverrides {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default rule set for common bundlers.
    #[must_use]
    pub fn defaults() -> Self {
        let mut overrides = Self::new();
        for (pattern, replacement) in DEFAULT_RULES {
            if let Err(e) = overrides.insert(pattern, replacement) {
                warn!(pattern, error = %e, "Skipping default path override");
            }
        }
        overrides
    }

    /// Adds a rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pattern has more than one `*`.
    pub fn insert(&mut self, pattern: &str, replacement: &str) -> Result<()> {
        let rule = PathOverride::compile(pattern, replacement)?;
        self.rules.retain(|existing| existing.pattern != rule.pattern);
        self.rules.push(rule);
        Ok(())
    }

    /// Number of rules.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrites `source` with the most specific matching rule.
    ///
    /// Returns `None` when no rule matches.
    #[must_use]
    pub fn apply(&self, source: &str, web_root: &str) -> Option<String> {
        let (rule, captured) = self
            .rules
            .iter()
            .filter_map(|rule| {
                let captures = rule.matcher.captures(source)?;
                let captured = captures.get(1).map_or("", |m| m.as_str());
                Some((rule, captured))
            })
            .max_by_key(|(rule, _)| rule.specificity)?;

        let replaced = rule
            .replacement
            .replace(WEB_ROOT_PLACEHOLDER, web_root)
            .replacen('*', captured, 1);
        Some(replaced)
    }
}

// ============================================================================
// Tests
// ============================================================================
