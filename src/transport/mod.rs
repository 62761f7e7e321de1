//! Client stream transport layer.
//!
//! This module handles communication with the debugging client over any
//! duplex byte stream (stdio, TCP, an in-memory pipe in tests).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (IDE)   │    Content-Length framing    │  Channel (Rust) │
//! │                 │◄────────────────────────────►│                 │
//! │                 │       JSON messages          │  → MessageSink  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Event loop, correlation, routing |
//! | `framing` | `Content-Length` encoder and incremental parser |

// ============================================================================
// Submodules
// ============================================================================

/// Event loop, correlation and routing.
pub mod channel;

/// `Content-Length` framing.
pub mod framing;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, MessageSink};
pub use framing::FrameParser;

// ============================================================================
// Test Support
// ============================================================================
