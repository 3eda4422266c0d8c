//! WebSocket transport layer.
//!
//! This module owns the duplex connection to the remote service and
//! the correlation of outbound requests to their responses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                         ┌─────────────────┐
//! │  Client (Rust)   │        WebSocket        │  Remote service │
//! │                  │◄───────────────────────►│                 │
//! │  PendingRequests │     wss://host/path     │  command host   │
//! │  ← Connection    │                         │                 │
//! └──────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - dial and complete the handshake within the
//!    configured wait
//! 2. Event loop - send request frames, route responses by correlation
//!    id, forward events to the client router
//! 3. `Connection::close` - idempotent close; in-flight requests on
//!    the connection's epoch fail with `ConnectionClosed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `correlation` | Pending request tracking with epoch checks |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub(crate) mod connection;

/// Pending request tracking.
pub(crate) mod correlation;

// ============================================================================
// Re-exports
// ============================================================================

pub(crate) use connection::{Connection, SessionEvent};
pub(crate) use correlation::PendingRequests;
