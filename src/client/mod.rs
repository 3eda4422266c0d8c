//! High-level client runtime.
//!
//! The [`Client`] ties the transport layer to the stateful pieces of
//! the runtime: session supervision with bounded reconnection,
//! request correlation, authentication, connection records, the
//! command registry, and observer dispatch.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `auth` | Token/ticket login and logout |
//! | `config` | Timing policy and builder |
//! | `core` | Client, session supervision, requests |
//! | `events` | Observer registration and dispatch |
//! | `records` | Per-server connection records |
//! | `registry` | Command registry and permissions |

// ============================================================================
// Submodules
// ============================================================================

/// Authentication flow.
pub mod auth;

/// Client configuration and builder.
pub mod config;

/// Client runtime and session supervision.
pub mod core;

/// Client event observation.
pub mod events;

/// Connection records and their storage.
pub mod records;

/// Command registry and permission evaluation.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ClientBuilder, ClientConfig};
pub use core::{Client, SessionState};
pub use events::{ClientEvent, EventKind, Observer, ObserverId};
pub use records::{ConnectionRecord, MemoryStore, RecordStore};
pub use registry::{CommandRegistry, SessionIdentity, is_invocable};
