//! Remote Console - Client runtime for remote command-execution services.
//!
//! This library maintains a supervised WebSocket session to a command
//! host, correlates request/response pairs over the shared transport,
//! and drives an interactive, typed command-entry flow against the
//! server-advertised command catalog.
//!
//! # Architecture
//!
//! The runtime follows a client-server model:
//!
//! - **Local End (Rust)**: sends correlated requests, receives
//!   responses and pushed events over one WebSocket
//! - **Remote End (Server)**: executes commands, pushes its command
//!   catalog, console output, and authentication results
//!
//! Key design principles:
//!
//! - One [`Client`] owns: connection lifecycle + pending request map +
//!   command registry + connection records
//! - Pending requests are epoch-tagged; a response from a previous
//!   connection can never resolve a continuation from the current one
//! - Unexpected closes trigger bounded reconnection with transparent
//!   credential replay
//! - The command composer is pure state over the registry and never
//!   touches the network
//!
//! # Quick Start
//!
//! ```no_run
//! use remote_console::{Client, CommandComposer, Outcome, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder().build();
//!     client.open("ws://localhost:8765").await?;
//!     client.login_with_token("stored-token").await?;
//!
//!     // Resolve "tp" and collect its argument interactively.
//!     let mut composer = CommandComposer::new();
//!     let identity = client.identity();
//!     client.with_registry(|registry| {
//!         composer.submit_line("tp", registry, identity.as_ref())
//!     })?;
//!     let outcome = client.with_registry(|registry| {
//!         composer.submit_line("Steve", registry, identity.as_ref())
//!     })?;
//!
//!     if let Outcome::Dispatch(dispatch) = outcome {
//!         let reply = client.dispatch(dispatch).await?;
//!         println!("{reply}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Session supervision, auth, registry, records, events |
//! | [`composer`] | Interactive command resolution and collection |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe id wrappers |
//! | [`protocol`] | Wire frames and command catalog types (internal) |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// High-level client runtime.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Interactive command composition.
///
/// The [`CommandComposer`] walks the user through command selection
/// and typed argument collection.
pub mod composer;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible ids at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Internal module defining frame and catalog structures.
pub mod protocol;

/// WebSocket transport layer.
///
/// Internal module handling the connection and request correlation.
pub(crate) mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    Client, ClientBuilder, ClientConfig, ClientEvent, CommandRegistry, ConnectionRecord,
    EventKind, MemoryStore, Observer, ObserverId, RecordStore, SessionIdentity, SessionState,
    is_invocable,
};

// Composer types
pub use composer::{CommandComposer, ComposerKey, ComposerMode, Dispatch, Outcome};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Epoch, MessageId};

// Protocol types
pub use protocol::{
    ArgumentValue, AuthUser, CommandDefinition, ParameterDefinition, ParameterType, Role,
};
