//! Error types for the remote console client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use remote_console::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.login_with_token("secret").await?;
//!     let reply = client.request("tp", serde_json::json!({"target": "Steve"})).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Request | [`Error::RequestTimeout`], [`Error::RequestFailed`] |
//! | Authentication | [`Error::Authentication`] |
//! | Commands | [`Error::CommandNotFound`], [`Error::PermissionDenied`], [`Error::InvalidParameter`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::MessageId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection handshake did not complete in time.
    ///
    /// Returned when the server does not accept the connection within
    /// the configured handshake wait.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an open session.
    ///
    /// Returned when a send, request, or login is attempted while
    /// disconnected.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// No correlated response arrived within the timeout budget.
    ///
    /// Request-local; the session itself is unaffected.
    #[error("Request {message_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The correlation id that timed out.
        message_id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Server explicitly reported a request failure.
    #[error("Request failed: {message}")]
    RequestFailed {
        /// Server-supplied failure reason.
        message: String,
    },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// Credential rejected by the server.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Server-supplied reason.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// No command with the given canonical name is registered.
    #[error("Unknown command: {name}")]
    CommandNotFound {
        /// The canonical name that failed to resolve.
        name: String,
    },

    /// Caller lacks the permissions the command requires.
    #[error("Permission denied: {name}")]
    PermissionDenied {
        /// Canonical name of the refused command.
        name: String,
    },

    /// Argument coercion failed during interactive collection.
    ///
    /// Local to the resolution state machine; the offending argument
    /// slot remains re-enterable.
    #[error("Invalid value for parameter '{parameter}': {message}")]
    InvalidParameter {
        /// Name of the parameter being collected.
        parameter: String,
        /// Description of the coercion failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
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

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(message_id: MessageId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            message_id,
            timeout_ms,
        }
    }

    /// Creates a request failure error.
    #[inline]
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[inline]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a command-not-found error.
    #[inline]
    pub fn command_not_found(name: impl Into<String>) -> Self {
        Self::CommandNotFound { name: name.into() }
    }

    /// Creates a permission-denied error.
    #[inline]
    pub fn permission_denied(name: impl Into<String>) -> Self {
        Self::PermissionDenied { name: name.into() }
    }

    /// Creates an invalid parameter error.
    #[inline]
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
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
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is local to one request.
    ///
    /// Request-local errors leave the session state untouched and are
    /// never retried automatically.
    #[inline]
    #[must_use]
    pub fn is_request_local(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::RequestFailed { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
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
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(Error::NotConnected.to_string(), "Not connected");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = Error::invalid_parameter("count", "not a number");
        assert_eq!(
            err.to_string(),
            "Invalid value for parameter 'count': not a number"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::ConnectionTimeout { timeout_ms: 5000 };
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        let conn_err = Error::connection("test");
        let timeout_err = Error::ConnectionTimeout { timeout_ms: 1000 };
        let closed_err = Error::ConnectionClosed;
        let not_connected = Error::NotConnected;
        let other_err = Error::authentication("test");

        assert!(conn_err.is_connection_error());
        assert!(timeout_err.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(not_connected.is_connection_error());
        assert!(!other_err.is_connection_error());
    }

    #[test]
    fn test_is_request_local() {
        let failed = Error::request_failed("nope");
        let timeout = Error::request_timeout(MessageId::generate(), 30_000);
        let conn = Error::ConnectionClosed;

        assert!(failed.is_request_local());
        assert!(timeout.is_request_local());
        assert!(!conn.is_request_local());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
