//! Server event classification.
//!
//! Inbound frames that do not complete a pending request are
//! classified by their `type` tag and dispatched to registered
//! observers.
//!
//! | `type` | Variant |
//! |--------|---------|
//! | `server_info` | [`ServerEvent::ServerInfo`] |
//! | `apps_list` | [`ServerEvent::CommandCatalog`] |
//! | `tellraw` | [`ServerEvent::Message`] |
//! | `error` | [`ServerEvent::ServerError`] |
//! | `command_response` | [`ServerEvent::CommandResponse`] |
//! | `authenticated`, `auth_response` | [`ServerEvent::Authenticated`] |
//! | `auth_failed` | [`ServerEvent::AuthFailed`] |
//! | anything else | [`ServerEvent::Raw`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::protocol::command::{CommandDefinition, Role};

use super::frame::InboundFrame;

// ============================================================================
// AuthUser
// ============================================================================

/// Identity payload carried by a successful authentication message.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// Authenticated username.
    pub username: String,
    /// Granted role.
    pub role: Role,
}

// ============================================================================
// ServerEvent
// ============================================================================

/// A classified server-initiated message.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Server identification and metadata.
    ServerInfo {
        /// Full message payload.
        payload: Value,
    },

    /// Replacement command catalog.
    CommandCatalog {
        /// Parsed command definitions, in catalog order.
        commands: Vec<CommandDefinition>,
    },

    /// Chat/console line to surface to the user.
    Message {
        /// Rendered message content.
        content: String,
    },

    /// Server-side error notification.
    ServerError {
        /// Error description.
        message: String,
    },

    /// Uncorrelated command output.
    CommandResponse {
        /// Full message payload.
        payload: Value,
    },

    /// Authentication accepted.
    Authenticated {
        /// Authenticated identity.
        user: AuthUser,
        /// Fresh credential token, when the server rotates it.
        token: Option<String>,
    },

    /// Authentication rejected.
    AuthFailed {
        /// Server-supplied reason.
        message: String,
    },

    /// Message with an unrecognized or missing `type` tag.
    Raw {
        /// The `type` tag, when present.
        event_type: Option<String>,
        /// Full message payload.
        payload: Value,
    },
}

impl ServerEvent {
    /// Classifies a decoded inbound frame.
    #[must_use]
    pub fn classify(frame: InboundFrame) -> Self {
        let kind = frame.event_type().map(str::to_string);
        let value = frame.into_value();

        match kind.as_deref() {
            Some("server_info") => Self::ServerInfo { payload: value },

            Some("apps_list") => Self::CommandCatalog {
                commands: parse_catalog(&value),
            },

            Some("tellraw") => Self::Message {
                content: get_string(&value, "message"),
            },

            Some("error") => Self::ServerError {
                message: get_string(&value, "message"),
            },

            Some("command_response") => Self::CommandResponse { payload: value },

            Some("authenticated") | Some("auth_response") => match parse_auth_user(&value) {
                Some(user) => Self::Authenticated {
                    user,
                    token: value
                        .get("token")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                },
                // Auth message without a usable identity: surface raw.
                None => Self::Raw {
                    event_type: kind,
                    payload: value,
                },
            },

            Some("auth_failed") => Self::AuthFailed {
                message: get_string(&value, "message"),
            },

            _ => Self::Raw {
                event_type: kind,
                payload: value,
            },
        }
    }

    /// Returns `true` for the two terminal authentication variants.
    #[inline]
    #[must_use]
    pub fn is_auth_terminal(&self) -> bool {
        matches!(self, Self::Authenticated { .. } | Self::AuthFailed { .. })
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

/// Extracts a string field, empty when absent.
fn get_string(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parses the command list from an `apps_list` message.
///
/// Entries that fail to parse are skipped; a partially bad catalog
/// must not drop the whole push.
fn parse_catalog(value: &Value) -> Vec<CommandDefinition> {
    let entries = value
        .get("apps")
        .or_else(|| value.get("commands"))
        .and_then(Value::as_array);

    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            serde_json::from_value::<CommandDefinition>(entry.clone())
                .inspect_err(|e| tracing::warn!(error = %e, "Skipping malformed catalog entry"))
                .ok()
        })
        .collect()
}

/// Parses the `user` object from an authentication message.
fn parse_auth_user(value: &Value) -> Option<AuthUser> {
    let user = value.get("user")?;
    let username = user.get("username")?.as_str()?.to_string();
    let role = serde_json::from_value::<Role>(user.get("role")?.clone()).ok()?;

    Some(AuthUser { username, role })
}

// ============================================================================
// Tests
// ============================================================================
