//! Authentication flow.
//!
//! Two equivalent entry points send a single credential frame (a
//! stored token or a one-time ticket) and await exactly one terminal
//! message: `authenticated` or `auth_failed`. The router resolves the
//! registered waiter when the terminal message arrives; identity is
//! updated there so unsolicited authentication messages (such as the
//! transparent replay after a reconnect) take the same path.
//!
//! Logout is purely local: it clears the session identity and strips
//! the stored credentials from the current connection record without
//! any network round trip.

// ============================================================================
// Imports
// ============================================================================

use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

use crate::client::core::{Client, ClientInner};
use crate::client::registry::SessionIdentity;
use crate::error::{Error, Result};
use crate::protocol::{AuthUser, RequestFrame};
use crate::transport::Connection;

// ============================================================================
// AuthOutcome
// ============================================================================

/// Terminal result delivered to a waiting login call.
#[derive(Debug)]
pub(crate) enum AuthOutcome {
    /// Credential accepted.
    Accepted {
        /// Authenticated identity.
        user: AuthUser,
        /// Fresh token, when the server rotates credentials.
        token: Option<String>,
    },
    /// Credential rejected.
    Rejected {
        /// Server-supplied reason.
        message: String,
    },
}

// ============================================================================
// AuthCredential
// ============================================================================

/// The credential material sent to the server.
enum AuthCredential {
    /// Long-lived stored token.
    Token(String),
    /// One-time login ticket.
    Ticket(String),
}

// ============================================================================
// Client - Authentication API
// ============================================================================

impl Client {
    /// Authenticates with a stored token.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] when no session is open
    /// - [`Error::Authentication`] when the server rejects the token
    /// - [`Error::RequestTimeout`] when no terminal message arrives
    pub async fn login_with_token(&self, token: &str) -> Result<SessionIdentity> {
        self.inner.authenticate_token(token).await
    }

    /// Authenticates with a one-time ticket.
    ///
    /// # Errors
    ///
    /// Same as [`Client::login_with_token`].
    pub async fn login_with_ticket(&self, ticket: &str) -> Result<SessionIdentity> {
        self.inner
            .authenticate(AuthCredential::Ticket(ticket.to_string()))
            .await
    }

    /// Logs out locally.
    ///
    /// Clears the session identity and strips stored credentials from
    /// the current URL's connection record. No network round trip.
    pub fn logout(&self) {
        *self.inner.identity.lock() = None;

        let url = self.inner.current_url.lock().clone();
        if let Some(url) = url {
            self.inner.records.upsert(url.as_str(), |record| {
                record.token = None;
                record.username = None;
                record.operator = None;
            });
        }

        debug!("Logged out");
    }
}

// ============================================================================
// ClientInner - Authentication
// ============================================================================

impl ClientInner {
    /// Token authentication, shared by the public API and the
    /// reconnect supervisor's transparent replay.
    pub(crate) async fn authenticate_token(&self, token: &str) -> Result<SessionIdentity> {
        self.authenticate(AuthCredential::Token(token.to_string()))
            .await
    }

    /// Sends one credential frame and awaits its terminal message.
    async fn authenticate(&self, credential: AuthCredential) -> Result<SessionIdentity> {
        let conn = self
            .conn
            .lock()
            .clone()
            .filter(Connection::is_open)
            .ok_or(Error::NotConnected)?;

        let (event_type, data, submitted_token) = match &credential {
            AuthCredential::Token(token) => {
                ("auth", json!({ "token": token }), Some(token.clone()))
            }
            AuthCredential::Ticket(ticket) => ("auth_ticket", json!({ "ticket": ticket }), None),
        };

        // Register the waiter before sending; a prior unresolved
        // waiter is superseded and its login call fails.
        let (tx, rx) = oneshot::channel();
        *self.auth_waiter.lock() = Some(tx);

        let frame = RequestFrame::new(event_type, data);
        let message_id = frame.message_id.clone();
        if let Err(e) = conn.send(frame) {
            *self.auth_waiter.lock() = None;
            return Err(e);
        }

        let outcome = match timeout(self.config.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => {
                *self.auth_waiter.lock() = None;
                return Err(Error::request_timeout(
                    message_id,
                    self.config.request_timeout.as_millis() as u64,
                ));
            }
        };

        match outcome {
            AuthOutcome::Accepted { user, token } => {
                // Prefer a rotated token; fall back to the submitted
                // one. A ticket is one-time and never stored.
                let stored = token.or(submitted_token);

                let url = self.current_url.lock().clone();
                if let Some(url) = url {
                    self.records.upsert(url.as_str(), |record| {
                        if let Some(token) = &stored {
                            record.token = Some(token.clone());
                        }
                        record.username = Some(user.username.clone());
                        record.operator = Some(user.role.is_privileged());
                    });
                }

                debug!(username = %user.username, role = %user.role, "Authenticated");
                Ok(SessionIdentity {
                    username: user.username,
                    role: user.role,
                })
            }

            AuthOutcome::Rejected { message } => Err(Error::authentication(message)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::Value;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;

    use crate::protocol::Role;

    type ServerWs = WebSocketStream<TcpStream>;

    async fn spawn_server<F, Fut>(serve: F) -> String
    where
        F: FnOnce(ServerWs) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            serve(ws).await;
        });

        format!("ws://127.0.0.1:{port}")
    }

    fn client() -> Client {
        Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_secs(2))
            .auto_reconnect(false)
            .build()
    }

    /// Serves one auth exchange, replying with `reply` after asserting
    /// the expected event type.
    async fn auth_server(mut ws: ServerWs, expected_event: &str, reply: Value) {
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let frame: Value = serde_json::from_str(&text).expect("json");
            assert_eq!(frame["eventType"], expected_event);
            let _ = ws.send(Message::Text(reply.to_string().into())).await;
        }
        while ws.next().await.is_some() {}
    }

    #[tokio::test]
    async fn test_token_login_success_updates_record() {
        let reply = serde_json::json!({
            "type": "authenticated",
            "user": { "username": "Steve", "role": "operator" },
            "token": "rotated-token"
        });
        let url = spawn_server(move |ws| auth_server(ws, "auth", reply)).await;

        let client = client();
        client.open(&url).await.expect("open");

        let identity = client.login_with_token("old-token").await.expect("login");
        assert_eq!(identity.username, "Steve");
        assert_eq!(identity.role, Role::Operator);
        assert_eq!(client.identity(), Some(identity));

        let record = client.record(&format!("{url}/")).expect("record");
        assert_eq!(record.token.as_deref(), Some("rotated-token"));
        assert_eq!(record.username.as_deref(), Some("Steve"));
        assert_eq!(record.operator, Some(true));

        client.disconnect();
    }

    #[tokio::test]
    async fn test_token_login_keeps_submitted_token_when_none_returned() {
        let reply = serde_json::json!({
            "type": "authenticated",
            "user": { "username": "Alex", "role": "player" }
        });
        let url = spawn_server(move |ws| auth_server(ws, "auth", reply)).await;

        let client = client();
        client.open(&url).await.expect("open");
        client.login_with_token("my-token").await.expect("login");

        let record = client.record(&format!("{url}/")).expect("record");
        assert_eq!(record.token.as_deref(), Some("my-token"));
        assert_eq!(record.operator, Some(false));

        client.disconnect();
    }

    #[tokio::test]
    async fn test_ticket_login_does_not_store_ticket() {
        let reply = serde_json::json!({
            "type": "authenticated",
            "user": { "username": "Alex", "role": "player" }
        });
        let url = spawn_server(move |ws| auth_server(ws, "auth_ticket", reply)).await;

        let client = client();
        client.open(&url).await.expect("open");
        client.login_with_ticket("one-time").await.expect("login");

        let record = client.record(&format!("{url}/")).expect("record");
        assert!(record.token.is_none());
        assert_eq!(record.username.as_deref(), Some("Alex"));

        client.disconnect();
    }

    #[tokio::test]
    async fn test_login_failure_leaves_record_unchanged() {
        let reply = serde_json::json!({
            "type": "auth_failed",
            "message": "token expired"
        });
        let url = spawn_server(move |ws| auth_server(ws, "auth", reply)).await;

        let client = client();
        client.open(&url).await.expect("open");

        let err = client.login_with_token("stale").await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
        assert!(err.to_string().contains("token expired"));
        assert!(client.identity().is_none());

        // Connect already created the record; auth failure must not
        // touch its credential fields.
        let record = client.record(&format!("{url}/")).expect("record");
        assert!(record.token.is_none());
        assert!(record.username.is_none());

        client.disconnect();
    }

    #[tokio::test]
    async fn test_login_requires_open_session() {
        let client = client();
        let err = client.login_with_token("whatever").await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_logout_is_local_and_strips_credentials() {
        let reply = serde_json::json!({
            "type": "authenticated",
            "user": { "username": "Steve", "role": "player" },
            "token": "fresh"
        });
        let url = spawn_server(move |ws| auth_server(ws, "auth", reply)).await;

        let client = client();
        client.open(&url).await.expect("open");
        client.login_with_token("tok").await.expect("login");

        client.logout();

        assert!(client.identity().is_none());
        let record = client.record(&format!("{url}/")).expect("record");
        assert!(record.token.is_none());
        assert!(record.username.is_none());
        assert!(record.operator.is_none());
        // Logout never drops the record itself.
        assert!(record.last_connected.is_some());

        client.disconnect();
    }
}
