//! Client runtime and session supervision.
//!
//! The [`Client`] owns the connection lifecycle, the pending request
//! map, the command registry, connection records, and observer
//! dispatch. A single router task consumes session events from the
//! active connection; all state transitions happen there or in client
//! API calls, with short lock-protected critical sections and no lock
//! held across an await.
//!
//! # Session States
//!
//! ```text
//! Disconnected ──open()──► Connecting ──► Connected
//!      ▲                                     │
//!      │ disconnect()          unexpected close
//!      │                                     ▼
//!   GivenUp ◄──attempts exhausted── Reconnecting ──success──► Connected
//! ```
//!
//! Reconnection is bounded: after `max_reconnect_attempts` consecutive
//! failed reopens the supervisor gives up, emits one final
//! [`ClientEvent::Disconnected`], and waits for a fresh `open` call.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::auth::AuthOutcome;
use crate::client::config::{ClientBuilder, ClientConfig};
use crate::client::events::{ClientEvent, EventDispatcher, EventKind, Observer, ObserverId};
use crate::client::records::{ConnectionRecord, ConnectionRecords, RecordStore, now_unix_seconds};
use crate::client::registry::{CommandRegistry, SessionIdentity};
use crate::composer::Dispatch;
use crate::error::{Error, Result};
use crate::identifiers::Epoch;
use crate::protocol::{CommandDefinition, RequestFrame, ServerEvent};
use crate::transport::{Connection, PendingRequests, SessionEvent};

// ============================================================================
// SessionState
// ============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection and no reconnection in progress.
    Disconnected,
    /// An explicit `open` is dialing.
    Connecting,
    /// The session is open.
    Connected,
    /// The supervisor is retrying after an unexpected close.
    Reconnecting,
    /// Reconnection attempts are exhausted; a fresh `open` is needed.
    GivenUp,
}

// ============================================================================
// ClientInner
// ============================================================================

/// Shared state behind a [`Client`].
pub(crate) struct ClientInner {
    /// Timing and reconnection policy.
    pub(crate) config: ClientConfig,

    /// Current lifecycle state.
    pub(crate) state: Mutex<SessionState>,

    /// The active connection, when one is open.
    pub(crate) conn: Mutex<Option<Connection>>,

    /// In-flight requests, shared with every connection's event loop.
    pub(crate) pending: Arc<Mutex<PendingRequests>>,

    /// Latest allocated connection epoch.
    pub(crate) epoch_counter: AtomicU64,

    /// Authenticated identity, when any.
    pub(crate) identity: Mutex<Option<SessionIdentity>>,

    /// Server-advertised command registry.
    pub(crate) registry: Mutex<CommandRegistry>,

    /// Per-server connection records.
    pub(crate) records: ConnectionRecords,

    /// Observer registry.
    pub(crate) dispatcher: EventDispatcher,

    /// Waiter for the next terminal authentication message.
    pub(crate) auth_waiter: Mutex<Option<oneshot::Sender<AuthOutcome>>>,

    /// URL of the current or last session.
    pub(crate) current_url: Mutex<Option<Url>>,

    /// Consecutive reconnection attempts since the last successful open.
    pub(crate) reconnect_attempts: AtomicU32,

    /// Set by `disconnect()` so the next close is not treated as
    /// unexpected.
    pub(crate) expected_close: AtomicBool,

    /// Session event channel into the router task.
    pub(crate) events_tx: mpsc::UnboundedSender<SessionEvent>,
}

// ============================================================================
// Client
// ============================================================================

/// Client runtime for a remote command-execution service.
///
/// Cheap to clone; clones share one session.
///
/// # Example
///
/// ```no_run
/// use remote_console::Client;
///
/// # async fn example() -> remote_console::Result<()> {
/// let client = Client::builder().build();
/// client.open("ws://localhost:8765").await?;
/// client.login_with_token("stored-token").await?;
///
/// let reply = client
///     .request("tp", serde_json::json!({"target": "Steve"}))
///     .await?;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("pending", &self.inner.pending.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client and spawns its router task.
    pub(crate) fn new(config: ClientConfig, store: Arc<dyn RecordStore>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ClientInner {
            config,
            state: Mutex::new(SessionState::Disconnected),
            conn: Mutex::new(None),
            pending: Arc::new(Mutex::new(PendingRequests::new())),
            epoch_counter: AtomicU64::new(0),
            identity: Mutex::new(None),
            registry: Mutex::new(CommandRegistry::new()),
            records: ConnectionRecords::new(store),
            dispatcher: EventDispatcher::new(),
            auth_waiter: Mutex::new(None),
            current_url: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
            expected_close: AtomicBool::new(false),
            events_tx,
        });

        tokio::spawn(Self::run_router(Arc::downgrade(&inner), events_rx));

        Self { inner }
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Opens a session to `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] for an invalid URL, a failed dial, or
    ///   when a session is already open
    /// - [`Error::ConnectionTimeout`] when the handshake does not
    ///   complete within the configured wait
    pub async fn open(&self, url: &str) -> Result<()> {
        let url = Url::parse(url).map_err(|e| Error::connection(format!("invalid url: {e}")))?;

        if self.inner.conn.lock().is_some() {
            return Err(Error::connection("already connected; disconnect first"));
        }

        self.inner.expected_close.store(false, Ordering::SeqCst);
        self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
        *self.inner.current_url.lock() = Some(url.clone());
        *self.inner.state.lock() = SessionState::Connecting;

        match self.inner.connect_once(&url).await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.inner.state.lock() = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Closes the session.
    ///
    /// Idempotent: a session emits [`ClientEvent::Disconnected`]
    /// exactly once no matter how many times this is called. Also
    /// stops an in-progress reconnection.
    pub fn disconnect(&self) {
        self.inner.expected_close.store(true, Ordering::SeqCst);

        if let Some(conn) = self.inner.conn.lock().take() {
            debug!("Closing session");
            conn.close();
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Returns `true` while the session is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Returns the configured policy.
    #[inline]
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        self.inner.config.clone()
    }
}

// ============================================================================
// Client - Requests
// ============================================================================

impl Client {
    /// Sends a correlated request with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] when no session is open
    /// - [`Error::RequestFailed`] when the server reports failure
    /// - [`Error::RequestTimeout`] when no response arrives in time
    /// - [`Error::ConnectionClosed`] when the session closes mid-flight
    pub async fn request(&self, event_type: impl Into<String>, data: Value) -> Result<Value> {
        self.request_with_timeout(event_type, data, self.inner.config.request_timeout)
            .await
    }

    /// Sends a correlated request with a custom timeout.
    ///
    /// On timeout the pending entry is removed first, so a late
    /// straggling response is silently ignored.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn request_with_timeout(
        &self,
        event_type: impl Into<String>,
        data: Value,
        request_timeout: Duration,
    ) -> Result<Value> {
        let conn = self
            .inner
            .conn
            .lock()
            .clone()
            .filter(Connection::is_open)
            .ok_or(Error::NotConnected)?;

        let frame = RequestFrame::new(event_type, data);
        let message_id = frame.message_id.clone();
        let (tx, rx) = oneshot::channel();

        self.inner
            .pending
            .lock()
            .insert(message_id.clone(), conn.epoch(), tx);

        if let Err(e) = conn.send(frame) {
            self.inner.pending.lock().remove(&message_id);
            return Err(e);
        }

        match timeout(request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Remove first: a straggler arriving after this point
                // matches nothing and falls through to dispatch.
                self.inner.pending.lock().remove(&message_id);
                Err(Error::request_timeout(
                    message_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Sends a dispatch produced by the command composer.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`].
    pub async fn dispatch(&self, dispatch: Dispatch) -> Result<Value> {
        self.request(dispatch.event_type.clone(), dispatch.payload())
            .await
    }
}

// ============================================================================
// Client - State Access
// ============================================================================

impl Client {
    /// Returns the authenticated identity, when any.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<SessionIdentity> {
        self.inner.identity.lock().clone()
    }

    /// Returns the registered commands in ingestion order.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandDefinition> {
        self.inner.registry.lock().list().to_vec()
    }

    /// Resolves a canonical command name.
    #[must_use]
    pub fn resolve_command(&self, canonical: &str) -> Option<CommandDefinition> {
        self.inner.registry.lock().resolve(canonical).cloned()
    }

    /// Runs `f` with the live registry.
    ///
    /// Used to drive the command composer without cloning the catalog
    /// per keystroke.
    pub fn with_registry<R>(&self, f: impl FnOnce(&CommandRegistry) -> R) -> R {
        f(&self.inner.registry.lock())
    }

    /// Returns the connection record for `url`, if one is stored.
    #[must_use]
    pub fn record(&self, url: &str) -> Option<ConnectionRecord> {
        self.inner.records.load(url)
    }

    /// Registers an observer for one event kind.
    pub fn observe(&self, kind: EventKind, observer: Observer) -> ObserverId {
        self.inner.dispatcher.register(kind, observer)
    }

    /// Unregisters an observer. Returns `true` when one was removed.
    pub fn unobserve(&self, kind: EventKind, id: ObserverId) -> bool {
        self.inner.dispatcher.unregister(kind, id)
    }
}

// ============================================================================
// Client - Router
// ============================================================================

impl Client {
    /// Router task: consumes session events until every client handle
    /// is dropped.
    async fn run_router(
        inner: std::sync::Weak<ClientInner>,
        mut events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        while let Some(event) = events_rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            ClientInner::handle_session_event(&inner, event).await;
        }
        debug!("Router terminated");
    }
}

// ============================================================================
// ClientInner - Session Handling
// ============================================================================

impl ClientInner {
    /// Returns the epoch of the latest connection attempt.
    #[inline]
    pub(crate) fn current_epoch(&self) -> Epoch {
        Epoch::new(self.epoch_counter.load(Ordering::SeqCst))
    }

    /// Dials the current URL once and installs the new connection.
    pub(crate) async fn connect_once(&self, url: &Url) -> Result<()> {
        let epoch = Epoch::new(self.epoch_counter.fetch_add(1, Ordering::SeqCst) + 1);

        let conn = Connection::open(
            url,
            epoch,
            Arc::clone(&self.pending),
            self.events_tx.clone(),
            self.config.connect_timeout,
        )
        .await?;

        *self.conn.lock() = Some(conn);
        *self.state.lock() = SessionState::Connected;

        self.records.upsert(url.as_str(), |record| {
            record.last_connected = Some(now_unix_seconds());
        });

        info!(%url, %epoch, "Session open");
        self.emit(ClientEvent::Connected {
            url: url.to_string(),
        });
        Ok(())
    }

    /// Handles one session event from a connection's event loop.
    async fn handle_session_event(inner: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Inbound { epoch, event } => {
                if epoch == inner.current_epoch() {
                    inner.handle_server_event(event);
                }
            }

            SessionEvent::TransportError { epoch, message } => {
                if epoch == inner.current_epoch() {
                    inner.emit(ClientEvent::TransportError { message });
                }
            }

            SessionEvent::Closed { epoch } => {
                if epoch == inner.current_epoch() {
                    Self::handle_close(inner).await;
                }
            }
        }
    }

    /// Handles one classified server message.
    fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::ServerInfo { payload } => {
                // The game-facing address rides along with server info.
                let minecraft_url = payload
                    .get("minecraftUrl")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(minecraft_url) = minecraft_url {
                    let url = self.current_url.lock().clone();
                    if let Some(url) = url {
                        self.records.upsert(url.as_str(), |record| {
                            record.minecraft_url = Some(minecraft_url);
                        });
                    }
                }
                self.emit(ClientEvent::ServerInfo { payload });
            }

            ServerEvent::CommandCatalog { commands } => {
                self.registry.lock().ingest(commands.clone());
                self.emit(ClientEvent::CommandCatalog { commands });
            }

            ServerEvent::Authenticated { user, token } => {
                *self.identity.lock() = Some(SessionIdentity {
                    username: user.username.clone(),
                    role: user.role,
                });
                if let Some(waiter) = self.auth_waiter.lock().take() {
                    let _ = waiter.send(AuthOutcome::Accepted {
                        user: user.clone(),
                        token,
                    });
                }
                self.emit(ClientEvent::Authenticated { user });
            }

            ServerEvent::AuthFailed { message } => {
                // Never keep a stale identity past a rejected credential.
                *self.identity.lock() = None;
                if let Some(waiter) = self.auth_waiter.lock().take() {
                    let _ = waiter.send(AuthOutcome::Rejected {
                        message: message.clone(),
                    });
                }
                self.emit(ClientEvent::AuthFailed { message });
            }

            other => self.emit(ClientEvent::from_server(other)),
        }
    }

    /// Handles the close of the current connection.
    ///
    /// Expected closes settle to `Disconnected`. Unexpected closes
    /// enter the bounded reconnection loop when enabled.
    async fn handle_close(inner: &Arc<Self>) {
        *inner.conn.lock() = None;
        *inner.identity.lock() = None;
        *inner.auth_waiter.lock() = None;

        let expected = inner.expected_close.load(Ordering::SeqCst);
        if expected || !inner.config.auto_reconnect {
            *inner.state.lock() = SessionState::Disconnected;
            inner.emit(ClientEvent::Disconnected);
            return;
        }

        let url = inner.current_url.lock().clone();
        let Some(url) = url else {
            *inner.state.lock() = SessionState::Disconnected;
            inner.emit(ClientEvent::Disconnected);
            return;
        };

        *inner.state.lock() = SessionState::Reconnecting;
        warn!(%url, "Unexpected close, reconnecting");

        loop {
            if inner.expected_close.load(Ordering::SeqCst) {
                *inner.state.lock() = SessionState::Disconnected;
                inner.emit(ClientEvent::Disconnected);
                return;
            }

            let attempt = inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > inner.config.max_reconnect_attempts {
                warn!(
                    attempts = inner.config.max_reconnect_attempts,
                    "Reconnection attempts exhausted"
                );
                *inner.state.lock() = SessionState::GivenUp;
                inner.emit(ClientEvent::Disconnected);
                return;
            }

            debug!(attempt, "Reconnection attempt");
            sleep(inner.config.reconnect_delay).await;

            match inner.connect_once(&url).await {
                Ok(()) => {
                    inner.reconnect_attempts.store(0, Ordering::SeqCst);
                    // The auth round trip must not block the router:
                    // its terminal message is routed by this task.
                    let inner = Arc::clone(inner);
                    let url = url.clone();
                    tokio::spawn(async move { inner.replay_stored_auth(&url).await });
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnection attempt failed");
                }
            }
        }
    }

    /// Replays the stored credential token after a successful reopen.
    async fn replay_stored_auth(&self, url: &Url) {
        let token = self
            .records
            .load(url.as_str())
            .and_then(|record| record.token);

        if let Some(token) = token {
            debug!("Replaying stored credentials");
            if let Err(e) = self.authenticate_token(&token).await {
                warn!(error = %e, "Credential replay failed");
            }
        }
    }

    /// Dispatches one event to registered observers.
    #[inline]
    pub(crate) fn emit(&self, event: ClientEvent) {
        self.dispatcher.dispatch(&event);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;

    use crate::client::records::MemoryStore;

    type ServerWs = WebSocketStream<TcpStream>;

    /// Binds a listener and serves accepted WebSocket sessions with `serve`.
    async fn spawn_server<F, Fut>(serve: F) -> String
    where
        F: Fn(ServerWs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
                serve(ws).await;
            }
        });

        format!("ws://127.0.0.1:{port}")
    }

    fn fast_client() -> Client {
        Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_millis(500))
            .reconnect_delay(Duration::from_millis(20))
            .build()
    }

    /// Observer that forwards matching events into a channel.
    fn watch(client: &Client, kind: EventKind) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        client.observe(
            kind,
            Box::new(move |event| {
                let _ = tx.send(event.clone());
            }),
        );
        rx
    }

    /// Scripted responder: answers every request per its event type.
    async fn echo_responder(mut ws: ServerWs) {
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let frame: Value = serde_json::from_str(&text).expect("json");
            let reply = match frame["eventType"].as_str() {
                Some("denied") => json!({
                    "messageId": frame["messageId"],
                    "success": false,
                    "error": "denied by server"
                }),
                Some("slow") => continue,
                _ => json!({
                    "messageId": frame["messageId"],
                    "success": true,
                    "data": { "echo": frame["eventType"] }
                }),
            };
            if ws
                .send(Message::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_open_request_resolves() {
        let url = spawn_server(echo_responder).await;
        let client = fast_client();

        client.open(&url).await.expect("open");
        assert!(client.is_connected());

        let reply = client.request("ping", json!({})).await.expect("reply");
        assert_eq!(reply, json!({"echo": "ping"}));
        assert!(client.inner.pending.lock().is_empty());

        client.disconnect();
    }

    #[tokio::test]
    async fn test_request_rejected_by_server() {
        let url = spawn_server(echo_responder).await;
        let client = fast_client();
        client.open(&url).await.expect("open");

        let err = client.request("denied", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::RequestFailed { .. }));
        assert!(err.to_string().contains("denied by server"));
        assert!(client.inner.pending.lock().is_empty());

        client.disconnect();
    }

    #[tokio::test]
    async fn test_request_times_out_and_entry_is_removed() {
        let url = spawn_server(echo_responder).await;
        let client = fast_client();
        client.open(&url).await.expect("open");

        let err = client
            .request_with_timeout("slow", json!({}), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestTimeout { .. }));
        assert!(client.inner.pending.lock().is_empty());

        client.disconnect();
    }

    #[tokio::test]
    async fn test_request_while_disconnected() {
        let client = fast_client();
        let err = client.request("ping", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_open_while_connected_is_refused() {
        let url = spawn_server(echo_responder).await;
        let client = fast_client();
        client.open(&url).await.expect("open");

        let err = client.open(&url).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));

        client.disconnect();
    }

    #[tokio::test]
    async fn test_disconnect_twice_emits_once() {
        let url = spawn_server(|mut ws: ServerWs| async move {
            while ws.next().await.is_some() {}
        })
        .await;

        let client = fast_client();
        let mut disconnected = watch(&client, EventKind::Disconnected);

        client.open(&url).await.expect("open");
        client.disconnect();
        client.disconnect();

        timeout(Duration::from_secs(2), disconnected.recv())
            .await
            .expect("first emission")
            .expect("event");

        // No second emission.
        let second = timeout(Duration::from_millis(300), disconnected.recv()).await;
        assert!(second.is_err(), "disconnect emitted twice");
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_gives_up_after_bounded_attempts() {
        // Server accepts exactly one session, drops it, then refuses
        // further connections by closing the listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            drop(ws);
            drop(listener);
        });

        let client = fast_client();
        let mut disconnected = watch(&client, EventKind::Disconnected);

        client
            .open(&format!("ws://127.0.0.1:{port}"))
            .await
            .expect("open");

        timeout(Duration::from_secs(5), disconnected.recv())
            .await
            .expect("gave up")
            .expect("event");
        assert_eq!(client.state(), SessionState::GivenUp);
        assert_eq!(
            client.inner.reconnect_attempts.load(Ordering::SeqCst),
            client.config().max_reconnect_attempts + 1
        );

        // Exactly one final emission.
        let second = timeout(Duration::from_millis(300), disconnected.recv()).await;
        assert!(second.is_err(), "given-up emitted more than once");
    }

    #[tokio::test]
    async fn test_reconnect_replays_stored_token() {
        use std::sync::atomic::AtomicUsize;

        let sessions = Arc::new(AtomicUsize::new(0));
        let sessions_for_server = Arc::clone(&sessions);

        let url = spawn_server(move |mut ws: ServerWs| {
            let sessions = Arc::clone(&sessions_for_server);
            async move {
                let n = sessions.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    // First session: drop immediately to force a reconnect.
                    return;
                }
                // Second session: expect the replayed credential.
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    let frame: Value = serde_json::from_str(&text).expect("json");
                    assert_eq!(frame["eventType"], "auth");
                    assert_eq!(frame["data"]["token"], "stored-secret");
                    let reply = json!({
                        "type": "authenticated",
                        "user": { "username": "Steve", "role": "player" }
                    });
                    let _ = ws.send(Message::Text(reply.to_string().into())).await;
                }
                while ws.next().await.is_some() {}
            }
        })
        .await;

        let store = Arc::new(MemoryStore::new());
        store.set(
            &format!("{url}/"),
            &json!({"url": format!("{url}/"), "token": "stored-secret"}).to_string(),
        );

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .reconnect_delay(Duration::from_millis(20))
            .store(store)
            .build();
        let mut authenticated = watch(&client, EventKind::Authenticated);

        client.open(&url).await.expect("open");

        let event = timeout(Duration::from_secs(5), authenticated.recv())
            .await
            .expect("re-auth")
            .expect("event");
        match event {
            ClientEvent::Authenticated { user } => assert_eq!(user.username, "Steve"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(client.identity().is_some());
        assert_eq!(client.state(), SessionState::Connected);

        client.disconnect();
    }

    #[tokio::test]
    async fn test_catalog_push_replaces_registry() {
        let url = spawn_server(|mut ws: ServerWs| async move {
            let catalog = json!({
                "type": "apps_list",
                "apps": [
                    { "name": "claim", "path": ["land", "claim"], "permissions": ["player"] },
                    { "name": "spawn", "permissions": ["guest"] }
                ]
            });
            let _ = ws.send(Message::Text(catalog.to_string().into())).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let client = fast_client();
        let mut catalogs = watch(&client, EventKind::CommandCatalog);

        client.open(&url).await.expect("open");

        timeout(Duration::from_secs(2), catalogs.recv())
            .await
            .expect("catalog")
            .expect("event");

        assert!(client.resolve_command("land claim").is_some());
        assert!(client.resolve_command("spawn").is_some());
        assert_eq!(client.commands().len(), 2);

        client.disconnect();
    }

    #[tokio::test]
    async fn test_server_info_stores_game_address() {
        let url = spawn_server(|mut ws: ServerWs| async move {
            let info = json!({
                "type": "server_info",
                "name": "Test Server",
                "minecraftUrl": "mc.example.com:25565"
            });
            let _ = ws.send(Message::Text(info.to_string().into())).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let client = fast_client();
        let mut infos = watch(&client, EventKind::ServerInfo);

        client.open(&url).await.expect("open");
        timeout(Duration::from_secs(2), infos.recv())
            .await
            .expect("server info")
            .expect("event");

        let record = client.record(&format!("{url}/")).expect("record");
        assert_eq!(record.minecraft_url.as_deref(), Some("mc.example.com:25565"));

        client.disconnect();
    }

    #[tokio::test]
    async fn test_record_updated_on_connect() {
        let url = spawn_server(echo_responder).await;
        let client = fast_client();

        client.open(&url).await.expect("open");

        let record = client.record(&format!("{url}/")).expect("record");
        assert!(record.last_connected.is_some());

        client.disconnect();
    }
}
