//! Client event observation.
//!
//! Observers register per [`EventKind`] and receive [`ClientEvent`]
//! values synchronously, in registration order, from the client's
//! router task. The presentation layer consumes these to render
//! console lines; the core never renders anything itself.
//!
//! Callbacks run to completion before the next event is processed and
//! must not register or unregister observers from within a callback.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::protocol::{AuthUser, CommandDefinition, ServerEvent};

// ============================================================================
// ClientEvent
// ============================================================================

/// An event surfaced to registered observers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session opened (first connect or successful reconnect).
    Connected {
        /// Server URL.
        url: String,
    },

    /// The session ended. Emitted exactly once per open session, and
    /// once when the reconnection supervisor gives up.
    Disconnected,

    /// The transport reported an error.
    TransportError {
        /// Underlying error description.
        message: String,
    },

    /// Server identification and metadata.
    ServerInfo {
        /// Full message payload.
        payload: Value,
    },

    /// The command catalog was replaced.
    CommandCatalog {
        /// The new catalog, in ingestion order.
        commands: Vec<CommandDefinition>,
    },

    /// Console line to surface to the user.
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
    },

    /// Authentication rejected.
    AuthFailed {
        /// Server-supplied reason.
        message: String,
    },

    /// Message with an unrecognized `type` tag.
    Raw {
        /// The `type` tag, when present.
        event_type: Option<String>,
        /// Full message payload.
        payload: Value,
    },
}

impl ClientEvent {
    /// Returns the dispatch key for this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::TransportError { .. } => EventKind::TransportError,
            Self::ServerInfo { .. } => EventKind::ServerInfo,
            Self::CommandCatalog { .. } => EventKind::CommandCatalog,
            Self::Message { .. } => EventKind::Message,
            Self::ServerError { .. } => EventKind::ServerError,
            Self::CommandResponse { .. } => EventKind::CommandResponse,
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::AuthFailed { .. } => EventKind::AuthFailed,
            Self::Raw { .. } => EventKind::Raw,
        }
    }

    /// Converts a classified server message into its observer-facing
    /// form.
    pub(crate) fn from_server(event: ServerEvent) -> Self {
        match event {
            ServerEvent::ServerInfo { payload } => Self::ServerInfo { payload },
            ServerEvent::CommandCatalog { commands } => Self::CommandCatalog { commands },
            ServerEvent::Message { content } => Self::Message { content },
            ServerEvent::ServerError { message } => Self::ServerError { message },
            ServerEvent::CommandResponse { payload } => Self::CommandResponse { payload },
            ServerEvent::Authenticated { user, .. } => Self::Authenticated { user },
            ServerEvent::AuthFailed { message } => Self::AuthFailed { message },
            ServerEvent::Raw {
                event_type,
                payload,
            } => Self::Raw {
                event_type,
                payload,
            },
        }
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Observer registration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Session opened.
    Connected,
    /// Session ended.
    Disconnected,
    /// Transport error.
    TransportError,
    /// Server metadata.
    ServerInfo,
    /// Catalog replaced.
    CommandCatalog,
    /// Console line.
    Message,
    /// Server error notification.
    ServerError,
    /// Uncorrelated command output.
    CommandResponse,
    /// Authentication accepted.
    Authenticated,
    /// Authentication rejected.
    AuthFailed,
    /// Unrecognized message.
    Raw,
}

// ============================================================================
// ObserverId
// ============================================================================

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Observer callback type.
pub type Observer = Box<dyn Fn(&ClientEvent) + Send + Sync>;

// ============================================================================
// EventDispatcher
// ============================================================================

/// Observer registry with a single dispatch point per event.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    observers: Mutex<FxHashMap<EventKind, Vec<(ObserverId, Observer)>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for one event kind.
    pub(crate) fn register(&self, kind: EventKind, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, observer));
        id
    }

    /// Unregisters an observer. Returns `true` when one was removed.
    pub(crate) fn unregister(&self, kind: EventKind, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let Some(list) = observers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(oid, _)| *oid != id);
        list.len() != before
    }

    /// Dispatches one event to its kind's observers in registration
    /// order.
    pub(crate) fn dispatch(&self, event: &ClientEvent) {
        let observers = self.observers.lock();
        if let Some(list) = observers.get(&event.kind()) {
            for (_, observer) in list {
                observer(event);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_dispatch_reaches_matching_kind_only() {
        let dispatcher = EventDispatcher::new();
        let messages = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let m = Arc::clone(&messages);
        dispatcher.register(
            EventKind::Message,
            Box::new(move |_| {
                m.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let e = Arc::clone(&errors);
        dispatcher.register(
            EventKind::ServerError,
            Box::new(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(&ClientEvent::Message {
            content: "hi".into(),
        });

        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_preserves_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            dispatcher.register(
                EventKind::Disconnected,
                Box::new(move |_| order.lock().push(tag)),
            );
        }

        dispatcher.dispatch(&ClientEvent::Disconnected);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let id = dispatcher.register(
            EventKind::Message,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(&ClientEvent::Message {
            content: "one".into(),
        });
        assert!(dispatcher.unregister(EventKind::Message, id));
        dispatcher.dispatch(&ClientEvent::Message {
            content: "two".into(),
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.unregister(EventKind::Message, id));
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(ClientEvent::Disconnected.kind(), EventKind::Disconnected);
        assert_eq!(
            ClientEvent::Raw {
                event_type: None,
                payload: Value::Null
            }
            .kind(),
            EventKind::Raw
        );
    }
}
