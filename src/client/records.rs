//! Connection records and their storage.
//!
//! One record is kept per server URL, carrying the stored credential
//! token and the last-known identity for that server. Records are
//! upserted on every successful connection or authentication and never
//! deleted automatically.
//!
//! Persistence is delegated to a [`RecordStore`] collaborator: a plain
//! key/value blob store keyed by server URL. The crate ships an
//! in-memory implementation; embedders provide durable ones.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// RecordStore
// ============================================================================

/// Key/value blob store for connection records.
///
/// Implementations only need get/set by server URL; the record format
/// is an opaque JSON blob to the store.
pub trait RecordStore: Send + Sync {
    /// Returns the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any prior blob.
    fn set(&self, key: &str, value: &str);
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory [`RecordStore`] for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}

// ============================================================================
// ConnectionRecord
// ============================================================================

/// Stored per-server connection state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Server URL this record belongs to.
    pub url: String,

    /// Game-facing address advertised by the server.
    #[serde(
        rename = "minecraftUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub minecraft_url: Option<String>,

    /// Stored credential token for transparent re-authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Last authenticated username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Whether the last authenticated identity was an operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<bool>,

    /// Unix seconds of the last successful connection.
    #[serde(
        rename = "lastConnected",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_connected: Option<u64>,
}

// ============================================================================
// ConnectionRecords
// ============================================================================

/// Record access layer over a [`RecordStore`].
pub(crate) struct ConnectionRecords {
    store: Arc<dyn RecordStore>,
}

impl ConnectionRecords {
    /// Creates the access layer over the given store.
    #[inline]
    pub(crate) fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Loads the record for `url`.
    ///
    /// A malformed blob is treated as absent with a logged side
    /// effect.
    pub(crate) fn load(&self, url: &str) -> Option<ConnectionRecord> {
        let blob = self.store.get(url)?;
        match serde_json::from_str(&blob) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(url, error = %e, "Discarding malformed connection record");
                None
            }
        }
    }

    /// Loads or creates the record for `url`, applies `mutate`, and
    /// persists the result.
    pub(crate) fn upsert(&self, url: &str, mutate: impl FnOnce(&mut ConnectionRecord)) {
        let mut record = self.load(url).unwrap_or_else(|| ConnectionRecord {
            url: url.to_string(),
            ..ConnectionRecord::default()
        });

        mutate(&mut record);

        match serde_json::to_string(&record) {
            Ok(blob) => self.store.set(url, &blob),
            Err(e) => warn!(url, error = %e, "Failed to serialize connection record"),
        }
    }
}

/// Current wall-clock time as unix seconds.
#[inline]
#[must_use]
pub(crate) fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> (ConnectionRecords, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ConnectionRecords::new(Arc::clone(&store) as _), store)
    }

    #[test]
    fn test_upsert_creates_record() {
        let (records, _store) = records();

        records.upsert("ws://a", |r| {
            r.token = Some("secret".into());
            r.last_connected = Some(1000);
        });

        let loaded = records.load("ws://a").expect("record");
        assert_eq!(loaded.url, "ws://a");
        assert_eq!(loaded.token.as_deref(), Some("secret"));
        assert_eq!(loaded.last_connected, Some(1000));
    }

    #[test]
    fn test_upsert_preserves_existing_fields() {
        let (records, _store) = records();

        records.upsert("ws://a", |r| r.token = Some("secret".into()));
        records.upsert("ws://a", |r| r.username = Some("Steve".into()));

        let loaded = records.load("ws://a").expect("record");
        assert_eq!(loaded.token.as_deref(), Some("secret"));
        assert_eq!(loaded.username.as_deref(), Some("Steve"));
    }

    #[test]
    fn test_records_are_keyed_by_url() {
        let (records, _store) = records();

        records.upsert("ws://a", |r| r.token = Some("a-token".into()));
        records.upsert("ws://b", |r| r.token = Some("b-token".into()));

        assert_eq!(
            records.load("ws://a").expect("a").token.as_deref(),
            Some("a-token")
        );
        assert_eq!(
            records.load("ws://b").expect("b").token.as_deref(),
            Some("b-token")
        );
    }

    #[test]
    fn test_malformed_blob_is_absent() {
        let (records, store) = records();
        store.set("ws://a", "{broken");
        assert!(records.load("ws://a").is_none());
    }

    #[test]
    fn test_record_serde_field_names() {
        let record = ConnectionRecord {
            url: "ws://a".into(),
            minecraft_url: Some("mc.example.com".into()),
            last_connected: Some(5),
            ..ConnectionRecord::default()
        };
        let json = serde_json::to_string(&record).expect("serialize");

        assert!(json.contains("minecraftUrl"));
        assert!(json.contains("lastConnected"));
        assert!(!json.contains("token"));
    }
}
