//! Type-safe identifiers for the client runtime.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile
//! time.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`MessageId`] | Correlates one outbound request with its single response |
//! | [`Epoch`] | Tags one connection attempt's lifetime |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================================================
// MessageId
// ============================================================================

/// Process-wide counter feeding [`MessageId::generate`].
static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque correlation id linking one outbound request to its response.
///
/// Generated ids combine a monotonically increasing counter with a
/// wall-clock millisecond sample, so they are unique for the lifetime
/// of the process. Collisions would require generating the same
/// counter value at the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a fresh correlation id.
    #[must_use]
    pub fn generate() -> Self {
        let seq = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(format!("{millis:x}-{seq:x}"))
    }

    /// Wraps an id received from the wire.
    #[inline]
    #[must_use]
    pub fn from_wire(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Epoch
// ============================================================================

/// Monotonically increasing tag identifying one connection attempt.
///
/// Pending requests are stamped with the epoch of the connection that
/// sent them; a response arriving on a different epoch is refused, so
/// continuations captured before a reconnect can never resolve against
/// the wrong connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);

impl Epoch {
    /// Creates an epoch from a raw counter value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_id_roundtrip() {
        let id = MessageId::from_wire("abc-1");
        assert_eq!(id.as_str(), "abc-1");
        assert_eq!(id.to_string(), "abc-1");
    }

    #[test]
    fn test_message_id_serde_transparent() {
        let id = MessageId::from_wire("ff-2a");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"ff-2a\"");

        let back: MessageId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_epoch_ordering() {
        assert!(Epoch::new(1) < Epoch::new(2));
        assert_eq!(Epoch::new(3).value(), 3);
    }
}
