//! Client configuration and builder.
//!
//! Defaults follow the service's protocol budgets: a 10 second
//! connection handshake wait, 30 second request timeout, and a bounded
//! reconnect policy of 3 attempts spaced 2 seconds apart.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::client::core::Client;
use crate::client::records::{MemoryStore, RecordStore};

// ============================================================================
// Constants
// ============================================================================

/// Default wait for the connection handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default bound on consecutive reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

// ============================================================================
// ClientConfig
// ============================================================================

/// Timing and reconnection policy for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on the connection handshake wait.
    pub connect_timeout: Duration,

    /// Default budget for a correlated request.
    pub request_timeout: Duration,

    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,

    /// Bound on consecutive reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Whether unexpected closes trigger automatic reconnection.
    pub auto_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            auto_reconnect: true,
        }
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use remote_console::Client;
///
/// # async fn example() -> remote_console::Result<()> {
/// let client = Client::builder()
///     .auto_reconnect(false)
///     .build();
/// client.open("ws://localhost:8765").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn RecordStore>>,
}

impl ClientBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection handshake wait.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the default per-request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the delay between reconnection attempts.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Sets the bound on consecutive reconnection attempts.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Enables or disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Sets the connection record store.
    ///
    /// Defaults to an in-memory store when not provided.
    #[inline]
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the client.
    ///
    /// Must be called within a Tokio runtime; the client spawns its
    /// event router task on creation.
    #[must_use]
    pub fn build(self) -> Client {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        Client::new(self.config, store)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert!(config.auto_reconnect);
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_millis(100))
            .request_timeout(Duration::from_millis(200))
            .reconnect_delay(Duration::from_millis(10))
            .max_reconnect_attempts(1)
            .auto_reconnect(false)
            .build();

        let config = client.config();
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.request_timeout, Duration::from_millis(200));
        assert_eq!(config.reconnect_delay, Duration::from_millis(10));
        assert_eq!(config.max_reconnect_attempts, 1);
        assert!(!config.auto_reconnect);
    }
}
