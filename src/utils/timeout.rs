//! Per-call timeouts for the broker's external collaborators
//!
//! Every outbound call (probe, create, configure, side registration, store)
//! carries an explicit deadline. An expired deadline is reported like any
//! other transport failure.

use std::future::Future;
use std::time::Duration;

/// Timeout configuration for the different outbound calls
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Read-only list call used to measure a credential's load (default: 10s)
    pub probe: Duration,

    /// Service creation call (default: 30s)
    pub create: Duration,

    /// Environment variable replacement call (default: 15s)
    pub configure: Duration,

    /// Uptime and log-link registration; long enough to ride out a
    /// cold-started dependency (default: 40s)
    pub side_registration: Duration,

    /// Configuration store reads and writes (default: 5s)
    pub store: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(10),
            create: Duration::from_secs(30),
            configure: Duration::from_secs(15),
            side_registration: Duration::from_secs(40),
            store: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(mut self, timeout: Duration) -> Self {
        self.probe = timeout;
        self
    }

    pub fn with_store(mut self, timeout: Duration) -> Self {
        self.store = timeout;
        self
    }

    /// Create config from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            probe: secs_from_env("PROBE_TIMEOUT_SECS").unwrap_or(defaults.probe),
            create: secs_from_env("CREATE_TIMEOUT_SECS").unwrap_or(defaults.create),
            configure: secs_from_env("CONFIGURE_TIMEOUT_SECS").unwrap_or(defaults.configure),
            side_registration: secs_from_env("SIDE_REGISTRATION_TIMEOUT_SECS")
                .unwrap_or(defaults.side_registration),
            store: secs_from_env("STORE_TIMEOUT_SECS").unwrap_or(defaults.store),
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Run a fallible future under a deadline
pub async fn with_timeout<T, E>(
    timeout: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, TimeoutError<E>> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(TimeoutError::Inner),
        Err(_) => Err(TimeoutError::Timeout(timeout)),
    }
}

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout(_))
    }
}
