//! Timeout configuration for cart requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

/// Timeouts applied by [`HttpCartClient`](crate::HttpCartClient).
///
/// Stored as milliseconds so the config file stays plain numbers.
/// A zero read/mutation value means "use the endpoint default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect_ms: u64,
    /// Total timeout for reads (`/cart.js`, suggestions).
    pub read_ms: u64,
    /// Total timeout for mutations.
    pub mutation_ms: u64,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, read: Duration, mutation: Duration) -> Self {
        Self {
            connect_ms: connect.as_millis() as u64,
            read_ms: read.as_millis() as u64,
            mutation_ms: mutation.as_millis() as u64,
        }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect_ms: total.as_millis() as u64 / 4,
            read_ms: total.as_millis() as u64,
            mutation_ms: total.as_millis() as u64,
        }
    }

    /// Connection timeout.
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// Total timeout for one request to `endpoint`.
    pub fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        let configured = if endpoint.is_mutation() {
            self.mutation_ms
        } else {
            self.read_ms
        };
        if configured == 0 {
            endpoint.default_timeout()
        } else {
            Duration::from_millis(configured)
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2000,
            read_ms: 0,
            mutation_ms: 0,
        }
    }
}
