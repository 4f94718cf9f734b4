//! Controller configuration.

use std::time::Duration;

use cart_core::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("undo_window_ms must be greater than zero")]
    ZeroUndoWindow,

    #[error("undo_capacity must be at least 1")]
    ZeroUndoCapacity,

    #[error("free_shipping_threshold cannot be negative (got {0})")]
    NegativeThreshold(i64),
}

/// Tunables for [`CartController`](crate::CartController).
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Currency used before the first snapshot arrives.
    pub currency: Currency,
    /// Free shipping threshold in minor units; 0 hides the progress bar.
    pub free_shipping_threshold: i64,
    /// How long a removed item can be restored.
    pub undo_window_ms: u64,
    /// How many removals can be undone at once.
    pub undo_capacity: usize,
    /// Quiet period before a typed note is saved.
    pub note_debounce_ms: u64,
    /// Quiet period before a search query is sent.
    pub search_debounce_ms: u64,
    /// Shortest query that triggers a suggestion request.
    pub search_min_query_len: usize,
    /// Suggestions requested per query.
    pub search_limit: u32,
    /// Operations allowed to wait behind the in-flight one on the same line.
    pub max_waiting_per_key: usize,
    /// Open the drawer after a successful add.
    pub open_drawer_on_add: bool,
    /// Retry policy for network failures.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.undo_window_ms == 0 {
            return Err(ConfigError::ZeroUndoWindow);
        }
        if self.undo_capacity == 0 {
            return Err(ConfigError::ZeroUndoCapacity);
        }
        if self.free_shipping_threshold < 0 {
            return Err(ConfigError::NegativeThreshold(self.free_shipping_threshold));
        }
        Ok(())
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    pub fn note_debounce(&self) -> Duration {
        Duration::from_millis(self.note_debounce_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            free_shipping_threshold: 5000,
            undo_window_ms: 5000,
            undo_capacity: 1,
            note_debounce_ms: 1000,
            search_debounce_ms: 300,
            search_min_query_len: 2,
            search_limit: 4,
            max_waiting_per_key: 1,
            open_drawer_on_add: true,
            retry: RetryPolicy::default(),
        }
    }
}
