//! Retry policies for queued cart operations.

use std::time::Duration;

use cart_core::CartError;
use serde::{Deserialize, Serialize};

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed { delay_ms: u64 },
    /// Exponential backoff with base and max.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Self::Exponential { base_ms, max_ms } => {
                let multiplier = 2u64.saturating_pow(attempt);
                Duration::from_millis(base_ms.saturating_mul(multiplier).min(*max_ms))
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base_ms: 250,
            max_ms: 2000,
        }
    }
}

/// Conditions that trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Transport failures and timeouts.
    Network,
    /// Any 5xx from the cart service.
    ServerError,
}

impl RetryCondition {
    /// Check if an error matches this condition.
    pub fn matches(&self, error: &CartError) -> bool {
        match (self, error) {
            (Self::Network, CartError::Network(_)) => true,
            (Self::ServerError, CartError::Server { status, .. }) => (500..600).contains(status),
            _ => false,
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Conditions that trigger retry.
    pub retry_on: Vec<RetryCondition>,
}

impl RetryPolicy {
    /// Create a new retry policy that retries network failures.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
            retry_on: vec![RetryCondition::Network],
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::None,
            retry_on: Vec::new(),
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Set retry conditions.
    pub fn with_conditions(mut self, conditions: Vec<RetryCondition>) -> Self {
        self.retry_on = conditions;
        self
    }

    /// Check if a failed attempt (0-indexed) should be retried.
    pub fn should_retry(&self, error: &CartError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        self.retry_on.iter().any(|c| c.matches(error))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::ErrorPayload;

    #[test]
    fn test_exponential_backoff_caps() {
        let b = BackoffStrategy::Exponential {
            base_ms: 100,
            max_ms: 500,
        };
        assert_eq!(b.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(b.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(b.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(b.delay_for_attempt(60), Duration::from_millis(500));
    }

    #[test]
    fn test_default_retries_network_once() {
        let policy = RetryPolicy::default();
        let network = CartError::Network("reset".into());
        assert!(policy.should_retry(&network, 0));
        assert!(!policy.should_retry(&network, 1));
    }

    #[test]
    fn test_client_errors_never_retried() {
        let policy = RetryPolicy::new(3).with_conditions(vec![
            RetryCondition::Network,
            RetryCondition::ServerError,
        ]);
        assert!(!policy.should_retry(&CartError::server(422, ErrorPayload::default()), 0));
        assert!(policy.should_retry(&CartError::server(503, ErrorPayload::default()), 0));
        assert!(!policy.should_retry(&CartError::Validation("x".into()), 0));
    }

    #[test]
    fn test_none_policy() {
        assert!(!RetryPolicy::none().should_retry(&CartError::Network("x".into()), 0));
    }

    #[test]
    fn test_backoff_config_shape() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{"max_attempts": 2, "backoff": {"kind": "fixed", "delay_ms": 50}}"#,
        )
        .unwrap();
        assert_eq!(policy.backoff.delay_for_attempt(5), Duration::from_millis(50));
        assert_eq!(policy.retry_on, vec![RetryCondition::Network]);
    }
}
