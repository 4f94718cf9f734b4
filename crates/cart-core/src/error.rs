//! Cart error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::VariantId;

/// Fallback notice text for failures the shopper can simply retry.
pub const GENERIC_RETRY_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error body returned by the cart endpoints on 4xx/5xx.
///
/// Shopify sends `{"status": 422, "message": "Cart Error", "description": "..."}`.
/// `status` is usually numeric but some endpoints send a string such as
/// `"bad_request"`, so it is kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ErrorPayload {
    /// Numeric status code carried in the payload, if any.
    pub fn status_code(&self) -> Option<u16> {
        match &self.status {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Text suitable for showing to the shopper, description first.
    pub fn display_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Errors surfaced by cart operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CartError {
    /// Transport failure, timeout or unexpected response. Safe to retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Bad input caught on the client; nothing was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The cart service rejected the request.
    #[error("Server error ({status}): {}", payload.display_text().unwrap_or("no details"))]
    Server { status: u16, payload: ErrorPayload },

    /// The requested variant cannot be added any more.
    #[error("Variant {variant_id} is sold out")]
    OutOfStock {
        variant_id: VariantId,
        payload: ErrorPayload,
    },

    /// Another operation already occupies this scope.
    #[error("Operation already in progress for {0}")]
    Busy(String),

    /// A newer request replaced this one before it finished.
    #[error("Request superseded by a newer one")]
    Superseded,
}

impl CartError {
    /// Build a server error from a status and a parsed payload.
    pub fn server(status: u16, payload: ErrorPayload) -> Self {
        CartError::Server { status, payload }
    }

    /// Whether the action queue may retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CartError::Network(_))
    }

    /// Whether the error should stay out of the notification area.
    pub fn is_silent(&self) -> bool {
        matches!(self, CartError::Busy(_) | CartError::Superseded)
    }

    /// Text for the transient error notice, `None` for silent errors.
    pub fn user_message(&self) -> Option<String> {
        match self {
            CartError::Network(_) => Some(GENERIC_RETRY_MESSAGE.to_string()),
            CartError::Validation(msg) => Some(msg.clone()),
            CartError::Server { payload, .. } => Some(
                payload
                    .display_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| GENERIC_RETRY_MESSAGE.to_string()),
            ),
            CartError::OutOfStock { payload, .. } => Some(
                payload
                    .display_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| "Sold out".to_string()),
            ),
            CartError::Busy(_) | CartError::Superseded => None,
        }
    }
}

impl From<serde_json::Error> for CartError {
    fn from(e: serde_json::Error) -> Self {
        CartError::Network(format!("invalid response body: {e}"))
    }
}
