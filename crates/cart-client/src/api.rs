//! The cart service boundary.

use async_trait::async_trait;
use cart_core::search::SearchSuggestions;
use cart_core::{CartError, CartSnapshot, ErrorPayload, LineItem, LineItemKey, VariantId};
use serde::Serialize;

/// Status the cart API uses when a variant cannot be added (sold out or
/// over the available inventory).
pub const SOLD_OUT_STATUS: u16 = 422;

/// Remote cart operations.
///
/// Every method resolves exactly once and never retries; retry policy is the
/// caller's concern.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /cart.js`.
    async fn fetch_cart(&self) -> Result<CartSnapshot, CartError>;

    /// `POST /cart/change.js`. A quantity of 0 removes the line.
    async fn change_line_item(
        &self,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<CartSnapshot, CartError>;

    /// `POST /cart/add.js`.
    async fn add_line_item(&self, variant_id: VariantId, quantity: i64)
        -> Result<LineItem, CartError>;

    /// `POST /cart/update.js` with a new note.
    async fn update_note(&self, note: &str) -> Result<CartSnapshot, CartError>;

    /// `POST /discount/{code}`. The cart must be re-fetched afterwards.
    async fn apply_discount(&self, code: &str) -> Result<(), CartError>;

    /// `GET /search/suggest.json`.
    async fn suggest(&self, query: &str, limit: u32) -> Result<SearchSuggestions, CartError>;
}

/// Body of `/cart/change.js`.
#[derive(Debug, Serialize)]
pub struct ChangeRequest<'a> {
    pub id: &'a LineItemKey,
    pub quantity: u32,
}

/// Body of `/cart/add.js`.
#[derive(Debug, Serialize)]
pub struct AddRequest {
    pub id: VariantId,
    pub quantity: u32,
}

/// Body of `/cart/update.js`.
#[derive(Debug, Serialize)]
pub struct NoteRequest<'a> {
    pub note: &'a str,
}

/// Check a `/cart/change.js` quantity before anything is sent.
pub fn validate_change_quantity(quantity: i64) -> Result<u32, CartError> {
    if quantity < 0 {
        return Err(CartError::Validation(format!(
            "Quantity cannot be negative (got {quantity})"
        )));
    }
    u32::try_from(quantity)
        .map_err(|_| CartError::Validation(format!("Quantity {quantity} is too large")))
}

/// Check a `/cart/add.js` quantity before anything is sent.
pub fn validate_add_quantity(quantity: i64) -> Result<u32, CartError> {
    if quantity < 1 {
        return Err(CartError::Validation(format!(
            "Quantity must be at least 1 (got {quantity})"
        )));
    }
    validate_change_quantity(quantity)
}

/// Map a rejected `/cart/add.js` response to the error taxonomy.
pub fn classify_add_rejection(
    variant_id: VariantId,
    http_status: u16,
    payload: ErrorPayload,
) -> CartError {
    let status = payload.status_code().unwrap_or(http_status);
    if status == SOLD_OUT_STATUS {
        CartError::OutOfStock {
            variant_id,
            payload,
        }
    } else {
        CartError::server(http_status, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_quantity_validation() {
        assert_eq!(validate_change_quantity(0).unwrap(), 0);
        assert_eq!(validate_change_quantity(3).unwrap(), 3);
        assert!(matches!(
            validate_change_quantity(-1),
            Err(CartError::Validation(_))
        ));
        assert!(validate_change_quantity(i64::MAX).is_err());
    }

    #[test]
    fn test_add_quantity_validation() {
        assert!(validate_add_quantity(0).is_err());
        assert_eq!(validate_add_quantity(2).unwrap(), 2);
    }

    #[test]
    fn test_sold_out_uses_payload_status() {
        let payload: ErrorPayload = serde_json::from_str(
            r#"{"status":422,"message":"Cart Error","description":"The product 'Tote' is already sold out."}"#,
        )
        .unwrap();
        let err = classify_add_rejection(VariantId::new(7), 422, payload);
        assert!(matches!(err, CartError::OutOfStock { .. }));
    }

    #[test]
    fn test_other_rejections_are_server_errors() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"status":404,"description":"Cannot find variant"}"#).unwrap();
        let err = classify_add_rejection(VariantId::new(7), 404, payload);
        assert!(matches!(err, CartError::Server { status: 404, .. }));
    }

    #[test]
    fn test_change_body_shape() {
        let key = LineItemKey::new("7:ab");
        let body = serde_json::to_value(ChangeRequest {
            id: &key,
            quantity: 2,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"id": "7:ab", "quantity": 2}));
    }
}
