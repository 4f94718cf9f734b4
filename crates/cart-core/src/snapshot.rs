//! Cart snapshot and line item types.
//!
//! Field names mirror the `/cart.js` payload so a snapshot deserializes
//! straight from the cart API. Unknown fields are ignored.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CartError, ErrorPayload};
use crate::ids::{CartToken, LineItemKey, VariantId};
use crate::money::{Currency, Money};

/// Server-authoritative cart state.
///
/// Never mutated after it is received; every fetch or mutation response
/// produces a new snapshot that replaces the previous one wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CartSnapshot {
    /// Cart token.
    #[serde(default)]
    pub token: Option<CartToken>,
    /// Customer note.
    #[serde(default)]
    pub note: Option<String>,
    /// Sum of line quantities as reported by the server.
    pub item_count: u32,
    /// Total after discounts, in minor units.
    pub total_price: i64,
    /// Total discount, in minor units.
    #[serde(default)]
    pub total_discount: i64,
    /// Subtotal before cart-level discounts, in minor units.
    #[serde(default)]
    pub items_subtotal_price: i64,
    /// Cart currency.
    #[serde(default, deserialize_with = "currency_or_default")]
    pub currency: Currency,
    /// Line items in server order.
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl CartSnapshot {
    /// An empty cart in the given currency.
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            ..Self::default()
        }
    }

    /// Check the snapshot invariants: line item keys are unique.
    pub fn validate(&self) -> Result<(), CartError> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if !seen.insert(&item.key) {
                return Err(CartError::server(
                    500,
                    ErrorPayload {
                        status: serde_json::Value::from(500),
                        message: Some("Invalid cart".to_string()),
                        description: Some(format!("duplicate line item key {}", item.key)),
                    },
                ));
            }
        }
        Ok(())
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Get an item by key.
    pub fn item(&self, key: &LineItemKey) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.key == key)
    }

    /// Get the first item for a variant.
    pub fn item_by_variant(&self, variant_id: VariantId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.variant_id == variant_id)
    }

    /// Quantity of the given line, if present.
    pub fn quantity_of(&self, key: &LineItemKey) -> Option<u32> {
        self.item(key).map(|i| i.quantity)
    }

    /// Position of a line in server order.
    pub fn position(&self, key: &LineItemKey) -> Option<usize> {
        self.items.iter().position(|i| &i.key == key)
    }

    /// Line keys in server order.
    pub fn keys(&self) -> impl Iterator<Item = &LineItemKey> {
        self.items.iter().map(|i| &i.key)
    }

    /// Cart total as money.
    pub fn total(&self) -> Money {
        Money::new(self.total_price, self.currency)
    }

    /// Cart discount as money.
    pub fn discount(&self) -> Money {
        Money::new(self.total_discount, self.currency)
    }
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Server-assigned key.
    pub key: LineItemKey,
    /// Variant being purchased.
    pub variant_id: VariantId,
    /// Quantity; 0 only while a removal is in flight.
    pub quantity: u32,
    /// Unit price after discounts, in minor units.
    #[serde(default)]
    pub final_price: i64,
    /// Line price after discounts, in minor units.
    pub final_line_price: i64,
    /// Product title.
    pub product_title: String,
    /// Variant title (e.g., "Large / Blue").
    #[serde(default)]
    pub variant_title: Option<String>,
    /// Image URL.
    #[serde(default, rename = "image")]
    pub image_url: Option<String>,
}

impl LineItem {
    /// Line price as money.
    pub fn line_price(&self, currency: Currency) -> Money {
        Money::new(self.final_line_price, currency)
    }
}

fn currency_or_default<'de, D>(deserializer: D) -> Result<Currency, D::Error>
where
    D: Deserializer<'de>,
{
    let code = Option::<String>::deserialize(deserializer)?;
    Ok(code
        .as_deref()
        .and_then(Currency::from_code)
        .unwrap_or_default())
}
