//! Cart domain types shared by the cart synchronization crates.
//!
//! - **Snapshot**: the server-authoritative cart as returned by `/cart.js`
//! - **Money**: integer minor-unit amounts and the one display format
//! - **Shipping**: free shipping progress for the drawer
//! - **Search**: predictive search suggestion payloads
//! - **Error**: the error taxonomy every cart operation reports
//!
//! # Example
//!
//! ```rust
//! use cart_core::prelude::*;
//!
//! let cart: CartSnapshot = serde_json::from_str(
//!     r#"{"item_count": 1, "total_price": 2500, "items": [{
//!         "key": "42:ab", "variant_id": 42, "quantity": 1,
//!         "final_line_price": 2500, "product_title": "Linen Shirt"
//!     }]}"#,
//! ).unwrap();
//!
//! assert_eq!(cart.total().display(), "$25.00");
//! let progress = FreeShippingProgress::compute(cart.total(), 5000).unwrap();
//! assert_eq!(progress.percent, 50);
//! ```

pub mod error;
pub mod ids;
pub mod money;
pub mod search;
pub mod shipping;
pub mod snapshot;

pub use error::{CartError, ErrorPayload};
pub use ids::*;
pub use money::{Currency, Money};
pub use search::SearchSuggestions;
pub use shipping::FreeShippingProgress;
pub use snapshot::{CartSnapshot, LineItem};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{CartError, ErrorPayload, GENERIC_RETRY_MESSAGE};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::search::{
        CollectionSuggestion, ProductSuggestion, QuerySuggestion, SearchSuggestions,
    };
    pub use crate::shipping::FreeShippingProgress;
    pub use crate::snapshot::{CartSnapshot, LineItem};
}
