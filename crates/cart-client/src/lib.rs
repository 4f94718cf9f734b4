//! Shopify Cart API client.
//!
//! This crate provides:
//! - `CartApi` - The cart service boundary (fetch, change, add, note, discount, suggest)
//! - `HttpCartClient` - `reqwest` implementation with a cookie-backed cart session
//! - `Endpoint` - The storefront endpoints and their defaults
//! - `TimeoutConfig` - Per-endpoint timeouts
//! - `MemoryCartServer` - In-process store (feature `memory`)

mod api;
mod endpoint;
mod http;
#[cfg(feature = "memory")]
mod memory;
mod timeout;

pub use api::*;
pub use endpoint::*;
pub use self::http::*;
#[cfg(feature = "memory")]
pub use memory::*;
pub use timeout::*;
