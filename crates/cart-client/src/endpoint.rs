//! Cart API endpoints.

use std::time::Duration;

use http::Method;

/// The storefront endpoints the cart controller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /cart.js`
    Cart,
    /// `POST /cart/add.js`
    Add,
    /// `POST /cart/change.js`
    Change,
    /// `POST /cart/update.js`
    Update,
    /// `POST /discount/{code}`
    Discount,
    /// `GET /search/suggest.json`
    Suggest,
}

impl Endpoint {
    /// Path relative to the storefront root. `Discount` takes the code as
    /// an extra path segment.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Cart => "/cart.js",
            Self::Add => "/cart/add.js",
            Self::Change => "/cart/change.js",
            Self::Update => "/cart/update.js",
            Self::Discount => "/discount",
            Self::Suggest => "/search/suggest.json",
        }
    }

    /// HTTP method.
    pub fn method(&self) -> Method {
        match self {
            Self::Cart | Self::Suggest => Method::GET,
            Self::Add | Self::Change | Self::Update | Self::Discount => Method::POST,
        }
    }

    /// Whether the request changes cart state.
    pub fn is_mutation(&self) -> bool {
        self.method() == Method::POST
    }

    /// Default timeout for this endpoint.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Suggest => Duration::from_millis(3000),
            Self::Cart => Duration::from_millis(5000),
            Self::Add | Self::Change | Self::Update | Self::Discount => {
                Duration::from_millis(10_000)
            }
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Add => "add",
            Self::Change => "change",
            Self::Update => "update",
            Self::Discount => "discount",
            Self::Suggest => "suggest",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
