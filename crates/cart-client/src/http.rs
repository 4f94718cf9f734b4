//! HTTP cart client.

use std::sync::Arc;

use async_trait::async_trait;
use cart_core::search::{SearchSuggestions, SuggestResponse};
use cart_core::{CartError, CartSnapshot, ErrorPayload, LineItem, LineItemKey, VariantId};
use reqwest::cookie::Jar;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{
    classify_add_rejection, validate_add_quantity, validate_change_quantity, AddRequest, CartApi,
    ChangeRequest, NoteRequest,
};
use crate::endpoint::Endpoint;
use crate::timeout::TimeoutConfig;

/// Connection settings for [`HttpCartClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Storefront root, e.g. `https://example.myshopify.com`.
    pub base_url: String,
    /// Request timeouts.
    pub timeouts: TimeoutConfig,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Resume an existing cart session instead of starting a new one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9292".to_string(),
            timeouts: TimeoutConfig::default(),
            user_agent: concat!("cart-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            cart_token: None,
        }
    }
}

/// Cart API client over HTTP.
///
/// Keeps a cookie jar so the cart session cookie set by the first
/// response is sent with every later request. A configured
/// `cart_token` seeds the jar.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    http: Client,
    base: Url,
    timeouts: TimeoutConfig,
}

impl HttpCartClient {
    /// Create a new client.
    pub fn new(config: &ClientConfig) -> Result<Self, CartError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            CartError::Validation(format!("Invalid store URL {}: {e}", config.base_url))
        })?;
        let jar = Jar::default();
        if let Some(token) = &config.cart_token {
            jar.add_cookie_str(&format!("cart={token}; Path=/"), &base);
        }
        let http = Client::builder()
            .cookie_provider(Arc::new(jar))
            .connect_timeout(config.timeouts.connect())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CartError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base,
            timeouts: config.timeouts,
        })
    }

    /// Storefront root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: Endpoint) -> Result<Url, CartError> {
        self.base
            .join(endpoint.path())
            .map_err(|e| CartError::Validation(format!("Invalid URL for {endpoint}: {e}")))
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        url: Url,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>), CartError> {
        let mut request = self
            .http
            .request(endpoint.method(), url)
            .timeout(self.timeouts.for_endpoint(endpoint))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(endpoint = %endpoint, "sending cart request");
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            bytes = bytes.len(),
            "cart response"
        );

        Ok((status, bytes.to_vec()))
    }
}

#[async_trait]
impl CartApi for HttpCartClient {
    async fn fetch_cart(&self) -> Result<CartSnapshot, CartError> {
        let url = self.url(Endpoint::Cart)?;
        let (status, body) = self.execute::<()>(Endpoint::Cart, url, None).await?;
        if !status.is_success() {
            return Err(CartError::Network(format!(
                "GET {} returned {status}",
                Endpoint::Cart.path()
            )));
        }
        let snapshot: CartSnapshot = decode(&body)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    async fn change_line_item(
        &self,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<CartSnapshot, CartError> {
        let quantity = validate_change_quantity(quantity)?;
        let url = self.url(Endpoint::Change)?;
        let body = ChangeRequest { id: key, quantity };
        let (status, body) = self.execute(Endpoint::Change, url, Some(&body)).await?;
        if !status.is_success() {
            return Err(CartError::server(status.as_u16(), parse_payload(&body)));
        }
        let snapshot: CartSnapshot = decode(&body)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    async fn add_line_item(
        &self,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<LineItem, CartError> {
        let quantity = validate_add_quantity(quantity)?;
        let url = self.url(Endpoint::Add)?;
        let body = AddRequest {
            id: variant_id,
            quantity,
        };
        let (status, body) = self.execute(Endpoint::Add, url, Some(&body)).await?;
        if !status.is_success() {
            return Err(classify_add_rejection(
                variant_id,
                status.as_u16(),
                parse_payload(&body),
            ));
        }
        decode(&body)
    }

    async fn update_note(&self, note: &str) -> Result<CartSnapshot, CartError> {
        let url = self.url(Endpoint::Update)?;
        let body = NoteRequest { note };
        let (status, body) = self.execute(Endpoint::Update, url, Some(&body)).await?;
        if !status.is_success() {
            return Err(CartError::server(status.as_u16(), parse_payload(&body)));
        }
        let snapshot: CartSnapshot = decode(&body)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    async fn apply_discount(&self, code: &str) -> Result<(), CartError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CartError::Validation("Enter a discount code".to_string()));
        }
        let mut url = self.url(Endpoint::Discount)?;
        url.path_segments_mut()
            .map_err(|_| CartError::Validation("Store URL cannot take a path".to_string()))?
            .push(code);
        let (status, body) = self.execute::<()>(Endpoint::Discount, url, None).await?;
        if !status.is_success() {
            return Err(CartError::server(status.as_u16(), parse_payload(&body)));
        }
        Ok(())
    }

    async fn suggest(&self, query: &str, limit: u32) -> Result<SearchSuggestions, CartError> {
        let mut url = self.url(Endpoint::Suggest)?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("resources[type]", "product,collection")
            .append_pair("resources[limit]", &limit.to_string());
        let (status, body) = self.execute::<()>(Endpoint::Suggest, url, None).await?;
        if !status.is_success() {
            return Err(CartError::server(status.as_u16(), parse_payload(&body)));
        }
        let response: SuggestResponse = decode(&body)?;
        Ok(response.resources.results)
    }
}

fn transport_error(e: reqwest::Error) -> CartError {
    if e.is_timeout() {
        CartError::Network(format!("request timed out: {e}"))
    } else {
        CartError::Network(e.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, CartError> {
    Ok(serde_json::from_slice(body)?)
}

fn parse_payload(body: &[u8]) -> ErrorPayload {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        warn!(error = %e, "unparseable cart error body");
        ErrorPayload::default()
    })
}
