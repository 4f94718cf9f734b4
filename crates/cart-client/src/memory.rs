//! In-process cart store.
//!
//! Behaves like the storefront cart endpoints closely enough to drive the
//! controller without a network: it keeps line items in insertion order,
//! enforces inventory, applies percentage discount codes and answers
//! suggestion queries from its catalog. Latency and failures can be injected
//! per request.
//!
//! A request is applied as soon as it arrives and its response is computed
//! then; the configured latency delays delivery of that response. A slow
//! response can therefore carry an older cart than a faster later one,
//! which is exactly the race the controller has to survive.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use cart_core::search::{ProductSuggestion, QuerySuggestion, SearchSuggestions};
use cart_core::{
    CartError, CartSnapshot, CartToken, Currency, ErrorPayload, LineItem, LineItemKey, VariantId,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::api::{
    classify_add_rejection, validate_add_quantity, validate_change_quantity, CartApi,
};
use crate::endpoint::Endpoint;

/// A variant the store can sell.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_title: Option<String>,
    /// Unit price in minor units.
    pub price: i64,
    /// Units available; `None` means inventory is not tracked.
    pub inventory: Option<u32>,
    pub image_url: Option<String>,
    /// Key given to the line for this variant.
    pub key: LineItemKey,
}

impl CatalogEntry {
    /// Create an untracked catalog entry whose line key is derived from
    /// the variant id.
    pub fn new(variant_id: u64, product_title: impl Into<String>, price: i64) -> Self {
        Self {
            variant_id: VariantId::new(variant_id),
            product_title: product_title.into(),
            variant_title: None,
            price,
            inventory: None,
            image_url: None,
            key: LineItemKey::new(format!("{variant_id}:{:08x}", key_hash(variant_id))),
        }
    }

    /// Use an explicit line key.
    pub fn with_key(mut self, key: impl Into<LineItemKey>) -> Self {
        self.key = key.into();
        self
    }

    /// Track inventory.
    pub fn with_inventory(mut self, units: u32) -> Self {
        self.inventory = Some(units);
        self
    }

    /// Set the variant title.
    pub fn with_variant_title(mut self, title: impl Into<String>) -> Self {
        self.variant_title = Some(title.into());
        self
    }
}

/// A failure to return instead of the next response.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Transport failure; nothing is applied.
    Network,
    /// HTTP error with a payload; nothing is applied.
    Status(u16, ErrorPayload),
}

/// One request received by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    /// Line key, variant id, note, code or query, depending on the endpoint.
    pub target: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone)]
struct Line {
    key: LineItemKey,
    variant_id: VariantId,
    quantity: u32,
}

#[derive(Debug, Default)]
struct State {
    currency: Currency,
    catalog: BTreeMap<VariantId, CatalogEntry>,
    lines: Vec<Line>,
    note: Option<String>,
    discount_codes: HashMap<String, u8>,
    applied_discount: Option<u8>,
    faults: VecDeque<(Option<Endpoint>, Fault)>,
    latencies: VecDeque<Duration>,
    default_latency: Duration,
    log: Vec<RecordedRequest>,
}

/// In-memory implementation of [`CartApi`].
#[derive(Debug, Default)]
pub struct MemoryCartServer {
    state: Mutex<State>,
}

impl MemoryCartServer {
    /// Create an empty store.
    pub fn new(currency: Currency) -> Self {
        Self {
            state: Mutex::new(State {
                currency,
                ..State::default()
            }),
        }
    }

    /// Add a catalog entry.
    pub fn with_product(self, entry: CatalogEntry) -> Self {
        self.state.lock().catalog.insert(entry.variant_id, entry);
        self
    }

    /// Seed a cart line. Unknown variants are ignored.
    pub fn with_line(self, variant_id: u64, quantity: u32) -> Self {
        {
            let mut state = self.state.lock();
            let variant_id = VariantId::new(variant_id);
            if let Some(entry) = state.catalog.get(&variant_id) {
                let key = entry.key.clone();
                state.lines.push(Line {
                    key,
                    variant_id,
                    quantity,
                });
            }
        }
        self
    }

    /// Register a percentage discount code.
    pub fn with_discount_code(self, code: impl Into<String>, percent: u8) -> Self {
        self.state
            .lock()
            .discount_codes
            .insert(code.into().to_uppercase(), percent.min(100));
        self
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().default_latency = latency;
    }

    /// Delay the next response by `latency`, overriding the default once.
    pub fn push_latency(&self, latency: Duration) {
        self.state.lock().latencies.push_back(latency);
    }

    /// Fail the next request.
    pub fn inject_fault(&self, fault: Fault) {
        self.state.lock().faults.push_back((None, fault));
    }

    /// Fail the next request to `endpoint`; other endpoints pass it by.
    pub fn inject_fault_on(&self, endpoint: Endpoint, fault: Fault) {
        self.state.lock().faults.push_back((Some(endpoint), fault));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().log.clone()
    }

    /// Number of requests received for one endpoint.
    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    /// Current cart, without recording a request.
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.lock().snapshot()
    }

    /// Record the request and decide how long its response takes and
    /// whether it fails.
    fn admit(
        &self,
        endpoint: Endpoint,
        target: Option<String>,
        quantity: Option<u32>,
    ) -> (Duration, Option<Fault>) {
        let mut state = self.state.lock();
        debug!(endpoint = %endpoint, target = ?target, quantity = ?quantity, "memory cart request");
        state.log.push(RecordedRequest {
            endpoint,
            target,
            quantity,
        });
        let latency = state
            .latencies
            .pop_front()
            .unwrap_or(state.default_latency);
        let fault = state
            .faults
            .iter()
            .position(|(target, _)| target.map_or(true, |target| target == endpoint))
            .and_then(|index| state.faults.remove(index))
            .map(|(_, fault)| fault);
        (latency, fault)
    }

    async fn respond<T>(latency: Duration, result: Result<T, CartError>) -> Result<T, CartError> {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

fn fault_error(fault: Fault) -> CartError {
    match fault {
        Fault::Network => CartError::Network("connection reset".to_string()),
        Fault::Status(status, payload) => CartError::server(status, payload),
    }
}

fn cart_error(status: u16, description: impl Into<String>) -> ErrorPayload {
    ErrorPayload {
        status: serde_json::Value::from(status),
        message: Some("Cart Error".to_string()),
        description: Some(description.into()),
    }
}

impl State {
    fn snapshot(&self) -> CartSnapshot {
        let items: Vec<LineItem> = self
            .lines
            .iter()
            .filter_map(|line| {
                let entry = self.catalog.get(&line.variant_id)?;
                Some(LineItem {
                    key: line.key.clone(),
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    final_price: entry.price,
                    final_line_price: entry.price * i64::from(line.quantity),
                    product_title: entry.product_title.clone(),
                    variant_title: entry.variant_title.clone(),
                    image_url: entry.image_url.clone(),
                })
            })
            .collect();

        let subtotal: i64 = items.iter().map(|i| i.final_line_price).sum();
        let discount = self
            .applied_discount
            .map(|pct| subtotal * i64::from(pct) / 100)
            .unwrap_or(0);

        CartSnapshot {
            token: Some(CartToken::new("memory")),
            note: self.note.clone(),
            item_count: items.iter().map(|i| i.quantity).sum(),
            total_price: subtotal - discount,
            total_discount: discount,
            items_subtotal_price: subtotal,
            currency: self.currency,
            items,
        }
    }

    fn change(&mut self, key: &LineItemKey, quantity: u32) -> Result<CartSnapshot, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| &l.key == key)
            .ok_or_else(|| {
                CartError::server(
                    400,
                    cart_error(400, "no valid id or line parameter"),
                )
            })?;

        if quantity == 0 {
            self.lines.remove(index);
            return Ok(self.snapshot());
        }

        let variant_id = self.lines[index].variant_id;
        if let Some(entry) = self.catalog.get(&variant_id) {
            if let Some(available) = entry.inventory {
                if quantity > available {
                    return Err(CartError::server(
                        422,
                        cart_error(
                            422,
                            format!(
                                "You can only add {available} of {} to the cart.",
                                entry.product_title
                            ),
                        ),
                    ));
                }
            }
        }
        self.lines[index].quantity = quantity;
        Ok(self.snapshot())
    }

    fn add(&mut self, variant_id: VariantId, quantity: u32) -> Result<LineItem, CartError> {
        let entry = self.catalog.get(&variant_id).cloned().ok_or_else(|| {
            CartError::server(404, cart_error(404, "Cannot find variant"))
        })?;

        let in_cart = self
            .lines
            .iter()
            .find(|l| l.variant_id == variant_id)
            .map(|l| l.quantity)
            .unwrap_or(0);

        if let Some(available) = entry.inventory {
            let left = available.saturating_sub(in_cart);
            if quantity > left {
                let description = if left == 0 {
                    format!("The product '{}' is already sold out.", entry.product_title)
                } else {
                    format!(
                        "You can only add {left} of {} to the cart.",
                        entry.product_title
                    )
                };
                return Err(classify_add_rejection(
                    variant_id,
                    422,
                    cart_error(422, description),
                ));
            }
        }

        match self.lines.iter_mut().find(|l| l.variant_id == variant_id) {
            Some(line) => line.quantity += quantity,
            None => self.lines.push(Line {
                key: entry.key.clone(),
                variant_id,
                quantity,
            }),
        }

        let snapshot = self.snapshot();
        snapshot
            .items
            .into_iter()
            .find(|i| i.variant_id == variant_id)
            .ok_or_else(|| CartError::Network("line vanished after add".to_string()))
    }
}

#[async_trait]
impl CartApi for MemoryCartServer {
    async fn fetch_cart(&self) -> Result<CartSnapshot, CartError> {
        let (latency, fault) = self.admit(Endpoint::Cart, None, None);
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => Ok(self.state.lock().snapshot()),
        };
        Self::respond(latency, result).await
    }

    async fn change_line_item(
        &self,
        key: &LineItemKey,
        quantity: i64,
    ) -> Result<CartSnapshot, CartError> {
        let quantity = validate_change_quantity(quantity)?;
        let (latency, fault) =
            self.admit(Endpoint::Change, Some(key.to_string()), Some(quantity));
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => self.state.lock().change(key, quantity),
        };
        Self::respond(latency, result).await
    }

    async fn add_line_item(
        &self,
        variant_id: VariantId,
        quantity: i64,
    ) -> Result<LineItem, CartError> {
        let quantity = validate_add_quantity(quantity)?;
        let (latency, fault) =
            self.admit(Endpoint::Add, Some(variant_id.to_string()), Some(quantity));
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => self.state.lock().add(variant_id, quantity),
        };
        Self::respond(latency, result).await
    }

    async fn update_note(&self, note: &str) -> Result<CartSnapshot, CartError> {
        let (latency, fault) = self.admit(Endpoint::Update, Some(note.to_string()), None);
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => {
                let mut state = self.state.lock();
                state.note = (!note.is_empty()).then(|| note.to_string());
                Ok(state.snapshot())
            }
        };
        Self::respond(latency, result).await
    }

    async fn apply_discount(&self, code: &str) -> Result<(), CartError> {
        let (latency, fault) = self.admit(Endpoint::Discount, Some(code.to_string()), None);
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => {
                let mut state = self.state.lock();
                match state.discount_codes.get(&code.trim().to_uppercase()).copied() {
                    Some(pct) => {
                        state.applied_discount = Some(pct);
                        Ok(())
                    }
                    None => Err(CartError::server(
                        404,
                        cart_error(404, "Invalid discount code"),
                    )),
                }
            }
        };
        Self::respond(latency, result).await
    }

    async fn suggest(&self, query: &str, limit: u32) -> Result<SearchSuggestions, CartError> {
        let (latency, fault) = self.admit(Endpoint::Suggest, Some(query.to_string()), None);
        let result = match fault {
            Some(fault) => Err(fault_error(fault)),
            None => {
                let state = self.state.lock();
                let needle = query.to_lowercase();
                let products: Vec<ProductSuggestion> = state
                    .catalog
                    .values()
                    .filter(|e| e.product_title.to_lowercase().contains(&needle))
                    .take(limit as usize)
                    .map(|e| {
                        let handle = e.product_title.to_lowercase().replace(' ', "-");
                        ProductSuggestion {
                            id: e.variant_id.get(),
                            title: e.product_title.clone(),
                            url: format!("/products/{handle}"),
                            handle,
                            vendor: None,
                            price: Some(cart_core::Money::new(e.price, state.currency).display_amount()),
                            available: e.inventory.map_or(true, |n| n > 0),
                            image: e.image_url.clone(),
                        }
                    })
                    .collect();
                Ok(SearchSuggestions {
                    products,
                    collections: Vec::new(),
                    queries: vec![QuerySuggestion {
                        text: query.to_string(),
                        styled_text: None,
                        url: format!("/search?q={query}"),
                    }],
                })
            }
        };
        Self::respond(latency, result).await
    }
}

fn key_hash(variant_id: u64) -> u32 {
    variant_id
        .to_string()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryCartServer {
        MemoryCartServer::new(Currency::USD)
            .with_product(CatalogEntry::new(1, "Linen Shirt", 2500).with_key("A"))
            .with_product(CatalogEntry::new(2, "Canvas Tote", 3500).with_inventory(1))
            .with_discount_code("SUMMER10", 10)
    }

    #[tokio::test]
    async fn test_add_then_change() {
        let server = store();
        let line = server.add_line_item(VariantId::new(1), 2).await.unwrap();
        assert_eq!(line.key.as_str(), "A");
        assert_eq!(line.final_line_price, 5000);

        let cart = server.change_line_item(&line.key, 3).await.unwrap();
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.total_price, 7500);

        let cart = server.change_line_item(&line.key, 0).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_adding_same_variant_merges() {
        let server = store();
        server.add_line_item(VariantId::new(1), 1).await.unwrap();
        let line = server.add_line_item(VariantId::new(1), 2).await.unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(server.snapshot().items.len(), 1);
    }

    #[tokio::test]
    async fn test_sold_out() {
        let server = store();
        server.add_line_item(VariantId::new(2), 1).await.unwrap();
        let err = server.add_line_item(VariantId::new(2), 1).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { .. }));
    }

    #[tokio::test]
    async fn test_change_unknown_key() {
        let server = store();
        let err = server
            .change_line_item(&LineItemKey::new("nope"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Server { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_discount_code() {
        let server = store().with_line(1, 2);
        server.apply_discount("summer10").await.unwrap();
        let cart = server.fetch_cart().await.unwrap();
        assert_eq!(cart.items_subtotal_price, 5000);
        assert_eq!(cart.total_discount, 500);
        assert_eq!(cart.total_price, 4500);

        assert!(server.apply_discount("BOGUS").await.is_err());
    }

    #[tokio::test]
    async fn test_fault_is_not_applied() {
        let server = store().with_line(1, 1);
        server.inject_fault(Fault::Network);
        let err = server
            .change_line_item(&LineItemKey::new("A"), 5)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(server.snapshot().item_count, 1);
        assert_eq!(server.request_count(Endpoint::Change), 1);
    }

    #[tokio::test]
    async fn test_targeted_fault_waits_for_its_endpoint() {
        let server = store().with_line(1, 1);
        server.inject_fault_on(Endpoint::Cart, Fault::Network);
        server.apply_discount("SUMMER10").await.unwrap();
        assert!(server.fetch_cart().await.is_err());
        assert!(server.fetch_cart().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_response() {
        let server = store();
        server.set_latency(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        server.fetch_cart().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_suggest_matches_titles() {
        let server = store();
        let results = server.suggest("tote", 5).await.unwrap();
        assert_eq!(results.products.len(), 1);
        assert_eq!(results.products[0].handle, "canvas-tote");
        assert_eq!(results.products[0].price.as_deref(), Some("35.00"));
    }
}
