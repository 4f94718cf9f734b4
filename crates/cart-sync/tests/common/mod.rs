//! Shared fixtures for controller tests.

#![allow(dead_code)]

use std::sync::Arc;

use cart_client::{CatalogEntry, MemoryCartServer};
use cart_core::{Currency, LineItemKey, VariantId};
use cart_sync::{CartController, CartEvent, DrawerHandle, Notice, Subscription, SyncConfig};
use parking_lot::Mutex;

pub const SHIRT: u64 = 101;
pub const SOCKS: u64 = 102;
pub const TOTE: u64 = 103;
pub const MUG: u64 = 104;
pub const PRINT: u64 = 105;
pub const GIFT_BOX: u64 = 106;

/// A store whose lines get the keys "A".."F".
pub fn catalog() -> MemoryCartServer {
    MemoryCartServer::new(Currency::USD)
        .with_product(CatalogEntry::new(SHIRT, "Linen Shirt", 4500).with_key("A"))
        .with_product(CatalogEntry::new(SOCKS, "Wool Socks", 1200).with_key("B"))
        .with_product(CatalogEntry::new(TOTE, "Canvas Tote", 2500).with_key("C"))
        .with_product(
            CatalogEntry::new(MUG, "Enamel Mug", 1800)
                .with_key("D")
                .with_variant_title("Blue"),
        )
        .with_product(
            CatalogEntry::new(PRINT, "Limited Print", 9000)
                .with_key("E")
                .with_inventory(1),
        )
        .with_product(CatalogEntry::new(GIFT_BOX, "Gift Box", 5000).with_key("F"))
}

pub fn key(key: &str) -> LineItemKey {
    LineItemKey::new(key)
}

pub fn variant(id: u64) -> VariantId {
    VariantId::new(id)
}

pub struct Harness {
    pub server: Arc<MemoryCartServer>,
    pub cart: CartController,
    pub drawer: DrawerHandle,
    /// Every notice shown, including ones already taken down.
    shown: Arc<Mutex<Vec<Notice>>>,
    _shown: Subscription,
}

impl Harness {
    pub fn new(server: MemoryCartServer) -> Self {
        Self::with_config(server, SyncConfig::default())
    }

    pub fn with_config(server: MemoryCartServer, config: SyncConfig) -> Self {
        let server = Arc::new(server);
        let drawer = DrawerHandle::new();
        let cart = CartController::new(server.clone(), drawer.clone(), config)
            .expect("valid config");
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&shown);
        let subscription = cart.subscribe(move |event| {
            if let CartEvent::Notice(notice) = event {
                sink.lock().push(notice.clone());
            }
        });
        Self {
            server,
            cart,
            drawer,
            shown,
            _shown: subscription,
        }
    }

    /// Quantity of `key` in the controller's store.
    pub fn quantity(&self, key: &str) -> Option<u32> {
        self.cart
            .current()
            .and_then(|snapshot| snapshot.quantity_of(&LineItemKey::new(key)))
    }

    /// Messages of every notice shown so far, oldest first.
    pub fn notices(&self) -> Vec<String> {
        self.shown.lock().iter().map(|n| n.message.clone()).collect()
    }

    pub fn shown_notices(&self) -> Vec<Notice> {
        self.shown.lock().clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.shown.lock().last().cloned()
    }
}

/// Collect every event the controller emits.
pub fn record_events(cart: &CartController) -> (Arc<Mutex<Vec<CartEvent>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = cart.subscribe(move |event| sink.lock().push(event.clone()));
    (events, subscription)
}
