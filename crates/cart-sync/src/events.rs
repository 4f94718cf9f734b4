//! Typed cart events with disposable subscriptions.

use std::sync::{Arc, Weak};

use cart_core::{CartSnapshot, LineItem, LineItemKey, VariantId};
use parking_lot::Mutex;

use crate::undo::{UndoOutcome, UndoRecord};
use crate::view::Notice;

/// Something subscribers may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// A new snapshot was applied to the store.
    Updated(Arc<CartSnapshot>),
    /// A variant was added.
    ItemAdded(LineItem),
    /// A transient notice was shown.
    Notice(Notice),
    /// A removal can now be undone.
    UndoArmed(UndoRecord),
    /// An undo slot was cleared.
    UndoCleared {
        key: LineItemKey,
        outcome: UndoOutcome,
    },
    /// A variant could not be added because it is sold out.
    SoldOut(VariantId),
    /// The drawer was opened (`true`) or closed.
    DrawerToggled(bool),
    /// The cart note was saved.
    NoteSaved(Option<String>),
}

type Callback = Arc<dyn Fn(&CartEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

/// Callback registry owned by the controller.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is disposed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every subscriber.
    ///
    /// Callbacks run outside the registry lock, so they may subscribe or
    /// dispose without deadlocking.
    pub fn emit(&self, event: &CartEvent) {
        let callbacks: Vec<Callback> = self
            .registry
            .lock()
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Disposer returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn dispose(self) {
        drop(self);
    }

    /// Keep the callback registered for the life of the bus.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
