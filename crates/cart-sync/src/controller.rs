//! The cart controller.
//!
//! Composes the client, store, queue, undo ledger and reconciler. Every
//! mutation goes through the action queue and ends by applying a snapshot
//! to the store; the store's update event is what re-renders the view.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cart_client::CartApi;
use cart_core::{CartError, CartSnapshot, LineItem, LineItemKey, VariantId};
use chrono::Utc;
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SyncConfig};
use crate::events::{CartEvent, EventBus, Subscription};
use crate::notes::{spawn_after, Debouncer};
use crate::queue::{ActionQueue, OperationKind, PendingOperation, Scope};
use crate::reconcile::Reconciler;
use crate::search::SuggestionSession;
use crate::store::{CartStore, Ticket};
use crate::undo::{UndoLedger, UndoOutcome, UndoRecord};
use crate::view::{CartView, Notice};

#[derive(Debug, Clone, Copy)]
enum QuantityChange {
    By(i64),
    To(u32),
}

impl QuantityChange {
    fn target(self, snapshot: &CartSnapshot, key: &LineItemKey) -> Result<u32, CartError> {
        let target = match self {
            Self::To(quantity) => i64::from(quantity),
            Self::By(delta) => {
                let current = snapshot.quantity_of(key).ok_or_else(|| {
                    CartError::Validation("This item is no longer in your cart".to_string())
                })?;
                i64::from(current) + delta
            }
        };
        if target < 1 {
            return Err(CartError::Validation(
                "Quantity must be at least 1. Use remove to take the item out.".to_string(),
            ));
        }
        u32::try_from(target).map_err(|_| CartError::Validation("Quantity is too large".to_string()))
    }
}

struct Inner {
    this: Weak<Inner>,
    api: Arc<dyn CartApi>,
    config: SyncConfig,
    events: EventBus,
    store: CartStore,
    queue: ActionQueue,
    reconciler: Reconciler,
    view: Mutex<Box<dyn CartView>>,
    undo: Mutex<UndoLedger>,
    refresh: Mutex<Option<AbortHandle>>,
    note: Debouncer,
    open: AtomicBool,
    _rendering: Subscription,
}

impl Inner {
    /// Lines shown as loading: pending line scopes plus lines whose variant
    /// has an add or restore in flight.
    fn pending_keys(&self, snapshot: &CartSnapshot) -> HashSet<LineItemKey> {
        let mut keys = self.queue.pending_lines();
        let variants = self.queue.pending_variants();
        if !variants.is_empty() {
            keys.extend(
                snapshot
                    .items
                    .iter()
                    .filter(|item| variants.contains(&item.variant_id))
                    .map(|item| item.key.clone()),
            );
        }
        keys
    }

    fn render_rows(&self, snapshot: &CartSnapshot) {
        let pending = self.pending_keys(snapshot);
        let mut view = self.view.lock();
        self.reconciler.reconcile(&mut **view, snapshot, &pending);
    }

    fn render_pending(&self) {
        self.store.with_current(|snapshot| self.render_rows(snapshot));
    }

    fn render_undo(&self) {
        let (latest, armed) = {
            let ledger = self.undo.lock();
            (ledger.latest().cloned(), ledger.len())
        };
        let mut view = self.view.lock();
        self.reconciler.render_undo(&mut **view, latest.as_ref(), armed);
    }

    /// Show a notice and take it down after its duration.
    fn notify(&self, notice: Notice) {
        {
            let mut view = self.view.lock();
            self.reconciler.render_notice(&mut **view, &notice);
        }
        let id = notice.id;
        let weak = self.this.clone();
        spawn_after("notice", notice.duration, async move {
            if let Some(inner) = weak.upgrade() {
                let mut view = inner.view.lock();
                inner.reconciler.dismiss_notice(&mut **view, id);
            }
        });
        self.events.emit(&CartEvent::Notice(notice));
    }

    fn set_open(&self, open: bool) {
        if self.open.swap(open, Ordering::SeqCst) == open {
            return;
        }
        {
            let mut view = self.view.lock();
            self.reconciler.render_open(&mut **view, open);
        }
        self.events.emit(&CartEvent::DrawerToggled(open));
    }

    /// Apply a response; a stale one leaves the newer snapshot in place.
    fn accept(&self, ticket: Ticket, snapshot: CartSnapshot) -> Arc<CartSnapshot> {
        match self.store.apply(ticket, snapshot) {
            Some(applied) => applied,
            // Only stale when a newer snapshot was applied, so this is the
            // store's snapshot in practice.
            None => self
                .store
                .current()
                .unwrap_or_else(|| Arc::new(CartSnapshot::empty(self.config.currency))),
        }
    }

    async fn fetch(&self) -> Result<Arc<CartSnapshot>, CartError> {
        let ticket = self.store.issue_ticket();
        let snapshot = self.api.fetch_cart().await?;
        Ok(self.accept(ticket, snapshot))
    }

    /// The current snapshot, fetching it first if nothing is loaded yet.
    async fn known_snapshot(&self) -> Result<Arc<CartSnapshot>, CartError> {
        match self.store.current() {
            Some(snapshot) => Ok(snapshot),
            None => self.fetch().await,
        }
    }

    /// Re-fetch after an endpoint that does not return the cart.
    ///
    /// The mutation already happened, so a failed fetch falls back to the
    /// snapshot held. With nothing loaded yet the fetch error is returned.
    /// Callers inside the queue must not propagate it with `?`, or a retry
    /// would repeat the mutation.
    async fn sync_after(&self, op: OperationKind) -> Result<Arc<CartSnapshot>, CartError> {
        match self.fetch().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(op = op.as_str(), error = %err, "cart refresh after mutation failed");
                self.store.current().ok_or(err)
            }
        }
    }

    fn spawn_expiry(&self, id: u64, after: Duration) -> Option<tokio::task::AbortHandle> {
        let weak = self.this.clone();
        spawn_after("undo", after, async move {
            if let Some(inner) = weak.upgrade() {
                inner.expire_undo(id);
            }
        })
    }

    fn expire_undo(&self, id: u64) {
        let Some(record) = self.undo.lock().expire(id) else {
            return;
        };
        debug!(key = %record.key, "undo window closed");
        self.render_undo();
        self.events.emit(&CartEvent::UndoCleared {
            key: record.key,
            outcome: UndoOutcome::Expired,
        });
    }

    fn supersede(&self, evicted: Vec<UndoRecord>) {
        for old in evicted {
            debug!(key = %old.key, "undo superseded");
            self.events.emit(&CartEvent::UndoCleared {
                key: old.key,
                outcome: UndoOutcome::Superseded,
            });
        }
    }

    fn fail(&self, op: OperationKind, err: CartError) -> CartError {
        if err.is_silent() {
            debug!(op = op.as_str(), error = %err, "cart operation skipped");
            return err;
        }
        warn!(op = op.as_str(), error = %err, "cart operation failed");
        if let CartError::OutOfStock { variant_id, .. } = &err {
            {
                let mut view = self.view.lock();
                self.reconciler.render_sold_out(&mut **view, *variant_id);
            }
            self.events.emit(&CartEvent::SoldOut(*variant_id));
        }
        if let Some(message) = err.user_message() {
            self.notify(Notice::error(message));
        }
        err
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.undo.get_mut().clear();
        if let Some(fetch) = self.refresh.get_mut().take() {
            fetch.abort();
        }
    }
}

/// Client-side cart synchronization for one drawer.
///
/// Cheap to clone; clones share all state. Undo windows, toasts and note
/// autosave run on timers spawned onto the tokio runtime the controller is
/// used from. Called outside a runtime those timers are skipped with a
/// warning.
#[derive(Clone)]
pub struct CartController {
    inner: Arc<Inner>,
}

impl CartController {
    /// Build a controller rendering into `view`.
    ///
    /// Nothing is fetched until [`refresh`](Self::refresh) or
    /// [`open`](Self::open) is called.
    pub fn new<V>(api: Arc<dyn CartApi>, view: V, config: SyncConfig) -> Result<Self, ConfigError>
    where
        V: CartView + 'static,
    {
        config.validate()?;
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let this = weak.clone();
            let events = EventBus::new();

            let on_update = weak.clone();
            let rendering = events.subscribe(move |event| {
                if let CartEvent::Updated(snapshot) = event {
                    if let Some(inner) = on_update.upgrade() {
                        inner.render_rows(snapshot);
                    }
                }
            });

            let on_pending = weak.clone();
            let queue = ActionQueue::new(config.max_waiting_per_key, config.retry.clone())
                .with_listener(move || {
                    if let Some(inner) = on_pending.upgrade() {
                        inner.render_pending();
                    }
                });

            Inner {
                this,
                api,
                store: CartStore::new(events.clone()),
                events,
                queue,
                reconciler: Reconciler::new(config.free_shipping_threshold),
                view: Mutex::new(Box::new(view)),
                undo: Mutex::new(UndoLedger::new(config.undo_capacity)),
                refresh: Mutex::new(None),
                note: Debouncer::new(config.note_debounce()),
                open: AtomicBool::new(false),
                _rendering: rendering,
                config,
            }
        });
        Ok(Self { inner })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Latest applied snapshot.
    pub fn current(&self) -> Option<Arc<CartSnapshot>> {
        self.inner.store.current()
    }

    /// Operations accepted by the queue and not yet finished.
    pub fn pending(&self) -> Vec<PendingOperation> {
        self.inner.queue.pending()
    }

    /// Armed undo records, oldest first.
    pub fn undo_records(&self) -> Vec<UndoRecord> {
        self.inner.undo.lock().records()
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Register for cart events. Dropping the subscription unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    /// A search box session sharing this controller's client.
    pub fn search(&self) -> SuggestionSession {
        SuggestionSession::new(Arc::clone(&self.inner.api), &self.inner.config)
    }

    /// Fetch the cart, aborting any fetch still in flight.
    ///
    /// An aborted fetch resolves with [`CartError::Superseded`].
    pub async fn refresh(&self) -> Result<Arc<CartSnapshot>, CartError> {
        let inner = &self.inner;
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = inner.refresh.lock().replace(handle) {
            previous.abort();
        }

        let ticket = inner.store.issue_ticket();
        debug!(ticket = ticket.value(), "fetching cart");
        match Abortable::new(inner.api.fetch_cart(), registration).await {
            Ok(Ok(snapshot)) => Ok(inner.accept(ticket, snapshot)),
            Ok(Err(err)) => Err(inner.fail(OperationKind::Refresh, err)),
            Err(_aborted) => {
                debug!(ticket = ticket.value(), "cart fetch superseded");
                Err(CartError::Superseded)
            }
        }
    }

    /// Show the drawer and fetch a fresh cart.
    pub async fn open(&self) -> Result<Arc<CartSnapshot>, CartError> {
        self.inner.set_open(true);
        self.refresh().await
    }

    /// Hide the drawer.
    pub fn close(&self) {
        self.inner.set_open(false);
    }

    /// Add `quantity` of a variant.
    pub async fn add(&self, variant_id: VariantId, quantity: u32) -> Result<LineItem, CartError> {
        let inner = &self.inner;
        if quantity < 1 {
            return Err(inner.fail(
                OperationKind::Add,
                CartError::Validation("Quantity must be at least 1".to_string()),
            ));
        }

        let requested = i64::from(quantity);
        let result = inner
            .queue
            .run(
                Scope::Variant(variant_id),
                OperationKind::Add,
                Some(requested),
                || async {
                    let line = inner.api.add_line_item(variant_id, requested).await?;
                    // The line is the result; an unloaded cart stays unloaded.
                    let _synced = inner.sync_after(OperationKind::Add).await;
                    Ok(line)
                },
            )
            .await;

        match result {
            Ok(line) => {
                info!(variant_id = %variant_id, quantity, key = %line.key, "added to cart");
                inner.events.emit(&CartEvent::ItemAdded(line.clone()));
                inner.notify(Notice::success("Added to cart"));
                if inner.config.open_drawer_on_add {
                    inner.set_open(true);
                }
                Ok(line)
            }
            Err(err) => Err(inner.fail(OperationKind::Add, err)),
        }
    }

    /// Raise a line's quantity by one.
    pub async fn increment(&self, key: &LineItemKey) -> Result<Arc<CartSnapshot>, CartError> {
        self.change_quantity(key, QuantityChange::By(1), OperationKind::Increment)
            .await
    }

    /// Lower a line's quantity by one. Refuses to go below 1.
    pub async fn decrement(&self, key: &LineItemKey) -> Result<Arc<CartSnapshot>, CartError> {
        self.change_quantity(key, QuantityChange::By(-1), OperationKind::Decrement)
            .await
    }

    /// Set a line's quantity. Refuses anything below 1.
    pub async fn set_quantity(
        &self,
        key: &LineItemKey,
        quantity: u32,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        self.change_quantity(key, QuantityChange::To(quantity), OperationKind::SetQuantity)
            .await
    }

    async fn change_quantity(
        &self,
        key: &LineItemKey,
        change: QuantityChange,
        kind: OperationKind,
    ) -> Result<Arc<CartSnapshot>, CartError> {
        let inner = &self.inner;

        // Reject what is already known to be invalid without queueing.
        let early = match (change, inner.store.current()) {
            (QuantityChange::To(_), _) => change.target(&CartSnapshot::default(), key).err(),
            (QuantityChange::By(_), Some(snapshot)) => change.target(&snapshot, key).err(),
            (QuantityChange::By(_), None) => None,
        };
        if let Some(err) = early {
            return Err(inner.fail(kind, err));
        }

        let requested = match change {
            QuantityChange::To(quantity) => Some(i64::from(quantity)),
            QuantityChange::By(_) => None,
        };
        let result = inner
            .queue
            .run(Scope::Line(key.clone()), kind, requested, || async {
                // Targets are computed when the operation runs, from the
                // snapshot left by whatever ran before it.
                let snapshot = inner.known_snapshot().await?;
                let target = change.target(&snapshot, key)?;
                let ticket = inner.store.issue_ticket();
                let next = inner.api.change_line_item(key, i64::from(target)).await?;
                Ok((target, inner.accept(ticket, next)))
            })
            .await;

        match result {
            Ok((target, snapshot)) => {
                info!(key = %key, quantity = target, op = kind.as_str(), "quantity updated");
                inner.notify(Notice::success(format!("Quantity updated to {target}")));
                Ok(snapshot)
            }
            Err(err) => Err(inner.fail(kind, err)),
        }
    }

    /// Remove a line and arm its undo window.
    ///
    /// Removing a line that the current snapshot does not contain is a
    /// no-op and sends nothing.
    pub async fn remove(&self, key: &LineItemKey) -> Result<Arc<CartSnapshot>, CartError> {
        let inner = &self.inner;
        if let Some(snapshot) = inner.store.current() {
            if snapshot.item(key).is_none() {
                debug!(key = %key, "line already absent, nothing to remove");
                return Ok(snapshot);
            }
        }

        let result = inner
            .queue
            .run(Scope::Line(key.clone()), OperationKind::Remove, Some(0), || async {
                let snapshot = inner.known_snapshot().await?;
                let Some(item) = snapshot.item(key).cloned() else {
                    return Ok((None, snapshot));
                };
                let ticket = inner.store.issue_ticket();
                let next = inner.api.change_line_item(key, 0).await?;
                Ok((Some(item), inner.accept(ticket, next)))
            })
            .await;

        match result {
            Ok((Some(item), snapshot)) => {
                info!(key = %key, quantity = item.quantity, "line removed");
                self.arm_undo(&item);
                Ok(snapshot)
            }
            Ok((None, snapshot)) => Ok(snapshot),
            Err(err) => Err(inner.fail(OperationKind::Remove, err)),
        }
    }

    fn arm_undo(&self, item: &LineItem) {
        let inner = &self.inner;
        let window = inner.config.undo_window();
        let (record, evicted) = {
            let mut ledger = inner.undo.lock();
            let record = ledger.record(item, Utc::now(), window);
            let timer = inner.spawn_expiry(record.id, window);
            let evicted = ledger.arm(record.clone(), Instant::now() + window, timer);
            (record, evicted)
        };
        inner.render_undo();
        inner.supersede(evicted);
        inner.events.emit(&CartEvent::UndoArmed(record));
    }

    /// Restore the most recently removed line.
    ///
    /// Returns `Ok(None)` when nothing is armed. If the restore fails the
    /// record goes back to its place among the armed ones until its original
    /// deadline, unless newer removals have filled the ledger meanwhile.
    pub async fn undo(&self) -> Result<Option<Arc<CartSnapshot>>, CartError> {
        let inner = &self.inner;
        let Some(taken) = inner.undo.lock().take_latest() else {
            return Ok(None);
        };
        let record = taken.record.clone();

        let result = inner
            .queue
            .run(
                Scope::Variant(record.variant_id),
                OperationKind::Restore,
                Some(i64::from(record.quantity)),
                || async {
                    inner
                        .api
                        .add_line_item(record.variant_id, i64::from(record.quantity))
                        .await?;
                    Ok(inner.sync_after(OperationKind::Restore).await)
                },
            )
            .await;

        match result {
            Ok(synced) => {
                info!(key = %record.key, quantity = record.quantity, "line restored");
                inner.render_undo();
                inner.events.emit(&CartEvent::UndoCleared {
                    key: record.key,
                    outcome: UndoOutcome::Restored,
                });
                match synced {
                    Ok(snapshot) => {
                        inner.notify(Notice::success("Item restored to cart"));
                        Ok(Some(snapshot))
                    }
                    Err(err) => Err(inner.fail(OperationKind::Restore, err)),
                }
            }
            Err(err) => {
                let remaining = taken.deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    inner.render_undo();
                    inner.events.emit(&CartEvent::UndoCleared {
                        key: record.key,
                        outcome: UndoOutcome::Expired,
                    });
                } else {
                    let timer = inner.spawn_expiry(record.id, remaining);
                    let evicted = inner.undo.lock().reinstate(record, taken.deadline, timer);
                    inner.render_undo();
                    inner.supersede(evicted);
                }
                Err(inner.fail(OperationKind::Restore, err))
            }
        }
    }

    /// Save the cart note now.
    pub async fn update_note(&self, note: &str) -> Result<Arc<CartSnapshot>, CartError> {
        self.save_note(note, false).await
    }

    async fn save_note(&self, note: &str, debounced: bool) -> Result<Arc<CartSnapshot>, CartError> {
        let inner = &self.inner;
        let op = || async {
            let ticket = inner.store.issue_ticket();
            let next = inner.api.update_note(note).await?;
            Ok::<_, CartError>(inner.accept(ticket, next))
        };
        // A debounced save is already the only one pending for its burst, so
        // it queues behind discounts instead of being turned away.
        let result = if debounced {
            inner
                .queue
                .run_waiting(Scope::Cart, OperationKind::UpdateNote, None, op)
                .await
        } else {
            inner
                .queue
                .run(Scope::Cart, OperationKind::UpdateNote, None, op)
                .await
        };

        match result {
            Ok(snapshot) => {
                debug!(length = note.len(), "cart note saved");
                inner.events.emit(&CartEvent::NoteSaved(snapshot.note.clone()));
                Ok(snapshot)
            }
            Err(err) => Err(inner.fail(OperationKind::UpdateNote, err)),
        }
    }

    /// Save the note once typing pauses for the configured debounce.
    pub fn note_changed(&self, note: impl Into<String>) {
        let note = note.into();
        let weak = Arc::downgrade(&self.inner);
        self.inner.note.call(async move {
            if let Some(inner) = weak.upgrade() {
                if let Err(err) = (CartController { inner }).save_note(&note, true).await {
                    debug!(error = %err, "debounced note save did not complete");
                }
            }
        });
    }

    /// Apply a discount code and reload the cart.
    pub async fn apply_discount(&self, code: &str) -> Result<Arc<CartSnapshot>, CartError> {
        let inner = &self.inner;
        let code = code.trim();
        if code.is_empty() {
            return Err(inner.fail(
                OperationKind::ApplyDiscount,
                CartError::Validation("Enter a discount code".to_string()),
            ));
        }

        let result = inner
            .queue
            .run(Scope::Cart, OperationKind::ApplyDiscount, None, || async {
                inner.api.apply_discount(code).await?;
                Ok(inner.sync_after(OperationKind::ApplyDiscount).await)
            })
            .await;

        match result.and_then(|synced| synced) {
            Ok(snapshot) => {
                info!(code, discount = snapshot.total_discount, "discount applied");
                inner.notify(Notice::success("Discount code applied successfully!"));
                Ok(snapshot)
            }
            Err(err) => Err(inner.fail(OperationKind::ApplyDiscount, err)),
        }
    }
}

impl std::fmt::Debug for CartController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartController")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .field("queue", &self.inner.queue)
            .field("open", &self.is_open())
            .finish()
    }
}
