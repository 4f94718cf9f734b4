//! Cart state store.
//!
//! Holds the one current [`CartSnapshot`]. The only way to change it is to
//! swap in a whole new snapshot, and only responses to requests issued after
//! the currently applied one are accepted.

use std::sync::Arc;

use cart_core::CartSnapshot;
use parking_lot::Mutex;
use tracing::debug;

use crate::events::{CartEvent, EventBus};

/// Order stamp taken before a request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Arc<CartSnapshot>>,
    issued: u64,
    applied: u64,
}

/// Process-wide holder of the latest server snapshot.
#[derive(Debug)]
pub struct CartStore {
    state: Mutex<StoreState>,
    // Held across the swap and the notification so subscribers see
    // snapshots in ticket order.
    publish: Mutex<()>,
    events: EventBus,
}

impl CartStore {
    /// Create an empty store that notifies `events` on every swap.
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            publish: Mutex::new(()),
            events,
        }
    }

    /// Latest applied snapshot, `None` before the first fetch.
    pub fn current(&self) -> Option<Arc<CartSnapshot>> {
        self.state.lock().current.clone()
    }

    /// Run `f` on the current snapshot with publishing held off, so a swap
    /// cannot interleave with whatever `f` renders.
    pub fn with_current<R>(&self, f: impl FnOnce(&CartSnapshot) -> R) -> Option<R> {
        let _publish = self.publish.lock();
        let current = self.current()?;
        Some(f(&current))
    }

    /// Take a ticket for a request about to be sent.
    pub fn issue_ticket(&self) -> Ticket {
        let mut state = self.state.lock();
        state.issued += 1;
        Ticket(state.issued)
    }

    /// Swap in the response to the request stamped `ticket`.
    ///
    /// Returns `None` and keeps the current snapshot when a response to a
    /// later request has already been applied. Subscribers are notified
    /// synchronously and must not call back into `apply`/`replace`.
    pub fn apply(&self, ticket: Ticket, snapshot: CartSnapshot) -> Option<Arc<CartSnapshot>> {
        let _publish = self.publish.lock();
        let snapshot = {
            let mut state = self.state.lock();
            if ticket.0 <= state.applied {
                debug!(
                    ticket = ticket.0,
                    applied = state.applied,
                    "dropping stale cart snapshot"
                );
                return None;
            }
            let snapshot = Arc::new(snapshot);
            state.applied = ticket.0;
            state.current = Some(Arc::clone(&snapshot));
            snapshot
        };
        debug!(
            ticket = ticket.0,
            item_count = snapshot.item_count,
            "cart snapshot replaced"
        );
        self.events.emit(&CartEvent::Updated(Arc::clone(&snapshot)));
        Some(snapshot)
    }

    /// Swap in a snapshot unconditionally.
    pub fn replace(&self, snapshot: CartSnapshot) -> Arc<CartSnapshot> {
        let ticket = self.issue_ticket();
        match self.apply(ticket, snapshot) {
            Some(applied) => applied,
            // A fresh ticket is newer than anything applied; only reachable
            // if another thread issued and applied a newer one in between.
            None => self.current().unwrap_or_default(),
        }
    }
}
