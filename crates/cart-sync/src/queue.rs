//! Per-line action queue.
//!
//! Operations are grouped by [`Scope`]. Within a scope one operation runs at
//! a time and the rest wait in arrival order; a scope accepts at most
//! `max_waiting` waiters behind the running one and rejects anything beyond
//! that with [`CartError::Busy`]. Different scopes run concurrently.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use cart_core::{CartError, LineItemKey, VariantId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// What an operation serializes against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum Scope {
    /// An existing line.
    Line(LineItemKey),
    /// A variant being added.
    Variant(VariantId),
    /// Cart-wide attributes (note, discount).
    Cart,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(key) => write!(f, "line:{key}"),
            Self::Variant(id) => write!(f, "variant:{id}"),
            Self::Cart => f.write_str("cart"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Refresh,
    Add,
    Increment,
    Decrement,
    SetQuantity,
    Remove,
    Restore,
    UpdateNote,
    ApplyDiscount,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Add => "add",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::SetQuantity => "set_quantity",
            Self::Remove => "remove",
            Self::Restore => "restore",
            Self::UpdateNote => "update_note",
            Self::ApplyDiscount => "apply_discount",
        }
    }
}

/// An operation accepted by the queue, running or waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    pub id: u64,
    pub scope: Scope,
    pub kind: OperationKind,
    /// Quantity asked for, when the operation carries one.
    pub requested_quantity: Option<i64>,
    pub enqueued_at: DateTime<Utc>,
    /// Set once the operation holds its scope.
    pub started_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Slot {
    gate: Arc<tokio::sync::Mutex<()>>,
    ops: Vec<PendingOperation>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    slots: HashMap<Scope, Slot>,
}

/// Serializes operations per scope.
pub struct ActionQueue {
    max_waiting: usize,
    retry: RetryPolicy,
    state: Mutex<QueueState>,
    listener: Option<Listener>,
}

impl ActionQueue {
    pub fn new(max_waiting: usize, retry: RetryPolicy) -> Self {
        Self {
            max_waiting,
            retry,
            state: Mutex::new(QueueState::default()),
            listener: None,
        }
    }

    /// Call `listener` whenever the set of pending operations changes.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Run `op` once `scope` is free, retrying per the policy.
    ///
    /// `op` is called again for each retry. Dropping the returned future
    /// withdraws the operation.
    pub async fn run<T, F, Fut>(
        &self,
        scope: Scope,
        kind: OperationKind,
        requested_quantity: Option<i64>,
        op: F,
    ) -> Result<T, CartError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CartError>>,
    {
        self.run_with(true, scope, kind, requested_quantity, op).await
    }

    /// Like [`run`](Self::run), but waits however long the scope's line is
    /// instead of failing with [`CartError::Busy`]. For work whose callers
    /// already coalesce it, such as debounced saves.
    pub async fn run_waiting<T, F, Fut>(
        &self,
        scope: Scope,
        kind: OperationKind,
        requested_quantity: Option<i64>,
        op: F,
    ) -> Result<T, CartError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CartError>>,
    {
        self.run_with(false, scope, kind, requested_quantity, op).await
    }

    async fn run_with<T, F, Fut>(
        &self,
        bounded: bool,
        scope: Scope,
        kind: OperationKind,
        requested_quantity: Option<i64>,
        mut op: F,
    ) -> Result<T, CartError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CartError>>,
    {
        let (entry, gate) = self.enter(bounded, scope, kind, requested_quantity)?;
        let _held = gate.lock_owned().await;
        self.mark_started(&entry);

        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.backoff.delay_for_attempt(attempt);
                    warn!(
                        scope = %entry.scope,
                        op = kind.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying cart operation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn enter(
        &self,
        bounded: bool,
        scope: Scope,
        kind: OperationKind,
        requested_quantity: Option<i64>,
    ) -> Result<(Entry<'_>, Arc<tokio::sync::Mutex<()>>), CartError> {
        let (id, gate) = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            let slot = state.slots.entry(scope.clone()).or_default();
            if bounded && slot.ops.len() > self.max_waiting {
                debug!(scope = %scope, op = kind.as_str(), "scope busy, rejecting");
                return Err(CartError::Busy(scope.to_string()));
            }
            slot.ops.push(PendingOperation {
                id,
                scope: scope.clone(),
                kind,
                requested_quantity,
                enqueued_at: Utc::now(),
                started_at: None,
            });
            (id, Arc::clone(&slot.gate))
        };
        self.notify();
        let entry = Entry {
            queue: self,
            scope,
            id,
        };
        Ok((entry, gate))
    }

    fn mark_started(&self, entry: &Entry<'_>) {
        let mut state = self.state.lock();
        if let Some(op) = state
            .slots
            .get_mut(&entry.scope)
            .and_then(|slot| slot.ops.iter_mut().find(|op| op.id == entry.id))
        {
            op.started_at = Some(Utc::now());
        }
    }

    fn leave(&self, scope: &Scope, id: u64) {
        {
            let mut state = self.state.lock();
            if let Some(slot) = state.slots.get_mut(scope) {
                slot.ops.retain(|op| op.id != id);
                if slot.ops.is_empty() {
                    state.slots.remove(scope);
                }
            }
        }
        self.notify();
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener();
        }
    }

    /// Every accepted operation, running ones first within each scope.
    pub fn pending(&self) -> Vec<PendingOperation> {
        let state = self.state.lock();
        let mut ops: Vec<_> = state
            .slots
            .values()
            .flat_map(|slot| slot.ops.iter().cloned())
            .collect();
        ops.sort_by_key(|op| op.id);
        ops
    }

    /// Lines with at least one accepted operation.
    pub fn pending_lines(&self) -> HashSet<LineItemKey> {
        self.state
            .lock()
            .slots
            .keys()
            .filter_map(|scope| match scope {
                Scope::Line(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Variants with an add or restore in flight.
    pub fn pending_variants(&self) -> HashSet<VariantId> {
        self.state
            .lock()
            .slots
            .keys()
            .filter_map(|scope| match scope {
                Scope::Variant(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().slots.is_empty()
    }
}

impl fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("max_waiting", &self.max_waiting)
            .field("retry", &self.retry)
            .field("pending", &self.pending().len())
            .finish()
    }
}

struct Entry<'a> {
    queue: &'a ActionQueue,
    scope: Scope,
    id: u64,
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        self.queue.leave(&self.scope, self.id);
    }
}
