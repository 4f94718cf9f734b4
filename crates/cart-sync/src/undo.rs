//! Undo window for removed lines.
//!
//! Removing a line arms an [`UndoRecord`] for a fixed window. The ledger
//! holds up to `capacity` armed records; arming past that evicts the oldest.
//! Records are kept in removal order.
//! Timers are owned by the caller and handed in as [`AbortHandle`]s so the
//! ledger can cancel them when a record leaves early.

use std::collections::VecDeque;
use std::time::Duration;

use cart_core::{LineItem, LineItemKey, VariantId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A removed line that can still be restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoRecord {
    pub id: u64,
    pub key: LineItemKey,
    pub variant_id: VariantId,
    pub product_title: String,
    pub quantity: u32,
    pub removed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UndoRecord {
    /// Wall-clock time left at `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

/// Why a record left the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoOutcome {
    /// The line was put back.
    Restored,
    /// The window ran out.
    Expired,
    /// A newer removal pushed it out.
    Superseded,
}

#[derive(Debug)]
struct Armed {
    record: UndoRecord,
    deadline: Instant,
    timer: Option<AbortHandle>,
}

impl Armed {
    fn cancel(self) -> UndoRecord {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        self.record
    }
}

/// A record taken out of the ledger for restoring.
#[derive(Debug, Clone)]
pub struct TakenUndo {
    pub record: UndoRecord,
    pub deadline: Instant,
}

/// Armed undo records, oldest first.
#[derive(Debug)]
pub struct UndoLedger {
    capacity: usize,
    next_id: u64,
    armed: VecDeque<Armed>,
}

impl UndoLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 1,
            armed: VecDeque::new(),
        }
    }

    /// Build a record for `item`, removed at `now`.
    pub fn record(&mut self, item: &LineItem, now: DateTime<Utc>, window: Duration) -> UndoRecord {
        let id = self.next_id;
        self.next_id += 1;
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        UndoRecord {
            id,
            key: item.key.clone(),
            variant_id: item.variant_id,
            product_title: item.product_title.clone(),
            quantity: item.quantity,
            removed_at: now,
            expires_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Arm `record` until `deadline`.
    ///
    /// Returns the records pushed out, either because they were for the same
    /// line or because the ledger was full. Their timers are aborted.
    pub fn arm(
        &mut self,
        record: UndoRecord,
        deadline: Instant,
        timer: Option<AbortHandle>,
    ) -> Vec<UndoRecord> {
        let mut evicted = Vec::new();
        if let Some(index) = self.armed.iter().position(|a| a.record.key == record.key) {
            if let Some(previous) = self.armed.remove(index) {
                evicted.push(previous.cancel());
            }
        }
        while self.armed.len() >= self.capacity {
            match self.armed.pop_front() {
                Some(oldest) => evicted.push(oldest.cancel()),
                None => break,
            }
        }
        self.armed.push_back(Armed {
            record,
            deadline,
            timer,
        });
        evicted
    }

    /// Put back a record taken by [`take_latest`](Self::take_latest) whose
    /// restore failed.
    ///
    /// The record returns to its place in removal order, so anything removed
    /// while the restore was in flight stays newer. When the ledger is full
    /// the oldest records go first; that may be `record` itself, which is
    /// then returned among the evicted with its timer aborted. A newer record
    /// for the same line wins over it.
    pub fn reinstate(
        &mut self,
        record: UndoRecord,
        deadline: Instant,
        timer: Option<AbortHandle>,
    ) -> Vec<UndoRecord> {
        let armed = Armed {
            record,
            deadline,
            timer,
        };
        if self.armed.iter().any(|a| a.record.key == armed.record.key) {
            return vec![armed.cancel()];
        }
        let at = self.armed.partition_point(|a| a.record.id < armed.record.id);
        self.armed.insert(at, armed);
        let mut evicted = Vec::new();
        while self.armed.len() > self.capacity {
            match self.armed.pop_front() {
                Some(oldest) => evicted.push(oldest.cancel()),
                None => break,
            }
        }
        evicted
    }

    /// Remove the newest record and cancel its timer.
    pub fn take_latest(&mut self) -> Option<TakenUndo> {
        let armed = self.armed.pop_back()?;
        let deadline = armed.deadline;
        Some(TakenUndo {
            record: armed.cancel(),
            deadline,
        })
    }

    /// Drop record `id` because its window closed. `None` if it already left.
    pub fn expire(&mut self, id: u64) -> Option<UndoRecord> {
        let index = self.armed.iter().position(|a| a.record.id == id)?;
        self.armed.remove(index).map(|armed| armed.record)
    }

    /// Cancel everything.
    pub fn clear(&mut self) -> Vec<UndoRecord> {
        self.armed.drain(..).map(Armed::cancel).collect()
    }

    pub fn latest(&self) -> Option<&UndoRecord> {
        self.armed.back().map(|a| &a.record)
    }

    pub fn records(&self) -> Vec<UndoRecord> {
        self.armed.iter().map(|a| a.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
