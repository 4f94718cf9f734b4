//! Cart synchronization for a storefront drawer.
//!
//! This crate provides:
//! - `CartStore` - The single current snapshot, replaced wholesale and guarded by request tickets
//! - `Reconciler` - Minimal-change rendering of a snapshot into a `CartView`
//! - `DrawerDocument` - In-memory drawer page model that renders to HTML
//! - `ActionQueue` - Per-line FIFO with a bounded wait list and retries
//! - `UndoLedger` - Undo window for removed lines
//! - `SuggestionSession` - Debounced, cached predictive search
//! - `CartController` - Composes all of the above
//!
//! ```no_run
//! use std::sync::Arc;
//! use cart_client::{ClientConfig, HttpCartClient};
//! use cart_sync::{CartController, DrawerHandle, SyncConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpCartClient::new(&ClientConfig::default())?;
//! let drawer = DrawerHandle::new();
//! let cart = CartController::new(Arc::new(client), drawer.clone(), SyncConfig::default())?;
//!
//! cart.open().await?;
//! println!("{}", drawer.document().to_text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod dom;
pub mod events;
pub mod notes;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod search;
pub mod store;
pub mod undo;
pub mod view;

pub use config::{ConfigError, SyncConfig};
pub use controller::CartController;
pub use dom::{DrawerDocument, DrawerHandle};
pub use events::{CartEvent, EventBus, Subscription};
pub use queue::{ActionQueue, OperationKind, PendingOperation, Scope};
pub use reconcile::Reconciler;
pub use retry::{BackoffStrategy, RetryCondition, RetryPolicy};
pub use search::{SuggestOutcome, SuggestionSession};
pub use store::{CartStore, Ticket};
pub use undo::{UndoLedger, UndoOutcome, UndoRecord};
pub use view::{CartView, Notice, NoticeId, NoticeLevel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SyncConfig;
    pub use crate::controller::CartController;
    pub use crate::dom::{DrawerDocument, DrawerHandle};
    pub use crate::events::{CartEvent, Subscription};
    pub use crate::view::{CartView, Notice, NoticeLevel};
    pub use cart_core::prelude::*;
}
