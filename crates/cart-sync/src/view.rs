//! The page surface the reconciler writes to.
//!
//! `CartView` is the contract between the controller and whatever renders
//! the drawer (a browser DOM binding, a terminal, or the in-memory
//! [`DrawerDocument`](crate::DrawerDocument)). Implementations keep these
//! page hooks stable: `data-cart-drawer` on the drawer root, `data-item-key`
//! on every line row, `#cart-drawer-count` and `#cart-subtotal`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cart_core::shipping::FreeShippingProgress;
use cart_core::{CartSnapshot, LineItem, LineItemKey, VariantId};
use serde::Serialize;

use crate::undo::UndoRecord;

/// Attribute carrying the line key on each row.
pub const ITEM_KEY_ATTR: &str = "data-item-key";
/// Attribute marking the drawer root.
pub const DRAWER_ATTR: &str = "data-cart-drawer";
/// Element id of the drawer item count.
pub const DRAWER_COUNT_ID: &str = "cart-drawer-count";
/// Element id of the subtotal.
pub const SUBTOTAL_ID: &str = "cart-subtotal";

/// What a rendered row currently shows, as read back from the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub key: LineItemKey,
    pub quantity: u32,
    pub line_price: i64,
    pub disabled: bool,
}

/// Everything needed to render a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowModel {
    pub key: LineItemKey,
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_title: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub line_price: i64,
    pub line_price_text: String,
    pub disabled: bool,
}

impl RowModel {
    pub fn from_item(item: &LineItem, snapshot: &CartSnapshot, disabled: bool) -> Self {
        Self {
            key: item.key.clone(),
            variant_id: item.variant_id,
            product_title: item.product_title.clone(),
            variant_title: item.variant_title.clone(),
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            line_price: item.final_line_price,
            line_price_text: item.line_price(snapshot.currency).display(),
            disabled,
        }
    }
}

/// Fields of an existing row that changed. `None` means untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPatch {
    pub quantity: Option<u32>,
    pub line_price: Option<(i64, String)>,
    pub disabled: Option<bool>,
}

impl RowPatch {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.line_price.is_none() && self.disabled.is_none()
    }
}

/// Cart-wide figures rendered outside the rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub item_count: u32,
    pub subtotal_text: String,
    pub discount_text: Option<String>,
    pub shipping: Option<FreeShippingProgress>,
    pub checkout_enabled: bool,
}

impl Aggregates {
    pub fn from_snapshot(snapshot: &CartSnapshot, free_shipping_threshold: i64) -> Self {
        Self {
            item_count: snapshot.item_count,
            subtotal_text: snapshot.total().display(),
            discount_text: (snapshot.total_discount > 0).then(|| snapshot.discount().display()),
            shipping: FreeShippingProgress::compute(snapshot.total(), free_shipping_threshold),
            checkout_enabled: snapshot.item_count > 0,
        }
    }
}

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Identity of a shown notice, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoticeId(u64);

impl NoticeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A transient toast. The controller takes it down after `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub message: String,
    /// How long the toast stays up.
    #[serde(skip)]
    pub duration: Duration,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            id: NoticeId::next(),
            level: NoticeLevel::Success,
            message: message.into(),
            duration: Duration::from_secs(3),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            id: NoticeId::next(),
            level: NoticeLevel::Error,
            message: message.into(),
            duration: Duration::from_secs(5),
        }
    }
}

/// Page surface for the cart drawer.
///
/// Only [`reconcile`](crate::reconcile) calls the mutating methods.
pub trait CartView: Send {
    /// Rows currently attached, in page order.
    fn rendered_rows(&self) -> Vec<RenderedRow>;

    /// Whether the empty-cart placeholder is showing.
    fn showing_empty(&self) -> bool;

    /// Insert a new row at `index` among the attached rows.
    fn insert_row(&mut self, index: usize, row: &RowModel);

    /// Update only the fields set in `patch`. A disabled row also shows
    /// its loading state.
    fn patch_row(&mut self, key: &LineItemKey, patch: &RowPatch);

    /// Play the removal transition, then detach the row.
    fn remove_row(&mut self, key: &LineItemKey);

    /// Re-attach an existing row at `index` among the other rows, keeping
    /// the node as it is.
    fn move_row(&mut self, key: &LineItemKey, index: usize);

    /// Update count badges, subtotal and free shipping bar.
    fn render_aggregates(&mut self, aggregates: &Aggregates);

    /// Detach every row and show the empty-cart placeholder.
    fn show_empty(&mut self, aggregates: &Aggregates);

    /// Hide the empty-cart placeholder.
    fn hide_empty(&mut self);

    /// Show the undo affordance for the most recent removal.
    fn show_undo(&mut self, record: &UndoRecord, pending: usize);

    /// Hide the undo affordance.
    fn hide_undo(&mut self);

    /// Show a toast.
    fn show_notice(&mut self, notice: &Notice);

    /// Take down a toast shown by [`show_notice`](Self::show_notice).
    fn hide_notice(&mut self, id: NoticeId);

    /// Mark a variant's add-to-cart control as sold out.
    fn mark_sold_out(&mut self, variant_id: VariantId);

    /// Show or hide the drawer.
    fn set_open(&mut self, open: bool);
}
