//! In-memory drawer document.
//!
//! [`DrawerDocument`] is a [`CartView`] that keeps the drawer as plain data.
//! Every row is a node with a stable [`NodeId`] and a revision counter, so
//! callers can tell which rows a reconcile pass actually touched. It renders
//! to HTML using the same hooks a theme would.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use cart_core::shipping::FreeShippingProgress;
use cart_core::{LineItemKey, VariantId};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::undo::UndoRecord;
use crate::view::{
    Aggregates, CartView, Notice, NoticeId, RenderedRow, RowModel, RowPatch, DRAWER_ATTR, DRAWER_COUNT_ID,
    ITEM_KEY_ATTR, SUBTOTAL_ID,
};

/// Removal transitions kept for inspection, newest last.
const TRANSITION_LOG: usize = 32;

/// Identity of a rendered node. Never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u64);

/// One line row in the drawer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawerRow {
    pub node: NodeId,
    pub model: RowModel,
    /// Number of patches applied since insertion.
    pub revision: u32,
}

impl DrawerRow {
    pub fn loading(&self) -> bool {
        self.model.disabled
    }
}

/// Undo bar contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoBanner {
    pub record: UndoRecord,
    /// Armed records including this one.
    pub pending: usize,
}

/// A row that played its removal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub node: NodeId,
    pub key: LineItemKey,
}

/// The drawer as data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrawerDocument {
    rows: Vec<DrawerRow>,
    next_node: u64,
    item_count: u32,
    subtotal: String,
    discount: Option<String>,
    shipping: Option<FreeShippingProgress>,
    checkout_enabled: bool,
    empty_visible: bool,
    undo: Option<UndoBanner>,
    notices: Vec<Notice>,
    sold_out: BTreeSet<VariantId>,
    open: bool,
    transitions: VecDeque<Transition>,
    mutations: u64,
}

impl DrawerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[DrawerRow] {
        &self.rows
    }

    pub fn row(&self, key: &LineItemKey) -> Option<&DrawerRow> {
        self.rows.iter().find(|row| &row.model.key == key)
    }

    /// Keys in page order.
    pub fn keys(&self) -> Vec<LineItemKey> {
        self.rows.iter().map(|row| row.model.key.clone()).collect()
    }

    /// Value of both count badges.
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn subtotal(&self) -> &str {
        &self.subtotal
    }

    pub fn discount(&self) -> Option<&str> {
        self.discount.as_deref()
    }

    pub fn shipping(&self) -> Option<&FreeShippingProgress> {
        self.shipping.as_ref()
    }

    pub fn checkout_enabled(&self) -> bool {
        self.checkout_enabled
    }

    pub fn is_empty_state(&self) -> bool {
        self.empty_visible
    }

    pub fn undo(&self) -> Option<&UndoBanner> {
        self.undo.as_ref()
    }

    /// Notices currently up, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn is_sold_out(&self, variant_id: VariantId) -> bool {
        self.sold_out.contains(&variant_id)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The most recent removal transitions, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Count of mutating calls received.
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    fn allocate(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn detach(&mut self, index: usize) {
        let row = self.rows.remove(index);
        if self.transitions.len() == TRANSITION_LOG {
            self.transitions.pop_front();
        }
        self.transitions.push_back(Transition {
            node: row.node,
            key: row.model.key,
        });
    }

    /// Render the drawer markup.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            r#"<div {DRAWER_ATTR} class="cart-drawer{}" aria-hidden="{}">"#,
            if self.open { " is-open" } else { "" },
            !self.open
        );
        let _ = write!(
            html,
            r#"<span id="{DRAWER_COUNT_ID}" class="cart-count">{}</span>"#,
            self.item_count
        );

        if self.empty_visible {
            html.push_str(r#"<div class="cart-empty">Your cart is empty</div>"#);
        } else {
            html.push_str(r#"<ul class="cart-items">"#);
            for row in &self.rows {
                render_row(&mut html, row);
            }
            html.push_str("</ul>");
        }

        if let Some(discount) = &self.discount {
            let _ = write!(html, r#"<span class="cart-discount">-{}</span>"#, escape(discount));
        }
        let _ = write!(
            html,
            r#"<span id="{SUBTOTAL_ID}">{}</span>"#,
            escape(&self.subtotal)
        );
        if let Some(shipping) = &self.shipping {
            let _ = write!(
                html,
                r#"<div class="free-shipping{}"><div class="free-shipping__bar" style="width: {}%"></div><p>{}</p></div>"#,
                if shipping.qualified { " is-qualified" } else { "" },
                shipping.percent,
                escape(&shipping.message())
            );
        }
        let _ = write!(
            html,
            r#"<button class="cart-checkout"{}>Check out</button>"#,
            if self.checkout_enabled { "" } else { " disabled" }
        );
        if let Some(banner) = &self.undo {
            let _ = write!(
                html,
                r#"<div class="cart-undo" data-undo-key="{}">{} removed <button>Undo</button></div>"#,
                escape(banner.record.key.as_str()),
                escape(&banner.record.product_title)
            );
        }
        html.push_str("</div>");
        html
    }

    /// A short plain-text rendering for terminals.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.empty_visible || self.rows.is_empty() {
            out.push_str("Your cart is empty\n");
        }
        for row in &self.rows {
            let model = &row.model;
            let title = match &model.variant_title {
                Some(variant) => format!("{} ({variant})", model.product_title),
                None => model.product_title.clone(),
            };
            let _ = writeln!(
                out,
                "{:>3} x {:<40} {:>12}{}",
                model.quantity,
                title,
                model.line_price_text,
                if row.loading() { "  …" } else { "" }
            );
        }
        if let Some(discount) = &self.discount {
            let _ = writeln!(out, "Discount: -{discount}");
        }
        let _ = writeln!(out, "Subtotal: {} ({} items)", self.subtotal, self.item_count);
        if let Some(shipping) = &self.shipping {
            let _ = writeln!(out, "{} [{}%]", shipping.message(), shipping.percent);
        }
        out
    }
}

fn render_row(html: &mut String, row: &DrawerRow) {
    let model = &row.model;
    let _ = write!(
        html,
        r#"<li class="cart-item{}" {ITEM_KEY_ATTR}="{}" data-variant-id="{}">"#,
        if model.disabled { " is-loading" } else { "" },
        escape(model.key.as_str()),
        model.variant_id
    );
    if let Some(image) = &model.image_url {
        let _ = write!(html, r#"<img src="{}" alt="">"#, escape(image));
    }
    let _ = write!(
        html,
        r#"<span class="cart-item__title">{}</span>"#,
        escape(&model.product_title)
    );
    if let Some(variant) = &model.variant_title {
        let _ = write!(html, r#"<span class="cart-item__variant">{}</span>"#, escape(variant));
    }
    let disabled = if model.disabled { " disabled" } else { "" };
    let _ = write!(
        html,
        r#"<button data-action="decrement"{disabled}>-</button><input type="number" value="{}"{disabled}><button data-action="increment"{disabled}>+</button><button data-action="remove"{disabled}>Remove</button>"#,
        model.quantity
    );
    let _ = write!(
        html,
        r#"<span class="cart-item__price">{}</span></li>"#,
        escape(&model.line_price_text)
    );
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

impl CartView for DrawerDocument {
    fn rendered_rows(&self) -> Vec<RenderedRow> {
        self.rows
            .iter()
            .map(|row| RenderedRow {
                key: row.model.key.clone(),
                quantity: row.model.quantity,
                line_price: row.model.line_price,
                disabled: row.model.disabled,
            })
            .collect()
    }

    fn showing_empty(&self) -> bool {
        self.empty_visible
    }

    fn insert_row(&mut self, index: usize, row: &RowModel) {
        self.mutations += 1;
        let node = self.allocate();
        let index = index.min(self.rows.len());
        self.rows.insert(
            index,
            DrawerRow {
                node,
                model: row.clone(),
                revision: 0,
            },
        );
    }

    fn patch_row(&mut self, key: &LineItemKey, patch: &RowPatch) {
        self.mutations += 1;
        let Some(row) = self.rows.iter_mut().find(|row| &row.model.key == key) else {
            return;
        };
        if let Some(quantity) = patch.quantity {
            row.model.quantity = quantity;
        }
        if let Some((cents, text)) = &patch.line_price {
            row.model.line_price = *cents;
            row.model.line_price_text = text.clone();
        }
        if let Some(disabled) = patch.disabled {
            row.model.disabled = disabled;
        }
        row.revision += 1;
    }

    fn remove_row(&mut self, key: &LineItemKey) {
        self.mutations += 1;
        if let Some(index) = self.rows.iter().position(|row| &row.model.key == key) {
            self.detach(index);
        }
    }

    fn move_row(&mut self, key: &LineItemKey, index: usize) {
        self.mutations += 1;
        let Some(from) = self.rows.iter().position(|row| &row.model.key == key) else {
            return;
        };
        let row = self.rows.remove(from);
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    fn render_aggregates(&mut self, aggregates: &Aggregates) {
        self.mutations += 1;
        self.item_count = aggregates.item_count;
        self.subtotal = aggregates.subtotal_text.clone();
        self.discount = aggregates.discount_text.clone();
        self.shipping = aggregates.shipping;
        self.checkout_enabled = aggregates.checkout_enabled;
    }

    fn show_empty(&mut self, aggregates: &Aggregates) {
        while !self.rows.is_empty() {
            self.detach(0);
        }
        self.render_aggregates(aggregates);
        self.empty_visible = true;
    }

    fn hide_empty(&mut self) {
        self.mutations += 1;
        self.empty_visible = false;
    }

    fn show_undo(&mut self, record: &UndoRecord, pending: usize) {
        self.mutations += 1;
        self.undo = Some(UndoBanner {
            record: record.clone(),
            pending,
        });
    }

    fn hide_undo(&mut self) {
        self.mutations += 1;
        self.undo = None;
    }

    fn show_notice(&mut self, notice: &Notice) {
        self.mutations += 1;
        self.notices.push(notice.clone());
    }

    fn hide_notice(&mut self, id: NoticeId) {
        self.mutations += 1;
        self.notices.retain(|notice| notice.id != id);
    }

    fn mark_sold_out(&mut self, variant_id: VariantId) {
        self.mutations += 1;
        self.sold_out.insert(variant_id);
    }

    fn set_open(&mut self, open: bool) {
        self.mutations += 1;
        self.open = open;
    }
}

/// A [`DrawerDocument`] shared between the controller and its owner.
#[derive(Debug, Clone, Default)]
pub struct DrawerHandle {
    inner: Arc<Mutex<DrawerDocument>>,
}

impl DrawerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the document for reading. Do not hold the guard across a
    /// controller call.
    pub fn document(&self) -> MutexGuard<'_, DrawerDocument> {
        self.inner.lock()
    }
}

impl CartView for DrawerHandle {
    fn rendered_rows(&self) -> Vec<RenderedRow> {
        self.inner.lock().rendered_rows()
    }

    fn showing_empty(&self) -> bool {
        self.inner.lock().showing_empty()
    }

    fn insert_row(&mut self, index: usize, row: &RowModel) {
        self.inner.lock().insert_row(index, row);
    }

    fn patch_row(&mut self, key: &LineItemKey, patch: &RowPatch) {
        self.inner.lock().patch_row(key, patch);
    }

    fn remove_row(&mut self, key: &LineItemKey) {
        self.inner.lock().remove_row(key);
    }

    fn move_row(&mut self, key: &LineItemKey, index: usize) {
        self.inner.lock().move_row(key, index);
    }

    fn render_aggregates(&mut self, aggregates: &Aggregates) {
        self.inner.lock().render_aggregates(aggregates);
    }

    fn show_empty(&mut self, aggregates: &Aggregates) {
        self.inner.lock().show_empty(aggregates);
    }

    fn hide_empty(&mut self) {
        self.inner.lock().hide_empty();
    }

    fn show_undo(&mut self, record: &UndoRecord, pending: usize) {
        self.inner.lock().show_undo(record, pending);
    }

    fn hide_undo(&mut self) {
        self.inner.lock().hide_undo();
    }

    fn show_notice(&mut self, notice: &Notice) {
        self.inner.lock().show_notice(notice);
    }

    fn hide_notice(&mut self, id: NoticeId) {
        self.inner.lock().hide_notice(id);
    }

    fn mark_sold_out(&mut self, variant_id: VariantId) {
        self.inner.lock().mark_sold_out(variant_id);
    }

    fn set_open(&mut self, open: bool) {
        self.inner.lock().set_open(open);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Reconciler;
    use cart_core::{CartSnapshot, Currency, LineItem};
    use std::collections::HashSet;

    fn item(key: &str, variant: u64, quantity: u32, unit: i64) -> LineItem {
        LineItem {
            key: LineItemKey::new(key),
            variant_id: VariantId::new(variant),
            quantity,
            final_price: unit,
            final_line_price: unit * i64::from(quantity),
            product_title: format!("Product {key}"),
            variant_title: None,
            image_url: None,
        }
    }

    fn snapshot(items: Vec<LineItem>) -> CartSnapshot {
        CartSnapshot {
            item_count: items.iter().map(|i| i.quantity).sum(),
            total_price: items.iter().map(|i| i.final_line_price).sum(),
            currency: Currency::USD,
            items,
            ..CartSnapshot::default()
        }
    }

    #[test]
    fn test_untouched_rows_keep_identity() {
        let reconciler = Reconciler::new(5000);
        let mut doc = DrawerDocument::new();
        let none = HashSet::new();
        reconciler.reconcile(
            &mut doc,
            &snapshot(vec![item("A", 1, 1, 1000), item("B", 2, 1, 500)]),
            &none,
        );
        let b_before = doc.row(&LineItemKey::new("B")).cloned().unwrap();

        let stats = reconciler.reconcile(
            &mut doc,
            &snapshot(vec![item("A", 1, 3, 1000), item("B", 2, 1, 500)]),
            &none,
        );

        assert_eq!(stats.patched, 1);
        assert_eq!(stats.untouched, 1);
        assert_eq!(doc.row(&LineItemKey::new("B")), Some(&b_before));
        assert_eq!(doc.row(&LineItemKey::new("A")).unwrap().revision, 1);
        assert_eq!(doc.item_count(), 4);
        assert_eq!(doc.subtotal(), "$35.00");
    }

    #[test]
    fn test_insert_follows_snapshot_order() {
        let reconciler = Reconciler::new(0);
        let mut doc = DrawerDocument::new();
        let none = HashSet::new();
        reconciler.reconcile(&mut doc, &snapshot(vec![item("A", 1, 1, 100), item("C", 3, 1, 100)]), &none);
        reconciler.reconcile(
            &mut doc,
            &snapshot(vec![item("A", 1, 1, 100), item("B", 2, 1, 100), item("C", 3, 1, 100)]),
            &none,
        );
        assert_eq!(
            doc.keys(),
            vec![LineItemKey::new("A"), LineItemKey::new("B"), LineItemKey::new("C")]
        );
    }

    #[test]
    fn test_reordered_snapshot_moves_rows() {
        let reconciler = Reconciler::new(0);
        let mut doc = DrawerDocument::new();
        let none = HashSet::new();
        reconciler.reconcile(&mut doc, &snapshot(vec![item("A", 1, 1, 100), item("B", 2, 1, 100)]), &none);
        let a_before = doc.row(&LineItemKey::new("A")).cloned().unwrap();
        let b_before = doc.row(&LineItemKey::new("B")).cloned().unwrap();

        let stats = reconciler.reconcile(
            &mut doc,
            &snapshot(vec![item("C", 3, 1, 100), item("B", 2, 1, 100), item("A", 1, 1, 100)]),
            &none,
        );

        assert_eq!(
            doc.keys(),
            vec![LineItemKey::new("C"), LineItemKey::new("B"), LineItemKey::new("A")]
        );
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.patched, 0);
        assert_eq!(stats.untouched, 1);
        // Moved rows keep their node and are not re-rendered.
        assert_eq!(doc.row(&LineItemKey::new("A")), Some(&a_before));
        assert_eq!(doc.row(&LineItemKey::new("B")), Some(&b_before));
    }

    #[test]
    fn test_transition_log_is_bounded() {
        let reconciler = Reconciler::new(0);
        let mut doc = DrawerDocument::new();
        let none = HashSet::new();
        for round in 0..(TRANSITION_LOG as u64 + 5) {
            let key = format!("K{round}");
            reconciler.reconcile(&mut doc, &snapshot(vec![item(&key, round, 1, 100)]), &none);
        }
        assert_eq!(doc.transitions().count(), TRANSITION_LOG);
        let newest = doc.transitions().last().unwrap();
        assert_eq!(newest.key.as_str(), format!("K{}", TRANSITION_LOG + 3));
    }

    #[test]
    fn test_hide_notice_by_id() {
        let mut doc = DrawerDocument::new();
        let first = Notice::success("Added to cart");
        let second = Notice::success("Added to cart");
        doc.show_notice(&first);
        doc.show_notice(&second);
        doc.hide_notice(first.id);
        assert_eq!(doc.notices(), &[second]);
    }

    #[test]
    fn test_empty_state_roundtrip() {
        let reconciler = Reconciler::new(5000);
        let mut doc = DrawerDocument::new();
        let none = HashSet::new();
        reconciler.reconcile(&mut doc, &snapshot(vec![item("A", 1, 1, 100)]), &none);
        reconciler.reconcile(&mut doc, &snapshot(vec![]), &none);

        assert!(doc.is_empty_state());
        assert!(doc.rows().is_empty());
        assert!(!doc.checkout_enabled());
        assert_eq!(doc.transitions().count(), 1);
        assert!(doc.to_html().contains("Your cart is empty"));

        reconciler.reconcile(&mut doc, &snapshot(vec![item("B", 2, 1, 100)]), &none);
        assert!(!doc.is_empty_state());
        assert_eq!(doc.rows().len(), 1);
    }

    #[test]
    fn test_html_keeps_page_hooks() {
        let reconciler = Reconciler::new(5000);
        let mut doc = DrawerDocument::new();
        let mut line = item("42:abc", 42, 2, 1250);
        line.product_title = "Tea & <Cups>".into();
        reconciler.reconcile(&mut doc, &snapshot(vec![line]), &HashSet::new());

        let html = doc.to_html();
        assert!(html.contains("data-cart-drawer"));
        assert!(html.contains(r#"data-item-key="42:abc""#));
        assert!(html.contains(r#"<span id="cart-drawer-count" class="cart-count">2</span>"#));
        assert!(html.contains(r#"<span id="cart-subtotal">$25.00</span>"#));
        assert!(html.contains("Tea &amp; &lt;Cups&gt;"));
        assert!(html.contains("width: 50%"));
    }

    #[test]
    fn test_loading_rows_render_disabled() {
        let reconciler = Reconciler::new(0);
        let mut doc = DrawerDocument::new();
        let pending: HashSet<_> = [LineItemKey::new("A")].into_iter().collect();
        reconciler.reconcile(&mut doc, &snapshot(vec![item("A", 1, 1, 100)]), &pending);

        assert!(doc.row(&LineItemKey::new("A")).unwrap().loading());
        assert!(doc.to_html().contains("is-loading"));
    }

    #[test]
    fn test_handle_shares_document() {
        let handle = DrawerHandle::new();
        let mut writer = handle.clone();
        writer.set_open(true);
        assert!(handle.document().is_open());
    }
}
