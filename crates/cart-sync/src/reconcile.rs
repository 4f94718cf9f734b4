//! Drawer reconciliation.
//!
//! [`plan`] compares what the view shows with a new snapshot and the set of
//! lines with an operation in flight, and produces the smallest list of row
//! operations that makes them agree. [`Reconciler::reconcile`] applies a
//! plan. Everything else that writes to the view (undo bar, toasts, sold-out
//! markers, open state) also lives here so the view has a single writer.

use std::collections::{HashMap, HashSet};

use cart_core::{CartSnapshot, LineItem, LineItemKey, VariantId};
use tracing::trace;

use crate::undo::UndoRecord;
use crate::view::{Aggregates, CartView, Notice, NoticeId, RenderedRow, RowModel, RowPatch};

/// What the view currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub rows: Vec<RenderedRow>,
    pub showing_empty: bool,
}

impl ViewState {
    /// Read the state back from a view.
    pub fn read(view: &dyn CartView) -> Self {
        Self {
            rows: view.rendered_rows(),
            showing_empty: view.showing_empty(),
        }
    }
}

/// One change to the rendered rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOp {
    Remove(LineItemKey),
    Patch(LineItemKey, RowPatch),
    /// Detach the row and re-attach it at `index` among the remaining rows.
    Move(LineItemKey, usize),
    Insert(usize, RowModel),
}

/// The full set of changes for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// The cart is empty: detach everything and show the placeholder.
    Empty(Aggregates),
    /// Row-level changes followed by an aggregate refresh.
    Rows {
        hide_empty: bool,
        ops: Vec<RowOp>,
        aggregates: Aggregates,
    },
}

/// Counts of what a reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub patched: usize,
    pub removed: usize,
    pub moved: usize,
    pub untouched: usize,
}

/// Compute the minimal changes that make `current` match `snapshot`.
pub fn plan(
    current: &ViewState,
    snapshot: &CartSnapshot,
    pending: &HashSet<LineItemKey>,
    free_shipping_threshold: i64,
) -> ReconcilePlan {
    let aggregates = Aggregates::from_snapshot(snapshot, free_shipping_threshold);
    if snapshot.item_count == 0 {
        return ReconcilePlan::Empty(aggregates);
    }

    let incoming: HashMap<&LineItemKey, &LineItem> =
        snapshot.items.iter().map(|item| (&item.key, item)).collect();
    let rendered: HashMap<&LineItemKey, &RenderedRow> =
        current.rows.iter().map(|row| (&row.key, row)).collect();

    let mut ops = Vec::new();

    for row in &current.rows {
        if !incoming.contains_key(&row.key) {
            ops.push(RowOp::Remove(row.key.clone()));
        }
    }

    // Rows that survive, in page order. Those on the longest run already in
    // snapshot order stay put; every other row is moved.
    let mut attached: Vec<&LineItemKey> = current
        .rows
        .iter()
        .map(|row| &row.key)
        .filter(|key| incoming.contains_key(key))
        .collect();
    let position: HashMap<&LineItemKey, usize> = snapshot
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| (&item.key, index))
        .collect();
    let order: Vec<usize> = attached.iter().map(|key| position[key]).collect();
    let stable: HashSet<&LineItemKey> = longest_increasing(&order)
        .into_iter()
        .map(|index| attached[index])
        .collect();

    for (index, item) in snapshot.items.iter().enumerate() {
        let disabled = pending.contains(&item.key);
        // Everything is placed right after its predecessor in the snapshot.
        let after = match index {
            0 => 0,
            _ => attached
                .iter()
                .position(|key| *key == &snapshot.items[index - 1].key)
                .map_or(0, |at| at + 1),
        };
        match rendered.get(&item.key) {
            Some(row) => {
                if !stable.contains(&item.key) {
                    if let Some(from) = attached.iter().position(|key| *key == &item.key) {
                        attached.remove(from);
                        let to = if from < after { after - 1 } else { after };
                        attached.insert(to, &item.key);
                        if to != from {
                            ops.push(RowOp::Move(item.key.clone(), to));
                        }
                    }
                }
                let patch = diff_row(row, item, snapshot, disabled);
                if !patch.is_empty() {
                    ops.push(RowOp::Patch(item.key.clone(), patch));
                }
            }
            None => {
                attached.insert(after, &item.key);
                ops.push(RowOp::Insert(
                    after,
                    RowModel::from_item(item, snapshot, disabled),
                ));
            }
        }
    }

    ReconcilePlan::Rows {
        hide_empty: current.showing_empty,
        ops,
        aggregates,
    }
}

/// Indices of one longest strictly increasing subsequence of `values`.
fn longest_increasing(values: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k+1.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];
    for (index, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < value);
        previous[index] = slot.checked_sub(1).map(|before| tails[before]);
        if slot == tails.len() {
            tails.push(index);
        } else {
            tails[slot] = index;
        }
    }
    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(index) = cursor {
        run.push(index);
        cursor = previous[index];
    }
    run.reverse();
    run
}

fn diff_row(row: &RenderedRow, item: &LineItem, snapshot: &CartSnapshot, disabled: bool) -> RowPatch {
    RowPatch {
        quantity: (row.quantity != item.quantity).then_some(item.quantity),
        line_price: (row.line_price != item.final_line_price).then(|| {
            (
                item.final_line_price,
                item.line_price(snapshot.currency).display(),
            )
        }),
        disabled: (row.disabled != disabled).then_some(disabled),
    }
}

/// Applies snapshots and UI state to a [`CartView`].
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    free_shipping_threshold: i64,
}

impl Reconciler {
    pub fn new(free_shipping_threshold: i64) -> Self {
        Self {
            free_shipping_threshold,
        }
    }

    /// Bring the view in line with `snapshot` and the pending lines.
    pub fn reconcile(
        &self,
        view: &mut dyn CartView,
        snapshot: &CartSnapshot,
        pending: &HashSet<LineItemKey>,
    ) -> ReconcileStats {
        let current = ViewState::read(view);
        let plan = plan(&current, snapshot, pending, self.free_shipping_threshold);
        let stats = apply(view, &current, plan);
        trace!(
            inserted = stats.inserted,
            patched = stats.patched,
            removed = stats.removed,
            moved = stats.moved,
            untouched = stats.untouched,
            "drawer reconciled"
        );
        stats
    }

    /// Show or hide the undo affordance for the newest armed record.
    pub fn render_undo(&self, view: &mut dyn CartView, latest: Option<&UndoRecord>, armed: usize) {
        match latest {
            Some(record) => view.show_undo(record, armed),
            None => view.hide_undo(),
        }
    }

    pub fn render_notice(&self, view: &mut dyn CartView, notice: &Notice) {
        view.show_notice(notice);
    }

    pub fn dismiss_notice(&self, view: &mut dyn CartView, id: NoticeId) {
        view.hide_notice(id);
    }

    pub fn render_sold_out(&self, view: &mut dyn CartView, variant_id: VariantId) {
        view.mark_sold_out(variant_id);
    }

    pub fn render_open(&self, view: &mut dyn CartView, open: bool) {
        view.set_open(open);
    }
}

fn apply(view: &mut dyn CartView, current: &ViewState, plan: ReconcilePlan) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    match plan {
        ReconcilePlan::Empty(aggregates) => {
            stats.removed = current.rows.len();
            view.show_empty(&aggregates);
        }
        ReconcilePlan::Rows {
            hide_empty,
            ops,
            aggregates,
        } => {
            if hide_empty {
                view.hide_empty();
            }
            let mut touched = HashSet::new();
            for op in ops {
                match op {
                    RowOp::Remove(key) => {
                        view.remove_row(&key);
                        stats.removed += 1;
                    }
                    RowOp::Patch(key, patch) => {
                        view.patch_row(&key, &patch);
                        stats.patched += 1;
                        touched.insert(key);
                    }
                    RowOp::Move(key, index) => {
                        view.move_row(&key, index);
                        stats.moved += 1;
                        touched.insert(key);
                    }
                    RowOp::Insert(index, row) => {
                        view.insert_row(index, &row);
                        stats.inserted += 1;
                    }
                }
            }
            stats.untouched = current.rows.len() - stats.removed - touched.len();
            view.render_aggregates(&aggregates);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::{Currency, VariantId};
    use pretty_assertions::assert_eq;

    fn item(key: &str, quantity: u32, unit: i64) -> LineItem {
        LineItem {
            key: LineItemKey::new(key),
            variant_id: VariantId::new(1),
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

    fn rendered(key: &str, quantity: u32, unit: i64) -> RenderedRow {
        RenderedRow {
            key: LineItemKey::new(key),
            quantity,
            line_price: unit * i64::from(quantity),
            disabled: false,
        }
    }

    #[test]
    fn test_plan_minimal_ops() {
        let current = ViewState {
            rows: vec![rendered("A", 1, 1000), rendered("B", 1, 500), rendered("C", 2, 300)],
            showing_empty: false,
        };
        let next = snapshot(vec![item("A", 2, 1000), item("C", 2, 300), item("D", 1, 700)]);

        let ReconcilePlan::Rows { ops, hide_empty, .. } =
            plan(&current, &next, &HashSet::new(), 5000)
        else {
            panic!("expected row plan");
        };

        assert!(!hide_empty);
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], RowOp::Remove(LineItemKey::new("B")));
        assert_eq!(
            ops[1],
            RowOp::Patch(
                LineItemKey::new("A"),
                RowPatch {
                    quantity: Some(2),
                    line_price: Some((2000, "$20.00".to_string())),
                    disabled: None,
                }
            )
        );
        match &ops[2] {
            RowOp::Insert(index, row) => {
                assert_eq!(*index, 2);
                assert_eq!(row.key.as_str(), "D");
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn test_reorder_moves_only_out_of_place_rows() {
        let current = ViewState {
            rows: vec![rendered("A", 1, 100), rendered("B", 1, 100)],
            showing_empty: false,
        };
        let next = snapshot(vec![item("C", 1, 100), item("B", 1, 100), item("A", 1, 100)]);

        let ReconcilePlan::Rows { ops, .. } = plan(&current, &next, &HashSet::new(), 0) else {
            panic!("expected row plan");
        };
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RowOp::Insert(0, row) if row.key.as_str() == "C"));
        assert_eq!(ops[1], RowOp::Move(LineItemKey::new("A"), 2));
    }

    #[test]
    fn test_rotation_is_one_move() {
        let current = ViewState {
            rows: vec![rendered("A", 1, 100), rendered("B", 1, 100), rendered("C", 1, 100)],
            showing_empty: false,
        };
        let next = snapshot(vec![item("B", 1, 100), item("C", 1, 100), item("A", 1, 100)]);

        let ReconcilePlan::Rows { ops, .. } = plan(&current, &next, &HashSet::new(), 0) else {
            panic!("expected row plan");
        };
        assert_eq!(ops, vec![RowOp::Move(LineItemKey::new("A"), 2)]);
    }

    #[test]
    fn test_longest_increasing() {
        assert_eq!(longest_increasing(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing(&[2, 1]).len(), 1);
        assert_eq!(longest_increasing(&[3, 0, 1, 4, 2]), vec![1, 2, 4]);
    }

    #[test]
    fn test_pending_only_patches_disabled() {
        let current = ViewState {
            rows: vec![rendered("A", 1, 1000)],
            showing_empty: false,
        };
        let next = snapshot(vec![item("A", 1, 1000)]);
        let pending: HashSet<_> = [LineItemKey::new("A")].into_iter().collect();

        let ReconcilePlan::Rows { ops, .. } = plan(&current, &next, &pending, 0) else {
            panic!("expected row plan");
        };
        assert_eq!(
            ops,
            vec![RowOp::Patch(
                LineItemKey::new("A"),
                RowPatch {
                    disabled: Some(true),
                    ..RowPatch::default()
                }
            )]
        );
    }

    #[test]
    fn test_empty_snapshot_short_circuits() {
        let current = ViewState {
            rows: vec![rendered("A", 1, 1000)],
            showing_empty: false,
        };
        let plan = plan(&current, &snapshot(vec![]), &HashSet::new(), 5000);
        match plan {
            ReconcilePlan::Empty(aggregates) => {
                assert_eq!(aggregates.item_count, 0);
                assert!(!aggregates.checkout_enabled);
            }
            other => panic!("expected empty plan, got {other:?}"),
        }
    }

    #[test]
    fn test_leaving_empty_state_hides_placeholder() {
        let current = ViewState {
            rows: vec![],
            showing_empty: true,
        };
        let ReconcilePlan::Rows { hide_empty, ops, .. } =
            plan(&current, &snapshot(vec![item("A", 1, 100)]), &HashSet::new(), 0)
        else {
            panic!("expected row plan");
        };
        assert!(hide_empty);
        assert!(matches!(ops[0], RowOp::Insert(0, _)));
    }

    #[test]
    fn test_aggregates_include_discount_and_shipping() {
        let mut next = snapshot(vec![item("A", 2, 2500)]);
        next.total_discount = 500;
        next.total_price = 4500;
        let aggregates = Aggregates::from_snapshot(&next, 5000);
        assert_eq!(aggregates.subtotal_text, "$45.00");
        assert_eq!(aggregates.discount_text.as_deref(), Some("$5.00"));
        let shipping = aggregates.shipping.unwrap();
        assert_eq!(shipping.percent, 90);
        assert!(!shipping.qualified);
    }
}
