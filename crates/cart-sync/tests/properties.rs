//! Behavioral guarantees of the drawer controller.

mod common;

use std::time::Duration;

use cart_client::{CartApi, Endpoint};
use cart_core::CartError;
use cart_sync::view::RowModel;
use cart_sync::CartView;
use common::*;
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn test_removing_twice_only_removes_once() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_line(SOCKS, 2));
    h.cart.refresh().await.unwrap();

    let after_first = h.cart.remove(&key("A")).await.unwrap();
    assert_eq!(after_first.item_count, 2);

    let after_second = h.cart.remove(&key("A")).await.unwrap();
    assert_eq!(after_second.item_count, 2);
    assert_eq!(h.server.request_count(Endpoint::Change), 1);
}

#[tokio::test(start_paused = true)]
async fn test_removing_line_gone_on_server_is_a_server_error() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_line(SOCKS, 2));
    h.cart.refresh().await.unwrap();

    // Another tab removes the line behind our back.
    h.server.change_line_item(&key("A"), 0).await.unwrap();

    let err = h.cart.remove(&key("A")).await.unwrap_err();
    assert!(matches!(err, CartError::Server { status: 400, .. }));
    assert_eq!(h.quantity("A"), Some(1));
    assert!(h.cart.undo_records().is_empty());
    assert_eq!(h.notices(), vec!["no valid id or line parameter".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_undo_restores_exact_line() {
    let h = Harness::new(catalog().with_line(SHIRT, 3));
    h.cart.refresh().await.unwrap();

    let removed = h.cart.remove(&key("A")).await.unwrap();
    assert_eq!(removed.item_count, 0);
    assert!(h.drawer.document().is_empty_state());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let restored = h.cart.undo().await.unwrap().expect("an armed undo");

    assert_eq!(restored.items.len(), 1);
    let line = &restored.items[0];
    assert_eq!(line.key, key("A"));
    assert_eq!(line.quantity, 3);
    assert_eq!(h.server.snapshot().items.len(), 1);

    let doc = h.drawer.document();
    assert!(doc.undo().is_none());
    assert_eq!(doc.row(&key("A")).unwrap().model.quantity, 3);
    assert_eq!(doc.last_notice().unwrap().message, "Item restored to cart");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_increments_on_one_line_both_apply() {
    let h = Harness::new(catalog().with_line(SHIRT, 1));
    h.cart.refresh().await.unwrap();
    h.server.set_latency(Duration::from_millis(50));

    let a = key("A");
    let (first, second) = tokio::join!(h.cart.increment(&a), h.cart.increment(&a));

    assert_eq!(first.unwrap().quantity_of(&a), Some(2));
    assert_eq!(second.unwrap().quantity_of(&a), Some(3));
    assert_eq!(h.quantity("A"), Some(3));
    assert_eq!(h.server.snapshot().quantity_of(&a), Some(3));

    let targets: Vec<_> = h
        .server
        .requests()
        .into_iter()
        .filter(|r| r.endpoint == Endpoint::Change)
        .map(|r| r.quantity)
        .collect();
    assert_eq!(targets, vec![Some(2), Some(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_touches_only_changed_rows() {
    let h = Harness::new(
        catalog()
            .with_line(SHIRT, 1)
            .with_line(SOCKS, 1)
            .with_line(TOTE, 1),
    );
    h.cart.refresh().await.unwrap();

    let (row_a, row_b, row_c) = {
        let doc = h.drawer.document();
        (
            doc.row(&key("A")).cloned().unwrap(),
            doc.row(&key("B")).cloned().unwrap(),
            doc.row(&key("C")).cloned().unwrap(),
        )
    };

    h.server.change_line_item(&key("A"), 2).await.unwrap();
    h.server.change_line_item(&key("B"), 0).await.unwrap();
    h.server.add_line_item(variant(MUG), 1).await.unwrap();
    h.cart.refresh().await.unwrap();

    let doc = h.drawer.document();
    assert_eq!(doc.keys(), vec![key("A"), key("C"), key("D")]);

    // C untouched: same node, no patches.
    assert_eq!(doc.row(&key("C")), Some(&row_c));

    // A patched in place.
    let a = doc.row(&key("A")).unwrap();
    assert_eq!(a.node, row_a.node);
    assert_eq!(a.revision, row_a.revision + 1);
    assert_eq!(a.model.quantity, 2);
    assert_eq!(a.model.line_price_text, "$90.00");

    // B detached through its transition, D is a fresh node.
    assert!(doc.transitions().any(|t| t.node == row_b.node));
    let d = doc.row(&key("D")).unwrap();
    assert!(![row_a.node, row_b.node, row_c.node].contains(&d.node));
    assert_eq!(d.model.variant_title.as_deref(), Some("Blue"));
}

#[tokio::test(start_paused = true)]
async fn test_free_shipping_exactly_at_threshold() {
    let h = Harness::new(catalog().with_line(GIFT_BOX, 1));
    h.cart.refresh().await.unwrap();

    let doc = h.drawer.document();
    let shipping = doc.shipping().unwrap();
    assert_eq!(shipping.percent, 100);
    assert!(shipping.qualified);
    assert!(shipping.remaining.is_zero());

    let html = doc.to_html();
    assert!(html.contains("You qualify for free shipping!"));
    assert!(!html.contains("more for free shipping"));
    assert!(html.contains("width: 100%"));
}

#[tokio::test(start_paused = true)]
async fn test_free_shipping_below_threshold() {
    let h = Harness::new(catalog().with_line(TOTE, 1));
    h.cart.refresh().await.unwrap();

    let doc = h.drawer.document();
    let shipping = doc.shipping().unwrap();
    assert_eq!(shipping.percent, 50);
    assert!(!shipping.qualified);
    assert_eq!(shipping.message(), "Add $25.00 more for free shipping!");
}

#[tokio::test(start_paused = true)]
async fn test_empty_cart_clears_stale_rows() {
    let h = Harness::new(catalog());

    // Rows left over from an earlier page state the controller never saw.
    let mut stale = h.drawer.clone();
    for (index, name) in ["X", "Y"].into_iter().enumerate() {
        stale.insert_row(
            index,
            &RowModel {
                key: key(name),
                variant_id: variant(1),
                product_title: name.to_string(),
                variant_title: None,
                image_url: None,
                quantity: 1,
                line_price: 100,
                line_price_text: "$1.00".to_string(),
                disabled: false,
            },
        );
    }

    let snapshot = h.cart.refresh().await.unwrap();
    assert_eq!(snapshot.item_count, 0);

    let doc = h.drawer.document();
    assert!(doc.is_empty_state());
    assert!(doc.rows().is_empty());
    assert_eq!(doc.item_count(), 0);
    assert_eq!(doc.subtotal(), "$0.00");
    assert!(!doc.checkout_enabled());
    assert!(doc.to_html().contains(r#"<span id="cart-drawer-count" class="cart-count">0</span>"#));
}

#[tokio::test(start_paused = true)]
async fn test_cart_emptied_by_removals_shows_placeholder() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_line(SOCKS, 1));
    h.cart.refresh().await.unwrap();

    h.cart.remove(&key("A")).await.unwrap();
    assert!(!h.drawer.document().is_empty_state());
    h.cart.remove(&key("B")).await.unwrap();

    let doc = h.drawer.document();
    assert!(doc.is_empty_state());
    assert!(doc.rows().is_empty());
}
