//! Note autosave, drawer visibility, discounts, search and subscriptions.

mod common;

use std::time::Duration;

use cart_client::{Endpoint, Fault};
use cart_core::error::GENERIC_RETRY_MESSAGE;
use cart_core::CartError;
use cart_sync::{CartEvent, NoticeLevel, SuggestOutcome};
use common::*;
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn test_note_saves_once_after_typing_pauses() {
    let h = Harness::new(catalog().with_line(SHIRT, 1));
    h.cart.refresh().await.unwrap();
    let (events, _sub) = record_events(&h.cart);

    for text in ["G", "Gi", "Gift wrap please"] {
        h.cart.note_changed(text);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(h.server.request_count(Endpoint::Update), 0);

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    assert_eq!(h.server.request_count(Endpoint::Update), 1);
    assert_eq!(h.server.snapshot().note.as_deref(), Some("Gift wrap please"));
    assert_eq!(
        h.cart.current().unwrap().note.as_deref(),
        Some("Gift wrap please")
    );
    assert!(events
        .lock()
        .contains(&CartEvent::NoteSaved(Some("Gift wrap please".to_string()))));
}

#[tokio::test(start_paused = true)]
async fn test_note_typed_behind_busy_discount_is_saved() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_discount_code("SAVE10", 10));
    h.cart.refresh().await.unwrap();
    h.server.push_latency(Duration::from_secs(2));

    // The discount holds the cart-wide slot and the explicit save fills its
    // one waiting place before the typed note comes due.
    let typing = async {
        tokio::task::yield_now().await;
        h.cart.note_changed("Gift wrap please");
        tokio::time::sleep(Duration::from_secs(4)).await;
    };
    let (discount, saved, ()) = tokio::join!(
        h.cart.apply_discount("SAVE10"),
        h.cart.update_note("Leave at the door"),
        typing,
    );

    assert!(discount.is_ok());
    assert!(saved.is_ok());
    assert_eq!(h.server.request_count(Endpoint::Update), 2);
    assert_eq!(h.server.snapshot().note.as_deref(), Some("Gift wrap please"));
    assert_eq!(
        h.cart.current().unwrap().note.as_deref(),
        Some("Gift wrap please")
    );
    assert!(h.cart.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_note_saves_immediately() {
    let h = Harness::new(catalog());
    let snapshot = h.cart.update_note("Leave at the door").await.unwrap();
    assert_eq!(snapshot.note.as_deref(), Some("Leave at the door"));
    assert_eq!(h.server.request_count(Endpoint::Update), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_and_close_toggle_once() {
    let h = Harness::new(catalog().with_line(SOCKS, 2));
    let (events, _sub) = record_events(&h.cart);

    let snapshot = h.cart.open().await.unwrap();
    assert_eq!(snapshot.item_count, 2);
    assert!(h.cart.is_open());
    assert!(h.drawer.document().is_open());
    assert_eq!(h.drawer.document().keys(), vec![key("B")]);

    h.cart.close();
    h.cart.close();
    assert!(!h.drawer.document().is_open());

    let toggles: Vec<_> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            CartEvent::DrawerToggled(open) => Some(*open),
            _ => None,
        })
        .collect();
    assert_eq!(toggles, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_disposed_subscription_hears_nothing() {
    let h = Harness::new(catalog().with_line(SHIRT, 1));
    let (kept, _kept_sub) = record_events(&h.cart);
    let (disposed, sub) = record_events(&h.cart);
    sub.dispose();

    h.cart.refresh().await.unwrap();

    assert!(disposed.lock().is_empty());
    assert!(matches!(kept.lock().as_slice(), [CartEvent::Updated(_)]));
}

#[tokio::test(start_paused = true)]
async fn test_valid_discount_code() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_discount_code("SAVE10", 10));
    h.cart.refresh().await.unwrap();
    assert_eq!(h.drawer.document().discount(), None);

    let snapshot = h.cart.apply_discount("  save10 ").await.unwrap();

    assert_eq!(snapshot.total_discount, 450);
    assert_eq!(snapshot.total_price, 4050);
    let doc = h.drawer.document();
    assert_eq!(doc.discount(), Some("$4.50"));
    assert_eq!(
        doc.last_notice().unwrap().message,
        "Discount code applied successfully!"
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_discount_code() {
    let h = Harness::new(catalog().with_line(SHIRT, 1));
    h.cart.refresh().await.unwrap();

    let err = h.cart.apply_discount("BOGUS").await.unwrap_err();

    assert!(matches!(err, CartError::Server { status: 404, .. }));
    assert_eq!(h.cart.current().unwrap().total_discount, 0);
    let doc = h.drawer.document();
    let notice = doc.last_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Invalid discount code");
}

#[tokio::test(start_paused = true)]
async fn test_discount_on_unloaded_cart_reports_failed_reload() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_discount_code("SAVE10", 10));
    h.server.inject_fault_on(Endpoint::Cart, Fault::Network);

    let err = h.cart.apply_discount("SAVE10").await.unwrap_err();

    assert!(matches!(err, CartError::Network(_)));
    assert!(h.cart.current().is_none());
    // Applied once on the server and not repeated by the retry policy.
    assert_eq!(h.server.request_count(Endpoint::Discount), 1);
    assert_eq!(h.server.request_count(Endpoint::Cart), 1);
    assert_eq!(h.server.snapshot().total_discount, 450);
    assert_eq!(h.notices(), vec![GENERIC_RETRY_MESSAGE.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_discount_keeps_loaded_cart_when_reload_fails() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_discount_code("SAVE10", 10));
    let before = h.cart.refresh().await.unwrap();
    h.server.inject_fault_on(Endpoint::Cart, Fault::Network);

    let snapshot = h.cart.apply_discount("SAVE10").await.unwrap();
    assert_eq!(snapshot, before);
}

#[tokio::test(start_paused = true)]
async fn test_notices_are_taken_down_after_their_duration() {
    let h = Harness::new(catalog().with_line(SHIRT, 1).with_discount_code("SAVE10", 10));
    h.cart.refresh().await.unwrap();
    h.cart.apply_discount("SAVE10").await.unwrap();
    h.cart.apply_discount("BOGUS").await.unwrap_err();
    assert_eq!(h.drawer.document().notices().len(), 2);

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    {
        let doc = h.drawer.document();
        assert_eq!(doc.notices().len(), 1);
        assert_eq!(doc.notices()[0].level, NoticeLevel::Error);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.drawer.document().notices().is_empty());
    assert_eq!(h.shown_notices().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blank_discount_code_sends_nothing() {
    let h = Harness::new(catalog());
    let err = h.cart.apply_discount("   ").await.unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));
    assert_eq!(h.server.request_count(Endpoint::Discount), 0);
    assert_eq!(h.notices(), vec!["Enter a discount code".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_search_through_controller() {
    let h = Harness::new(catalog());
    let search = h.cart.search();

    assert_eq!(search.query("l").await.unwrap(), SuggestOutcome::TooShort);
    match search.query("Linen").await.unwrap() {
        SuggestOutcome::Results(hits) => {
            assert_eq!(hits.products.len(), 1);
            assert_eq!(hits.products[0].title, "Linen Shirt");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.server.request_count(Endpoint::Suggest), 1);
}
