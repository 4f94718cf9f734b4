//! Scripted walkthrough against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use cart_core::{CartError, VariantId};
use cart_sync::CartEvent;

use super::DemoArgs;
use crate::context::{demo, demo_store, Context};

const STEPS: usize = 7;

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session_with(Arc::new(demo_store()))?;
    let cart = &session.cart;
    let pause = Duration::from_millis(args.pause_ms);

    let output = ctx.output.clone();
    let _events = cart.subscribe(move |event| match event {
        CartEvent::Updated(snapshot) => {
            output.debug(&format!("cart updated: {} items", snapshot.item_count))
        }
        CartEvent::UndoArmed(record) => output.debug(&format!("undo armed for {}", record.key)),
        CartEvent::UndoCleared { key, outcome } => {
            output.debug(&format!("undo for {} cleared: {:?}", key, outcome))
        }
        CartEvent::SoldOut(variant) => output.debug(&format!("variant {} sold out", variant)),
        CartEvent::Notice(notice) => output.notice(notice),
        _ => {}
    });

    ctx.output.step(1, STEPS, "Opening the drawer");
    let snapshot = cart.open().await.context("Failed to open cart")?;
    let shirt = snapshot
        .items
        .iter()
        .find(|item| item.variant_id == VariantId::new(demo::LINEN_SHIRT))
        .map(|item| item.key.clone())
        .context("Demo cart is missing the shirt")?;
    let socks = snapshot
        .items
        .iter()
        .find(|item| item.variant_id == VariantId::new(demo::WOOL_SOCKS))
        .map(|item| item.key.clone())
        .context("Demo cart is missing the socks")?;
    show(ctx, &session);
    tokio::time::sleep(pause).await;

    ctx.output.step(2, STEPS, "Adding two mugs");
    cart.add(VariantId::new(demo::ENAMEL_MUG), 2).await?;
    show(ctx, &session);
    tokio::time::sleep(pause).await;

    ctx.output.step(3, STEPS, "Clicking + twice on the shirt");
    let (first, second) = tokio::join!(cart.increment(&shirt), cart.increment(&shirt));
    first?;
    second?;
    show(ctx, &session);
    tokio::time::sleep(pause).await;

    ctx.output.step(4, STEPS, "Removing the socks, then undoing");
    cart.remove(&socks).await?;
    show(ctx, &session);
    tokio::time::sleep(pause).await;
    if cart.undo().await?.is_none() {
        ctx.output.warn("The undo window closed before the restore");
    }
    show(ctx, &session);

    ctx.output.step(5, STEPS, "Typing a note");
    for partial in ["Gi", "Gift", "Gift wrap", "Gift wrap please"] {
        cart.note_changed(partial);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    tokio::time::sleep(cart.config().note_debounce() + Duration::from_millis(100)).await;
    match cart.current().and_then(|s| s.note.clone()) {
        Some(note) => ctx.output.kv("note", &note),
        None => ctx.output.warn("Note was not saved"),
    }

    ctx.output.step(6, STEPS, "Applying WELCOME10");
    cart.apply_discount("WELCOME10").await?;
    show(ctx, &session);
    tokio::time::sleep(pause).await;

    ctx.output.step(7, STEPS, "Adding a sold-out print twice");
    cart.add(VariantId::new(demo::LIMITED_PRINT), 1).await?;
    match cart.add(VariantId::new(demo::LIMITED_PRINT), 1).await {
        Err(CartError::OutOfStock { .. }) => {}
        Err(err) => return Err(err.into()),
        Ok(_) => ctx.output.warn("Expected the second print to be refused"),
    }

    let doc = session.drawer.document();
    ctx.output.header("Final drawer");
    ctx.output.drawer("demo", &doc, cart.current().as_deref());
    Ok(())
}

fn show(ctx: &Context, session: &crate::context::Session) {
    if ctx.output.is_json() {
        return;
    }
    let doc = session.drawer.document();
    print!("{}", doc.to_text());
}
