//! Cart commands: show, open, add, set, inc, dec, remove, note, discount.

use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use cart_core::{CartSnapshot, LineItemKey, VariantId};
use dialoguer::Confirm;

use super::{AddArgs, DiscountArgs, LineArgs, NoteArgs, RemoveArgs, SetArgs};
use crate::context::{Context, Session};

/// Start a session and load the cart.
async fn loaded(ctx: &Context) -> Result<(Session, Arc<CartSnapshot>)> {
    let session = ctx.session()?;
    let spinner = ctx.output.spinner("Loading cart...");
    let snapshot = session.cart.refresh().await;
    spinner.finish_and_clear();
    let snapshot = snapshot.context("Failed to load cart")?;
    Ok((session, snapshot))
}

/// Print what the command left behind.
fn finish(command: &str, session: &Session, ctx: &Context) {
    let doc = session.drawer.document();
    ctx.output.notices(&doc);
    ctx.output
        .drawer(command, &doc, session.cart.current().as_deref());
}

/// Resolve a key or a 1-based position to a line in `snapshot`.
pub fn resolve_line(snapshot: &CartSnapshot, line: &str) -> Result<LineItemKey> {
    if let Ok(position) = line.parse::<usize>() {
        if let Some(item) = position.checked_sub(1).and_then(|i| snapshot.items.get(i)) {
            return Ok(item.key.clone());
        }
    }
    let key = LineItemKey::new(line);
    if snapshot.item(&key).is_some() {
        return Ok(key);
    }
    if snapshot.items.is_empty() {
        bail!("The cart is empty");
    }
    let known: Vec<String> = snapshot
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{} ({})", i + 1, item.key))
        .collect();
    bail!("No line '{}' in the cart. Lines: {}", line, known.join(", "))
}

pub async fn show(ctx: &Context) -> Result<()> {
    let (session, _) = loaded(ctx).await?;
    finish("show", &session, ctx);
    Ok(())
}

pub async fn open(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let spinner = ctx.output.spinner("Opening cart...");
    let result = session.cart.open().await;
    spinner.finish_and_clear();
    result.context("Failed to open cart")?;
    finish("open", &session, ctx);
    Ok(())
}

pub async fn add(args: AddArgs, ctx: &Context) -> Result<()> {
    let (session, _) = loaded(ctx).await?;
    let spinner = ctx.output.spinner("Adding to cart...");
    let result = session.cart.add(VariantId::new(args.variant), args.quantity).await;
    spinner.finish_and_clear();
    let line = result.with_context(|| format!("Failed to add variant {}", args.variant))?;
    ctx.output
        .debug(&format!("line {} now has quantity {}", line.key, line.quantity));
    finish("add", &session, ctx);
    Ok(())
}

pub async fn set(args: SetArgs, ctx: &Context) -> Result<()> {
    let (session, snapshot) = loaded(ctx).await?;
    let key = resolve_line(&snapshot, &args.line)?;
    let spinner = ctx.output.spinner("Updating quantity...");
    let result = session.cart.set_quantity(&key, args.quantity).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to update {}", key))?;
    finish("set", &session, ctx);
    Ok(())
}

/// `inc` and `dec`.
pub async fn step(args: LineArgs, delta: i8, ctx: &Context) -> Result<()> {
    let (session, snapshot) = loaded(ctx).await?;
    let key = resolve_line(&snapshot, &args.line)?;
    let spinner = ctx.output.spinner("Updating quantity...");
    let result = if delta > 0 {
        session.cart.increment(&key).await
    } else {
        session.cart.decrement(&key).await
    };
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to update {}", key))?;
    finish(if delta > 0 { "inc" } else { "dec" }, &session, ctx);
    Ok(())
}

pub async fn remove(args: RemoveArgs, ctx: &Context) -> Result<()> {
    let (session, snapshot) = loaded(ctx).await?;
    let key = resolve_line(&snapshot, &args.line)?;
    let title = snapshot
        .item(&key)
        .map(|item| item.product_title.clone())
        .unwrap_or_else(|| key.to_string());

    let spinner = ctx.output.spinner("Removing...");
    let result = session.cart.remove(&key).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to remove {}", key))?;
    ctx.output.success(&format!("Removed {}", title));

    if !args.yes && ctx.output.is_interactive() {
        let window = session.cart.config().undo_window();
        let prompt = format!("Undo? ({}s)", window.as_secs());
        let undo = tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(prompt).default(false).interact()
        })
        .await
        .context("Prompt failed")??;

        if undo {
            match session.cart.undo().await.context("Failed to restore item")? {
                Some(_) => {}
                None => ctx.output.warn("The undo window has closed"),
            }
        }
    }

    finish("remove", &session, ctx);
    Ok(())
}

pub async fn note(args: NoteArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let spinner = ctx.output.spinner("Saving note...");
    let result = session.cart.update_note(&args.text).await;
    spinner.finish_and_clear();
    let snapshot = result.context("Failed to save note")?;
    match &snapshot.note {
        Some(note) => ctx.output.success(&format!("Note saved: {}", note)),
        None => ctx.output.success("Note cleared"),
    }
    finish("note", &session, ctx);
    Ok(())
}

pub async fn discount(args: DiscountArgs, ctx: &Context) -> Result<()> {
    let (session, _) = loaded(ctx).await?;
    let spinner = ctx.output.spinner("Applying discount...");
    let result = session.cart.apply_discount(&args.code).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Failed to apply code {}", args.code.trim()))?;
    finish("discount", &session, ctx);
    Ok(())
}
