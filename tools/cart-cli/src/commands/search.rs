//! Predictive search.

use anyhow::{Context as _, Result};
use cart_sync::SuggestOutcome;

use super::SearchArgs;
use crate::context::Context;

/// Run the search command.
pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let search = session.cart.search();

    let spinner = ctx.output.spinner("Searching...");
    let outcome = search.query(&args.query).await;
    spinner.finish_and_clear();
    let outcome = outcome.context("Search failed")?;

    let suggestions = match outcome {
        SuggestOutcome::Results(suggestions) => suggestions,
        SuggestOutcome::TooShort => {
            ctx.output.warn(&format!(
                "Type at least {} characters",
                session.cart.config().search_min_query_len
            ));
            return Ok(());
        }
        SuggestOutcome::Stale => return Ok(()),
    };

    if ctx.output.is_json() {
        ctx.output.report(
            "search",
            serde_json::json!({ "query": args.query, "results": suggestions }),
        );
        return Ok(());
    }

    if suggestions.products.is_empty() {
        ctx.output.info(&format!("No products match \"{}\"", args.query.trim()));
    } else {
        ctx.output.header("Products");
        for product in &suggestions.products {
            let price = product.price.as_deref().unwrap_or("");
            let sold_out = if product.available { "" } else { " (sold out)" };
            ctx.output
                .list_item(&format!("{}  {}{}  [{}]", product.title, price, sold_out, product.id));
        }
    }
    if !suggestions.collections.is_empty() {
        ctx.output.header("Collections");
        for collection in &suggestions.collections {
            ctx.output.list_item(&collection.title);
        }
    }
    if !suggestions.queries.is_empty() {
        ctx.output.header("Suggestions");
        for query in &suggestions.queries {
            ctx.output.list_item(&query.text);
        }
    }
    Ok(())
}
