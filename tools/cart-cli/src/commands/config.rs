//! Configuration management commands.

use anyhow::{bail, Context as _, Result};
use cart_client::HttpCartClient;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { base_url, force } => init_config(&base_url, force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let client = &ctx.config.client;
    ctx.output.info("[client]");
    ctx.output.kv("base_url", &client.base_url);
    ctx.output.kv("user_agent", &client.user_agent);
    ctx.output
        .kv("cart_token", client.cart_token.as_deref().unwrap_or("(new session)"));
    ctx.output
        .kv("connect_timeout", &format!("{:?}", client.timeouts.connect()));

    let sync = &ctx.config.sync;
    ctx.output.info("[sync]");
    ctx.output.kv("currency", sync.currency.code());
    ctx.output.kv(
        "free_shipping_threshold",
        &sync.free_shipping_threshold.to_string(),
    );
    ctx.output.kv("undo_window", &format!("{:?}", sync.undo_window()));
    ctx.output.kv("undo_capacity", &sync.undo_capacity.to_string());
    ctx.output.kv("note_debounce", &format!("{:?}", sync.note_debounce()));
    ctx.output
        .kv("search_debounce", &format!("{:?}", sync.search_debounce()));
    ctx.output
        .kv("max_waiting_per_key", &sync.max_waiting_per_key.to_string());
    ctx.output
        .kv("open_drawer_on_add", &sync.open_drawer_on_add.to_string());
    ctx.output
        .kv("retry.max_attempts", &sync.retry.max_attempts.to_string());

    Ok(())
}

fn init_config(base_url: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("cart.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, generate_default_config(base_url))?;
    ctx.output
        .success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    let Some(path) = &ctx.config_path else {
        bail!("No config file found. Run `cart config init` to create one.");
    };

    let config = CliConfig::load(&path.to_string_lossy())?;
    HttpCartClient::new(&config.client)
        .with_context(|| format!("Invalid [client] section in {}", path.display()))?;
    ctx.output.success("Configuration is valid");
    Ok(())
}
