//! Cart CLI - Drive the storefront cart controller from a terminal.
//!
//! Commands:
//! - `cart show` - Print the cart
//! - `cart open` - Open the drawer and fetch the cart
//! - `cart add` - Add a variant
//! - `cart set` / `cart inc` / `cart dec` - Change a line's quantity
//! - `cart remove` - Remove a line, with an undo prompt
//! - `cart note` - Save the cart note
//! - `cart discount` - Apply a discount code
//! - `cart search` - Predictive search
//! - `cart demo` - Scripted walkthrough against the in-memory store
//! - `cart config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    AddArgs, ConfigArgs, DemoArgs, DiscountArgs, LineArgs, NoteArgs, RemoveArgs, SearchArgs,
    SetArgs,
};
use output::{Format, Output};

/// Cart CLI - Inspect and edit a storefront cart
#[derive(Parser)]
#[command(name = "cart")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true, conflicts_with = "html")]
    json: bool,

    /// Print the drawer markup instead of text
    #[arg(long, global = true)]
    html: bool,

    /// Use the in-memory demo store instead of the network
    #[arg(long, global = true)]
    offline: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,

    /// Open the drawer and fetch the cart
    Open,

    /// Add a variant to the cart
    Add(AddArgs),

    /// Set a line's quantity
    Set(SetArgs),

    /// Raise a line's quantity by one
    Inc(LineArgs),

    /// Lower a line's quantity by one
    Dec(LineArgs),

    /// Remove a line
    Remove(RemoveArgs),

    /// Save the cart note
    Note(NoteArgs),

    /// Apply a discount code
    Discount(DiscountArgs),

    /// Search products
    Search(SearchArgs),

    /// Walk through the controller against the in-memory store
    Demo(DemoArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        Format::Json
    } else if cli.html {
        Format::Html
    } else {
        Format::Text
    };
    let output = Output::new(cli.verbose, format);

    let ctx = context::Context::load(cli.config.as_deref(), cli.offline, output)?;

    let result = match cli.command {
        Commands::Show => commands::cart::show(&ctx).await,
        Commands::Open => commands::cart::open(&ctx).await,
        Commands::Add(args) => commands::cart::add(args, &ctx).await,
        Commands::Set(args) => commands::cart::set(args, &ctx).await,
        Commands::Inc(args) => commands::cart::step(args, 1, &ctx).await,
        Commands::Dec(args) => commands::cart::step(args, -1, &ctx).await,
        Commands::Remove(args) => commands::cart::remove(args, &ctx).await,
        Commands::Note(args) => commands::cart::note(args, &ctx).await,
        Commands::Discount(args) => commands::cart::discount(args, &ctx).await,
        Commands::Search(args) => commands::search::run(args, &ctx).await,
        Commands::Demo(args) => commands::demo::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
